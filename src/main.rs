fn main() {
    if let Err(err) = rcm_standardize::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
