pub mod cli;
pub mod data;
pub mod engine;
pub mod error;
pub mod export;
pub mod infer;
pub mod io_utils;
pub mod plan;
pub mod process;
pub mod schema;
pub mod session;
pub mod table;
pub mod template;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, TemplateAction},
    plan::TransformationPlan,
    template::TemplateStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("rcm_standardize", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Apply(args) => process::execute_apply(&args),
        Commands::Run(args) => process::execute_run(&args),
        Commands::Template(args) => handle_template(&args),
    }
}

fn handle_analyze(args: &cli::AnalyzeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Analyzing '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );

    let (data, headers) = io_utils::read_raw_dataset(&args.input, delimiter, encoding)?;
    let templates = match &args.templates {
        Some(path) => TemplateStore::open(path)
            .with_context(|| format!("Opening template store {path:?}"))?
            .list()
            .to_vec(),
        None => Vec::new(),
    };

    let sample_len = data.len().min(args.sample_rows);
    let suggestion = infer::provider()
        .analyze(&data[..sample_len], &headers, &templates)
        .with_context(|| format!("Analyzing {:?}", args.input))?;

    suggestion
        .plan
        .save(&args.plan)
        .with_context(|| format!("Writing plan to {:?}", args.plan))?;
    info!(
        "Proposed plan maps {} of 6 target column(s); written to {:?}",
        suggestion.plan.len(),
        args.plan
    );
    println!("{}", suggestion.reasoning);
    Ok(())
}

fn handle_template(args: &cli::TemplateArgs) -> Result<()> {
    let mut store = TemplateStore::open(&args.store)
        .with_context(|| format!("Opening template store {:?}", args.store))?;
    match &args.action {
        TemplateAction::List => {
            let headers = vec![
                "Id".to_string(),
                "Name".to_string(),
                "Mapped Targets".to_string(),
                "Saved At".to_string(),
            ];
            let rows = store
                .list()
                .iter()
                .map(|t| {
                    vec![
                        t.id.to_string(),
                        t.name.clone(),
                        t.plan
                            .mapped_targets()
                            .iter()
                            .map(|c| c.label())
                            .collect::<Vec<_>>()
                            .join(", "),
                        t.saved_at
                            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_default(),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
            info!("{} template(s) in {:?}", store.list().len(), args.store);
        }
        TemplateAction::Save(save) => {
            let plan = TransformationPlan::load(&save.plan)?;
            let template = store.save(&save.name, plan)?;
            info!(
                "Saved template '{}' ({}) to {:?}",
                template.name, template.id, args.store
            );
        }
        TemplateAction::Delete(delete) => {
            if store.delete(delete.id)? {
                info!("Deleted template {} from {:?}", delete.id, args.store);
            } else {
                info!("No template with id {} in {:?}", delete.id, args.store);
            }
        }
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
