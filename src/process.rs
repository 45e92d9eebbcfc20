//! Execution of the `apply` and `run` commands.
//!
//! `apply` is the non-interactive path: a previously reviewed plan file is
//! applied to a full dataset and exported. `run` drives a whole
//! [`Session`]: ingest, analysis, optional template substitution, approval,
//! transformation, export, and optional template save.

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::{
    cli::{ApplyArgs, RunArgs},
    engine, export, io_utils,
    plan::TransformationPlan,
    session::{self, Session},
    table,
    template::TemplateStore,
};

pub fn execute_apply(args: &ApplyArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    if args.table && args.output.is_some() {
        return Err(anyhow!("--table cannot be combined with --output"));
    }

    let plan = TransformationPlan::load(&args.plan)?;
    let (data, _headers) = io_utils::read_raw_dataset(&args.input, delimiter, encoding)?;
    info!(
        "Applying plan '{}' ({} rule(s)) to {} row(s) from '{}'",
        args.plan.display(),
        plan.len(),
        data.len(),
        args.input.display()
    );

    let rows = engine::transform(&data, &plan)?;
    if args.table {
        let (headers, body) = export::table_rows(&rows);
        table::print_table(&headers, &body);
    } else {
        export::write_standardized(args.output.as_deref(), &rows)
            .context("Writing standardized CSV")?;
    }
    info!("Standardized {} row(s)", rows.len());
    Ok(())
}

pub fn execute_run(args: &RunArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    if args.table && args.output.is_some() {
        return Err(anyhow!("--table cannot be combined with --output"));
    }

    let mut store = match &args.templates {
        Some(path) => Some(TemplateStore::open(path)?),
        None => {
            if args.template.is_some() || args.save_template.is_some() {
                return Err(anyhow!(
                    "--template and --save-template require --templates <store>"
                ));
            }
            None
        }
    };

    let (data, headers) = io_utils::read_raw_dataset(&args.input, delimiter, encoding)?;
    info!(
        "Standardizing '{}' ({} row(s), {} column(s))",
        args.input.display(),
        data.len(),
        headers.len()
    );

    let mut session = Session::new();
    let templates = store.as_ref().map(|s| s.list().to_vec()).unwrap_or_default();
    session::run_analysis(&mut session, data, headers, &templates)
        .context("Analyzing file structure")?;
    if let Some(reasoning) = session.reasoning() {
        info!("Analysis rationale: {reasoning}");
    }

    if let Some(name) = &args.template {
        let store = store
            .as_ref()
            .ok_or_else(|| anyhow!("--template requires --templates <store>"))?;
        let template = store
            .find_by_name(name)
            .ok_or_else(|| anyhow!("No template named '{name}' in {:?}", store.path()))?;
        session.apply_template(template)?;
        info!("Replaced proposed plan with template '{name}'");
    }

    session::run_transform(&mut session).context("Applying transformations")?;

    let approved = session
        .working_plan()
        .cloned()
        .ok_or_else(|| anyhow!("Session completed without a working plan"))?;
    let rows = session
        .result()
        .ok_or_else(|| anyhow!("Session completed without standardized rows"))?;

    if args.table {
        let (headers, body) = export::table_rows(rows);
        table::print_table(&headers, &body);
    } else {
        export::write_standardized(args.output.as_deref(), rows)
            .context("Writing standardized CSV")?;
    }

    if let Some(path) = &args.plan_out {
        approved.save(path)?;
        info!("Approved plan written to {path:?}");
    }
    if let Some(name) = &args.save_template {
        let store = store
            .as_mut()
            .ok_or_else(|| anyhow!("--save-template requires --templates <store>"))?;
        store.save(name, approved)?;
        info!("Saved approved plan as template '{name}'");
    }

    info!("Standardized {} row(s)", rows.len());
    Ok(())
}
