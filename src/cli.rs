use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::infer::ANALYSIS_SAMPLE_ROWS;

#[derive(Debug, Parser)]
#[command(author, version, about = "Standardize audit RCM files into a fixed column schema", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze an RCM file and propose a transformation plan
    Analyze(AnalyzeArgs),
    /// Apply a transformation plan and export the standardized CSV
    Apply(ApplyArgs),
    /// Analyze, approve, and transform in a single session
    Run(RunArgs),
    /// Manage saved transformation-plan templates
    Template(TemplateArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Input RCM file (.csv/.tsv, or '-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination plan file (.yaml)
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
    /// Template store to consult for reusable mappings
    #[arg(short = 't', long = "templates")]
    pub templates: Option<PathBuf>,
    /// Number of rows handed to the analyzer
    #[arg(long, default_value_t = ANALYSIS_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Input RCM file (.csv/.tsv, or '-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Approved plan file (.yaml)
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Render the standardized rows as an elastic table on stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Input RCM file (.csv/.tsv, or '-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Template store path (read for reuse, written by --save-template)
    #[arg(short = 't', long = "templates")]
    pub templates: Option<PathBuf>,
    /// Replace the proposed plan wholesale with this saved template
    #[arg(long = "template")]
    pub template: Option<String>,
    /// Save the approved plan under this template name
    #[arg(long = "save-template")]
    pub save_template: Option<String>,
    /// Also write the approved plan to this file (.yaml)
    #[arg(long = "plan-out")]
    pub plan_out: Option<PathBuf>,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Render the standardized rows as an elastic table on stdout
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Template store file (defaults to templates.json)
    #[arg(short = 's', long = "store", default_value = "templates.json")]
    pub store: PathBuf,
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Debug, Subcommand)]
pub enum TemplateAction {
    /// List saved templates
    List,
    /// Save a plan file as a named template (overwrites by name)
    Save(TemplateSaveArgs),
    /// Delete a template by id
    Delete(TemplateDeleteArgs),
}

#[derive(Debug, Args)]
pub struct TemplateSaveArgs {
    /// Template name (the dedup key)
    #[arg(short = 'n', long = "name")]
    pub name: String,
    /// Plan file (.yaml) to store
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
}

#[derive(Debug, Args)]
pub struct TemplateDeleteArgs {
    /// Template id to remove
    #[arg(long = "id")]
    pub id: Uuid,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
