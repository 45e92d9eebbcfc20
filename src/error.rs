//! Error kinds surfaced by the standardization pipeline.
//!
//! Every external-call failure is caught at the command boundary and surfaced
//! as a single user-visible message; no partial-plan or partial-row recovery
//! is attempted.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RcmError {
    /// The input file could not be read or decoded into rows.
    #[error("failed to parse input file: {0}")]
    FileParse(String),
    /// The plan analyzer failed or returned structurally invalid output.
    #[error("plan inference failed: {0}")]
    Inference(String),
    /// The transformation provider failed or returned invalid output.
    #[error("transformation failed: {0}")]
    Transformation(String),
    /// A plan referenced an unrecognized transformation type or duplicated a
    /// target column, or a session transition was attempted from the wrong
    /// state.
    #[error("invalid transformation plan: {0}")]
    Validation(String),
    /// A template store mutation could not be persisted. Prior on-disk state
    /// is left intact.
    #[error("template store failure: {0}")]
    TemplateStore(String),
}
