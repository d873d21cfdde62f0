//! Redaction pipeline: extract, detect, splice, reconstruct, validate.
//!
//! The engine is fail-closed end to end. Any stage error aborts the run and
//! nothing is delivered; a validation failure is surfaced as
//! [`PipelineError::SecurityViolation`] carrying counts and entity types
//! only, never the surviving text.

pub mod engine;
pub mod report;
pub mod splice;
pub mod validate;

use thiserror::Error;

use crate::detect::EntityType;
use crate::document::{ExtractionError, ReconstructionError};

pub use engine::{DocumentState, RedactedDocument, RedactionEngine};
pub use report::RedactionReport;
pub use splice::{redaction_token, splice_block, MASK_CAP, MASK_CHAR};
pub use validate::ValidationResult;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),

    /// Redacted output still contained original finding text. The output is
    /// never delivered; the error deliberately carries no raw text.
    #[error("validation failed: {violation_count} finding(s) survived redaction")]
    SecurityViolation {
        violation_count: usize,
        entity_types: Vec<EntityType>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Task(String),
}
