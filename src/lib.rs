//! Blackbar: a fail-closed document redaction engine.
//!
//! Documents flow extract -> detect -> splice -> reconstruct -> validate.
//! Output is always a freshly generated document; the original byte stream
//! never reaches the result. If any original finding text survives into the
//! output, the run fails and nothing is delivered.
//!
//! ```no_run
//! use blackbar::config::DetectionConfig;
//! use blackbar::document::DocumentFormat;
//! use blackbar::pipeline::RedactionEngine;
//!
//! # async fn demo(bytes: Vec<u8>) -> Result<(), blackbar::pipeline::PipelineError> {
//! let engine = RedactionEngine::from_config(&DetectionConfig::default());
//! let redacted = engine.redact(bytes, DocumentFormat::Pdf).await?;
//! println!("{} findings redacted", redacted.report.total_findings);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detect;
pub mod document;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use detect::{DetectorSet, EntityType, Finding, FindingSet};
pub use document::DocumentFormat;
pub use pipeline::{PipelineError, RedactedDocument, RedactionEngine, RedactionReport};

/// Initialize tracing for binaries and integration harnesses. Honors
/// `RUST_LOG`, falling back to the crate default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
