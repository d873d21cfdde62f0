//! The redaction engine: one async entry point driving the full pipeline
//! over blocking worker tasks.
//!
//! Stage order is fixed: extract, detect per block, splice, reconstruct,
//! re-extract, validate. CPU and parse work runs under `spawn_blocking`;
//! detection over blocks fans out one task per block against the shared
//! [`DetectorSet`].

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::report::RedactionReport;
use super::splice::splice_block;
use super::validate::validate_output;
use super::PipelineError;
use crate::config::DetectionConfig;
use crate::detect::{DetectorSet, Finding};
use crate::document::{adapter_for, DocumentFormat, ExtractedDocument, TextBlock};

/// Lifecycle of one document run, logged at every transition. A document is
/// either delivered fully redacted and validated, or failed with nothing
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Received,
    Extracted,
    Detected,
    Redacted,
    Validated,
    Delivered,
    Failed,
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentState::Received => "received",
            DocumentState::Extracted => "extracted",
            DocumentState::Detected => "detected",
            DocumentState::Redacted => "redacted",
            DocumentState::Validated => "validated",
            DocumentState::Delivered => "delivered",
            DocumentState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A validated redacted document plus its run report.
pub struct RedactedDocument {
    pub bytes: Vec<u8>,
    pub report: RedactionReport,
}

pub struct RedactionEngine {
    detectors: Arc<DetectorSet>,
}

impl RedactionEngine {
    pub fn new(detectors: DetectorSet) -> Self {
        RedactionEngine {
            detectors: Arc::new(detectors),
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(DetectorSet::from_config(config))
    }

    /// Run the full pipeline over in-memory document bytes.
    pub async fn redact(
        &self,
        bytes: Vec<u8>,
        format: DocumentFormat,
    ) -> Result<RedactedDocument, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, format = format.as_str(), state = %DocumentState::Received, bytes = bytes.len(), "document received");

        let extracted = tokio::task::spawn_blocking(move || adapter_for(format).extract(&bytes))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;
        let sections = extracted.sections();
        let ExtractedDocument { blocks, structure } = extracted;
        info!(%run_id, state = %DocumentState::Extracted, sections, blocks = blocks.len(), "text extracted");

        // One blocking task per block; the detector set is shared read-only.
        let mut tasks = Vec::with_capacity(blocks.len());
        for block in blocks {
            let detectors = Arc::clone(&self.detectors);
            tasks.push(tokio::task::spawn_blocking(move || {
                let findings = detectors.detect_block(&block.content);
                let (content, tokens) = splice_block(&block.content, &findings);
                (
                    TextBlock {
                        content,
                        location: block.location,
                    },
                    findings.into_vec(),
                    tokens,
                )
            }));
        }

        let mut redacted_blocks = Vec::with_capacity(tasks.len());
        let mut all_findings: Vec<Finding> = Vec::new();
        let mut tokens_expected = 0usize;
        for task in tasks {
            let (block, findings, tokens) = task
                .await
                .map_err(|e| PipelineError::Task(e.to_string()))?;
            redacted_blocks.push(block);
            all_findings.extend(findings);
            tokens_expected += tokens;
        }
        info!(%run_id, state = %DocumentState::Detected, findings = all_findings.len(), "detection complete");
        info!(%run_id, state = %DocumentState::Redacted, tokens = tokens_expected, "blocks spliced");

        let blocks_for_reconstruct = redacted_blocks;
        let output = tokio::task::spawn_blocking(move || {
            adapter_for(format).reconstruct(&structure, &blocks_for_reconstruct)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        // Closed loop: re-extract our own output with the same adapter. An
        // unreadable output fails the run; it cannot be validated.
        let output_for_validation = output.clone();
        let reread = tokio::task::spawn_blocking(move || {
            adapter_for(format).extract(&output_for_validation)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;
        let output_text = reread
            .blocks
            .iter()
            .map(|b| b.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let verdict = validate_output(&output_text, &all_findings, tokens_expected);
        if !verdict.passed {
            warn!(%run_id, state = %DocumentState::Failed, violations = verdict.violation_count, "finding text survived redaction; output withheld");
            return Err(PipelineError::SecurityViolation {
                violation_count: verdict.violation_count,
                entity_types: verdict.violated_entity_types,
            });
        }
        info!(%run_id, state = %DocumentState::Validated, tokens_found = verdict.tokens_found, "output validated");

        let report = RedactionReport::new(
            run_id,
            format,
            &all_findings,
            sections,
            self.detectors.degradations(),
            verdict.tokens_expected.saturating_sub(verdict.tokens_found),
        );
        info!(%run_id, state = %DocumentState::Delivered, total_findings = report.total_findings, "document delivered");
        Ok(RedactedDocument {
            bytes: output,
            report,
        })
    }

    /// File-to-file variant. The output lands via a temp file in the target
    /// directory so a crashed run never leaves a partial document behind.
    pub async fn redact_file(
        &self,
        input: &Path,
        output: &Path,
        format: DocumentFormat,
    ) -> Result<RedactionReport, PipelineError> {
        let bytes = tokio::fs::read(input).await?;
        let redacted = self.redact(bytes, format).await?;

        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), PipelineError> {
            let dir = output.parent().unwrap_or_else(|| Path::new("."));
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            tmp.write_all(&redacted.bytes)?;
            tmp.persist(&output).map_err(|e| PipelineError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        Ok(redacted.report)
    }
}
