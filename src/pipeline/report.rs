//! Per-run redaction report: aggregate counts only, no raw text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::detect::{EntityType, Finding, MethodDegradation};
use crate::document::DocumentFormat;

/// Summary returned with every delivered document. Safe to persist and log:
/// carries entity counts and run metadata, never matched text or offsets.
#[derive(Debug, Clone, Serialize)]
pub struct RedactionReport {
    pub run_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub format: DocumentFormat,
    /// Final (merged) findings per entity type.
    pub entity_counts: BTreeMap<EntityType, usize>,
    pub total_findings: usize,
    /// Pages for paginated documents, body elements for structured ones.
    pub sections_processed: usize,
    /// Detection methods that were requested but could not run.
    pub degraded_methods: Vec<MethodDegradation>,
    /// Tokens spliced in minus tokens recovered from the validated output.
    pub token_shortfall: usize,
}

impl RedactionReport {
    pub fn new(
        run_id: Uuid,
        format: DocumentFormat,
        findings: &[Finding],
        sections_processed: usize,
        degraded_methods: Vec<MethodDegradation>,
        token_shortfall: usize,
    ) -> Self {
        let mut entity_counts: BTreeMap<EntityType, usize> = BTreeMap::new();
        for finding in findings {
            *entity_counts.entry(finding.entity_type).or_insert(0) += 1;
        }
        RedactionReport {
            run_id,
            completed_at: Utc::now(),
            format,
            total_findings: findings.len(),
            entity_counts,
            sections_processed,
            degraded_methods,
            token_shortfall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionMethod;

    fn finding(entity_type: EntityType, text: &str) -> Finding {
        Finding {
            entity_type,
            start: 0,
            end: text.len(),
            text: text.to_string(),
            confidence: 0.9,
            method: DetectionMethod::Pattern,
        }
    }

    #[test]
    fn counts_findings_per_entity_type() {
        let findings = vec![
            finding(EntityType::EmailAddress, "a@b.com"),
            finding(EntityType::EmailAddress, "c@d.com"),
            finding(EntityType::Ssn, "123-45-6789"),
        ];
        let report = RedactionReport::new(Uuid::new_v4(), DocumentFormat::Pdf, &findings, 3, vec![], 0);

        assert_eq!(report.total_findings, 3);
        assert_eq!(report.entity_counts[&EntityType::EmailAddress], 2);
        assert_eq!(report.entity_counts[&EntityType::Ssn], 1);
        assert_eq!(report.sections_processed, 3);
    }

    #[test]
    fn serialized_report_contains_no_finding_text() {
        let findings = vec![finding(EntityType::EmailAddress, "john@example.com")];
        let report = RedactionReport::new(Uuid::new_v4(), DocumentFormat::Docx, &findings, 1, vec![], 0);
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("john@example.com"));
        assert!(json.contains("EMAIL_ADDRESS"));
    }
}
