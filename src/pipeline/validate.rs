//! Closed-loop validation: the redacted output is re-extracted and scanned
//! for any original finding text. A hit means redaction failed and the
//! output must not leave the pipeline.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::detect::{EntityType, Finding};

/// Loose match for emitted redaction tokens. Font substitution in rendered
/// output can mangle the mask glyphs, so the body is unconstrained.
static TOKEN_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    match Regex::new(r"\[[A-Za-z ]+:[^\]]*\]") {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(error = %e, "token regex failed to compile");
            None
        }
    }
});

/// Outcome of validating one redacted document.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub passed: bool,
    pub violation_count: usize,
    /// Entity types whose text survived. Never the text itself.
    pub violated_entity_types: Vec<EntityType>,
    /// Tokens found in the re-extracted text versus tokens spliced in.
    pub tokens_found: usize,
    pub tokens_expected: usize,
}

/// Scans re-extracted output text for surviving finding text.
///
/// The substring check is case-insensitive and is the binding verdict: any
/// survivor fails validation. The token count is informational; a shortfall
/// is logged but does not fail the run, since PDF text recovery can mangle
/// mask glyphs.
pub fn validate_output(
    output_text: &str,
    findings: &[Finding],
    tokens_expected: usize,
) -> ValidationResult {
    let haystack = output_text.to_lowercase();

    let mut violation_count = 0usize;
    let mut violated: BTreeSet<EntityType> = BTreeSet::new();
    for finding in findings {
        let needle = finding.text.to_lowercase();
        if needle.trim().is_empty() {
            continue;
        }
        if haystack.contains(&needle) {
            violation_count += 1;
            violated.insert(finding.entity_type);
        }
    }

    let tokens_found = TOKEN_RE
        .as_ref()
        .map(|re| re.find_iter(output_text).count())
        .unwrap_or(0);
    if tokens_found < tokens_expected {
        warn!(
            tokens_found,
            tokens_expected,
            "fewer redaction tokens recovered than spliced; output fonts may have mangled them"
        );
    }

    ValidationResult {
        passed: violation_count == 0,
        violation_count,
        violated_entity_types: violated.into_iter().collect(),
        tokens_found,
        tokens_expected,
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
    fn passes_when_no_finding_text_survives() {
        let findings = vec![finding(EntityType::EmailAddress, "john@example.com")];
        let result = validate_output("Contact [Email Address:████] today", &findings, 1);
        assert!(result.passed);
        assert_eq!(result.violation_count, 0);
        assert_eq!(result.tokens_found, 1);
    }

    #[test]
    fn fails_when_finding_text_survives() {
        let findings = vec![
            finding(EntityType::EmailAddress, "john@example.com"),
            finding(EntityType::PhoneNumber, "555-123-4567"),
        ];
        let result = validate_output("leaked: john@example.com", &findings, 2);
        assert!(!result.passed);
        assert_eq!(result.violation_count, 1);
        assert_eq!(result.violated_entity_types, vec![EntityType::EmailAddress]);
    }

    #[test]
    fn survivor_match_is_case_insensitive() {
        let findings = vec![finding(EntityType::EmailAddress, "John@Example.com")];
        let result = validate_output("see JOHN@EXAMPLE.COM", &findings, 1);
        assert!(!result.passed);
    }

    #[test]
    fn result_never_carries_surviving_text() {
        let findings = vec![finding(EntityType::Ssn, "123-45-6789")];
        let result = validate_output("123-45-6789", &findings, 1);
        let rendered = format!("{result:?}");
        assert!(!rendered.contains("123-45-6789"));
    }

    #[test]
    fn token_shortfall_does_not_fail_validation() {
        let findings = vec![finding(EntityType::EmailAddress, "john@example.com")];
        // Token mangled by font substitution: bracket survives but content garbled.
        let result = validate_output("Contact ????? today", &findings, 1);
        assert!(result.passed);
        assert_eq!(result.tokens_found, 0);
        assert_eq!(result.tokens_expected, 1);
    }

    #[test]
    fn whitespace_only_finding_text_is_skipped() {
        let findings = vec![finding(EntityType::Person, "  ")];
        let result = validate_output("anything at all", &findings, 0);
        assert!(result.passed);
    }
}
