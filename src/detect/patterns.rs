//! Pattern detection method: a fixed library of regular expressions for
//! structurally recognizable PII. Deterministic, always available, and the
//! only method with no external model dependency.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{DetectionMethod, EntityType, Finding};
use super::Detector;

/// Confidence assigned to every pattern match. Informational only.
const PATTERN_CONFIDENCE: f32 = 0.9;

macro_rules! pii_regex {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| match Regex::new($regex_str) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(pattern = stringify!($name), error = %e, "PII regex failed to compile");
                None
            }
        });
    };
}

pii_regex!(
    RE_EMAIL,
    r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"
);

pii_regex!(
    RE_PHONE,
    r"(\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}"
);

pii_regex!(RE_SSN, r"\b\d{3}-?\d{2}-?\d{4}\b");

pii_regex!(RE_CREDIT_CARD, r"\b(?:\d{4}[-\s]?){3}\d{4}\b");

pii_regex!(RE_IPV4, r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b");

pii_regex!(
    RE_URL,
    r"https?://[A-Za-z0-9$\-_@.&+!*(),/%?#=~:;]+"
);

pii_regex!(
    RE_DOB,
    r"\b(0?[1-9]|1[0-2])[/-](0?[1-9]|[12][0-9]|3[01])[/-](19|20)\d{2}\b"
);

pii_regex!(RE_PASSPORT, r"\b[A-Z]{1,2}[0-9]{6,9}\b");

pii_regex!(RE_LICENSE_PLATE, r"\b[A-Z]{2,3}[-\s]?[0-9]{3,4}[-\s]?[A-Z]?\b");

struct PiiPattern {
    entity: EntityType,
    regex: &'static LazyLock<Option<Regex>>,
}

/// The full pattern table, in scan order. Scan order does not affect the
/// final finding set; the merge is order-independent.
fn pattern_table() -> &'static [PiiPattern] {
    static TABLE: LazyLock<Vec<PiiPattern>> = LazyLock::new(|| {
        vec![
            PiiPattern { entity: EntityType::EmailAddress, regex: &RE_EMAIL },
            PiiPattern { entity: EntityType::PhoneNumber, regex: &RE_PHONE },
            PiiPattern { entity: EntityType::Ssn, regex: &RE_SSN },
            PiiPattern { entity: EntityType::CreditCard, regex: &RE_CREDIT_CARD },
            PiiPattern { entity: EntityType::IpAddress, regex: &RE_IPV4 },
            PiiPattern { entity: EntityType::Url, regex: &RE_URL },
            PiiPattern { entity: EntityType::DateOfBirth, regex: &RE_DOB },
            PiiPattern { entity: EntityType::PassportNumber, regex: &RE_PASSPORT },
            PiiPattern { entity: EntityType::LicensePlate, regex: &RE_LICENSE_PLATE },
        ]
    });
    &TABLE
}

/// Regex-based detector. Reports every occurrence of every pattern;
/// multiple occurrences of the same literal text are separate findings.
pub struct PatternDetector;

impl PatternDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for PatternDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Pattern
    }

    fn detect(&self, text: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for pattern in pattern_table() {
            let Some(re) = pattern.regex.as_ref() else {
                // Compilation failure was logged at init; skip the pattern.
                continue;
            };
            for m in re.find_iter(text) {
                findings.push(Finding {
                    entity_type: pattern.entity,
                    start: m.start(),
                    end: m.end(),
                    text: m.as_str().to_string(),
                    confidence: PATTERN_CONFIDENCE,
                    method: DetectionMethod::Pattern,
                });
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Vec<Finding> {
        PatternDetector::new().detect(text)
    }

    fn types_in(text: &str) -> Vec<EntityType> {
        detect(text).into_iter().map(|f| f.entity_type).collect()
    }

    #[test]
    fn detects_email_address() {
        let findings = detect("Contact john@example.com today");
        let email = findings
            .iter()
            .find(|f| f.entity_type == EntityType::EmailAddress)
            .expect("email finding");
        assert_eq!(email.text, "john@example.com");
        assert_eq!(&"Contact john@example.com today"[email.start..email.end], email.text);
    }

    #[test]
    fn detects_phone_number() {
        assert!(types_in("call 555-123-4567").contains(&EntityType::PhoneNumber));
        assert!(types_in("call (555) 123-4567").contains(&EntityType::PhoneNumber));
        assert!(types_in("call +1 555.123.4567").contains(&EntityType::PhoneNumber));
    }

    #[test]
    fn detects_ssn_with_and_without_dashes() {
        assert!(types_in("SSN: 123-45-6789").contains(&EntityType::Ssn));
        assert!(types_in("SSN: 123456789").contains(&EntityType::Ssn));
    }

    #[test]
    fn detects_credit_card() {
        assert!(types_in("card 4111 1111 1111 1111").contains(&EntityType::CreditCard));
        assert!(types_in("card 4111-1111-1111-1111").contains(&EntityType::CreditCard));
    }

    #[test]
    fn detects_ip_and_url() {
        assert!(types_in("server at 192.168.1.10").contains(&EntityType::IpAddress));
        assert!(types_in("see https://example.com/profile?id=3").contains(&EntityType::Url));
    }

    #[test]
    fn detects_date_of_birth() {
        assert!(types_in("DOB 01/02/1985").contains(&EntityType::DateOfBirth));
        assert!(types_in("DOB 1-2-1985").contains(&EntityType::DateOfBirth));
    }

    #[test]
    fn reports_every_occurrence_of_same_literal() {
        let text = "a@b.io then a@b.io and again a@b.io";
        let emails: Vec<_> = detect(text)
            .into_iter()
            .filter(|f| f.entity_type == EntityType::EmailAddress)
            .collect();
        assert_eq!(emails.len(), 3);
        // Each occurrence has its own offsets
        let starts: Vec<_> = emails.iter().map(|f| f.start).collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_text_yields_no_findings() {
        assert!(detect("").is_empty());
        assert!(detect("   \n  ").is_empty());
    }

    #[test]
    fn offsets_index_the_matched_text() {
        let text = "mail me: jane.doe+x@corp.example.org!";
        for f in detect(text) {
            assert_eq!(&text[f.start..f.end], f.text);
        }
    }

    #[test]
    fn all_patterns_compile() {
        for p in pattern_table() {
            assert!(p.regex.is_some(), "{:?} pattern failed to compile", p.entity);
        }
    }
}
