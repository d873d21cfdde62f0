//! Enterprise detection method: higher-precision recognizers restricted to a
//! configured entity allowlist.
//!
//! Each recognizer pairs a candidate regex with a structural validator
//! (checksum or range check), so matches carry higher confidence than the
//! broad pattern method. The method degrades like the statistical one: an
//! empty allowlist makes it unavailable, never an error.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::types::{DetectionMethod, EntityType, Finding};
use super::Detector;

const ENTERPRISE_CONFIDENCE: f32 = 0.95;

static RE_CARD_CANDIDATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").ok());

static RE_SSN_CANDIDATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").ok());

static RE_EMAIL_STRICT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}\b").ok()
});

static RE_PHONE_NANP: LazyLock<Option<Regex>> = LazyLock::new(|| {
    // NANP area codes never start with 0 or 1.
    Regex::new(r"(?:\+?1[-.\s]?)?\(?[2-9][0-9]{2}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}\b").ok()
});

struct Recognizer {
    entity: EntityType,
    regex: &'static LazyLock<Option<Regex>>,
    validate: fn(&str) -> bool,
}

fn recognizers() -> &'static [Recognizer] {
    static TABLE: LazyLock<Vec<Recognizer>> = LazyLock::new(|| {
        vec![
            Recognizer {
                entity: EntityType::CreditCard,
                regex: &RE_CARD_CANDIDATE,
                validate: luhn_valid,
            },
            Recognizer {
                entity: EntityType::Ssn,
                regex: &RE_SSN_CANDIDATE,
                validate: ssn_valid,
            },
            Recognizer {
                entity: EntityType::EmailAddress,
                regex: &RE_EMAIL_STRICT,
                validate: |_| true,
            },
            Recognizer {
                entity: EntityType::PhoneNumber,
                regex: &RE_PHONE_NANP,
                validate: |_| true,
            },
        ]
    });
    &TABLE
}

/// Luhn checksum over the digits of a candidate card number.
fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// SSA issuance rules: area not 000/666/9xx, group not 00, serial not 0000.
fn ssn_valid(candidate: &str) -> bool {
    let parts: Vec<&str> = candidate.split('-').collect();
    if parts.len() != 3 {
        return false;
    }
    let (area, group, serial) = (parts[0], parts[1], parts[2]);
    area != "000" && area != "666" && !area.starts_with('9') && group != "00" && serial != "0000"
}

/// Allowlist-scoped analyzer. Only findings whose entity type appears in the
/// allowlist are reported.
pub struct EnterpriseDetector {
    allowlist: BTreeSet<EntityType>,
}

impl EnterpriseDetector {
    pub fn new(allowlist: BTreeSet<EntityType>) -> Self {
        Self { allowlist }
    }
}

impl Detector for EnterpriseDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Enterprise
    }

    fn availability(&self) -> Option<String> {
        if self.allowlist.is_empty() {
            Some("enterprise entity allowlist is empty".to_string())
        } else {
            None
        }
    }

    fn detect(&self, text: &str) -> Vec<Finding> {
        if self.allowlist.is_empty() {
            return Vec::new();
        }

        let mut findings = Vec::new();
        for recognizer in recognizers() {
            if !self.allowlist.contains(&recognizer.entity) {
                continue;
            }
            let Some(re) = recognizer.regex.as_ref() else {
                continue;
            };
            for m in re.find_iter(text) {
                if !(recognizer.validate)(m.as_str()) {
                    continue;
                }
                findings.push(Finding {
                    entity_type: recognizer.entity,
                    start: m.start(),
                    end: m.end(),
                    text: m.as_str().to_string(),
                    confidence: ENTERPRISE_CONFIDENCE,
                    method: DetectionMethod::Enterprise,
                });
            }
        }
        findings
    }
}
