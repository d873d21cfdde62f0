use std::fmt;

use serde::{Deserialize, Serialize};

/// Categories of sensitive text the engine can detect.
///
/// Serialized names match the wire format of detection reports
/// (`EMAIL_ADDRESS`, `PHONE_NUMBER`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    EmailAddress,
    PhoneNumber,
    Ssn,
    CreditCard,
    IpAddress,
    Url,
    DateOfBirth,
    PassportNumber,
    LicensePlate,
    Person,
    Organization,
    Location,
    DateTime,
    Financial,
}

impl EntityType {
    /// Human-readable label used inside redaction tokens: `Phone Number`, `Email Address`.
    pub fn display_label(&self) -> &'static str {
        match self {
            EntityType::EmailAddress => "Email Address",
            EntityType::PhoneNumber => "Phone Number",
            EntityType::Ssn => "Ssn",
            EntityType::CreditCard => "Credit Card",
            EntityType::IpAddress => "Ip Address",
            EntityType::Url => "Url",
            EntityType::DateOfBirth => "Date Of Birth",
            EntityType::PassportNumber => "Passport Number",
            EntityType::LicensePlate => "License Plate",
            EntityType::Person => "Person",
            EntityType::Organization => "Organization",
            EntityType::Location => "Location",
            EntityType::DateTime => "Date Time",
            EntityType::Financial => "Financial",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_label())
    }
}

/// Which detection method produced a finding.
///
/// Priority (enterprise > statistical > pattern) breaks ties between
/// equal-length overlapping findings during the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Pattern,
    Statistical,
    Enterprise,
}

impl DetectionMethod {
    pub fn priority(&self) -> u8 {
        match self {
            DetectionMethod::Pattern => 1,
            DetectionMethod::Statistical => 2,
            DetectionMethod::Enterprise => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Pattern => "pattern",
            DetectionMethod::Statistical => "statistical",
            DetectionMethod::Enterprise => "enterprise",
        }
    }
}

/// A detected span of sensitive text inside one text block.
///
/// Offsets are byte indices into the block content and always fall on UTF-8
/// character boundaries (`0 <= start < end <= block.len()`). Findings exist
/// only in memory for the duration of one pipeline run.
#[derive(Clone, PartialEq)]
pub struct Finding {
    pub entity_type: EntityType,
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// Informational only, never used for merge decisions.
    pub confidence: f32,
    pub method: DetectionMethod,
}

impl Finding {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `other` shares at least one character with `self`.
    pub fn overlaps(&self, other: &Finding) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// Raw PII must never reach logs. Debug output elides the matched text and
// keeps only its length.
impl fmt::Debug for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finding")
            .field("entity_type", &self.entity_type)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("text_len", &self.text.len())
            .field("confidence", &self.confidence)
            .field("method", &self.method)
            .finish()
    }
}

/// A block's final findings after the merge: sorted by start offset,
/// guaranteed non-overlapping. Only `merge::merge_findings` constructs one.
#[derive(Debug, Clone, Default)]
pub struct FindingSet(pub(crate) Vec<Finding>);

impl FindingSet {
    pub fn empty() -> Self {
        FindingSet(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Finding] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Finding> {
        self.0
    }
}

impl<'a> IntoIterator for &'a FindingSet {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(start: usize, end: usize) -> Finding {
        Finding {
            entity_type: EntityType::EmailAddress,
            start,
            end,
            text: "x".repeat(end - start),
            confidence: 0.9,
            method: DetectionMethod::Pattern,
        }
    }

    #[test]
    fn overlap_shares_at_least_one_char() {
        assert!(finding(0, 5).overlaps(&finding(4, 10)));
        assert!(finding(4, 10).overlaps(&finding(0, 5)));
        // Adjacent spans do not overlap
        assert!(!finding(0, 5).overlaps(&finding(5, 10)));
    }

    #[test]
    fn debug_output_never_contains_raw_text() {
        let f = Finding {
            entity_type: EntityType::EmailAddress,
            start: 0,
            end: 16,
            text: "john@example.com".to_string(),
            confidence: 0.9,
            method: DetectionMethod::Pattern,
        };
        let rendered = format!("{f:?}");
        assert!(!rendered.contains("john@example.com"));
        assert!(rendered.contains("text_len"));
    }

    #[test]
    fn method_priority_ordering() {
        assert!(DetectionMethod::Enterprise.priority() > DetectionMethod::Statistical.priority());
        assert!(DetectionMethod::Statistical.priority() > DetectionMethod::Pattern.priority());
    }

    #[test]
    fn entity_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&EntityType::EmailAddress).unwrap();
        assert_eq!(json, "\"EMAIL_ADDRESS\"");
        let back: EntityType = serde_json::from_str("\"PHONE_NUMBER\"").unwrap();
        assert_eq!(back, EntityType::PhoneNumber);
    }
}
