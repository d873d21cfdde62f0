//! Multi-method PII detection.
//!
//! Three independent methods (pattern, statistical, enterprise) feed one
//! deterministic merger. Methods are assembled once into a [`DetectorSet`]
//! at startup and shared read-only; an unavailable method degrades coverage
//! and is surfaced as metadata, never as an error.

pub mod enterprise;
pub mod merge;
pub mod patterns;
pub mod statistical;
pub mod types;

use serde::Serialize;

use crate::config::DetectionConfig;

pub use enterprise::EnterpriseDetector;
pub use merge::merge_findings;
pub use patterns::PatternDetector;
pub use statistical::StatisticalDetector;
pub use types::{DetectionMethod, EntityType, Finding, FindingSet};

/// One PII-finding method. Implementations are pure over the input text,
/// never mutate shared state, and never abort the caller.
pub trait Detector: Send + Sync {
    fn method(&self) -> DetectionMethod;

    /// `Some(reason)` when the method cannot contribute (model missing,
    /// empty allowlist). An unavailable detector returns no findings.
    fn availability(&self) -> Option<String> {
        None
    }

    /// Detect every occurrence of sensitive text. Offsets are byte indices
    /// into `text` on UTF-8 character boundaries.
    fn detect(&self, text: &str) -> Vec<Finding>;
}

/// An enabled method that cannot contribute findings this run. Informational
/// metadata; processing continues with the remaining methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDegradation {
    pub method: DetectionMethod,
    pub reason: String,
}

/// The assembled detection methods for a process. Detection over a block
/// pools raw findings from every method and merges them into one canonical
/// non-overlapping set; the merge is order-independent, so methods may be
/// evaluated in any order or concurrently.
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSet {
    /// Assemble detectors from configuration. The statistical model loads at
    /// most once, here; a load failure degrades the method rather than
    /// failing assembly.
    pub fn from_config(config: &DetectionConfig) -> Self {
        let mut builder = Self::builder();
        if config.enable_pattern {
            builder = builder.with_detector(Box::new(PatternDetector::new()));
        }
        if config.enable_statistical {
            let detector = match &config.ner_model_dir {
                Some(dir) => StatisticalDetector::load(dir),
                None => StatisticalDetector::load(&crate::config::ner_model_dir()),
            };
            builder = builder.with_detector(Box::new(detector));
        }
        if config.enable_enterprise {
            builder = builder.with_detector(Box::new(EnterpriseDetector::new(
                config.enterprise_entity_allowlist.clone(),
            )));
        }
        builder.build()
    }

    pub fn builder() -> DetectorSetBuilder {
        DetectorSetBuilder { detectors: Vec::new() }
    }

    /// Detect PII in one text block and merge into the final finding set.
    pub fn detect_block(&self, text: &str) -> FindingSet {
        if text.trim().is_empty() {
            return FindingSet::empty();
        }

        let mut raw = Vec::new();
        for detector in &self.detectors {
            if detector.availability().is_some() {
                continue;
            }
            raw.extend(detector.detect(text));
        }
        merge_findings(raw)
    }

    /// Enabled-but-unavailable methods, for the run report. Availability is
    /// fixed at assembly time, so this is computed once per run.
    pub fn degradations(&self) -> Vec<MethodDegradation> {
        self.detectors
            .iter()
            .filter_map(|d| {
                d.availability().map(|reason| MethodDegradation {
                    method: d.method(),
                    reason,
                })
            })
            .collect()
    }

    /// Which methods are live, in assembly order.
    pub fn status(&self) -> Vec<(DetectionMethod, bool)> {
        self.detectors
            .iter()
            .map(|d| (d.method(), d.availability().is_none()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

pub struct DetectorSetBuilder {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSetBuilder {
    pub fn with_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn build(self) -> DetectorSet {
        DetectorSet {
            detectors: self.detectors,
        }
    }
}
