use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detect::types::EntityType;

/// Application-level constants
pub const APP_NAME: &str = "Blackbar";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> String {
    "blackbar=info".to_string()
}

/// Get the application data directory
/// ~/Blackbar/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Blackbar")
}

/// Get the models directory (for the optional ONNX NER model)
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Get the NER model directory (model.onnx + tokenizer.json + config.json)
pub fn ner_model_dir() -> PathBuf {
    models_dir().join("ner")
}

/// Which detection methods run, and how the enterprise method is scoped.
///
/// Every method is independently toggleable. Disabling a method removes it
/// from the set; an enabled method that cannot initialize degrades instead
/// (surfaced in the run report, never an error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_true")]
    pub enable_pattern: bool,
    #[serde(default = "default_true")]
    pub enable_statistical: bool,
    #[serde(default)]
    pub enable_enterprise: bool,
    /// Entity types the enterprise method is allowed to report.
    #[serde(default)]
    pub enterprise_entity_allowlist: BTreeSet<EntityType>,
    /// Override for the NER model directory; defaults to [`ner_model_dir`].
    #[serde(default)]
    pub ner_model_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enable_pattern: true,
            enable_statistical: true,
            enable_enterprise: false,
            enterprise_entity_allowlist: BTreeSet::new(),
            ner_model_dir: None,
        }
    }
}

impl DetectionConfig {
    /// Pattern-only configuration: deterministic, no model dependency.
    pub fn pattern_only() -> Self {
        Self {
            enable_pattern: true,
            enable_statistical: false,
            enable_enterprise: false,
            enterprise_entity_allowlist: BTreeSet::new(),
            ner_model_dir: None,
        }
    }
}
