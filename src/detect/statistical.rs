//! Statistical detection method: general named-entity recognition mapped
//! into PII categories.
//!
//! Backed by an ONNX token-classification model behind the `onnx-ner`
//! feature. A missing model (or a build without the feature) makes the
//! method *unavailable*: detection proceeds with reduced coverage and the
//! degradation is surfaced as metadata, never as an error.

use super::types::{DetectionMethod, EntityType, Finding};
use super::Detector;

/// Map a NER label (with any `B-`/`I-` prefix stripped) into a PII category.
/// Labels outside the mapping are not PII and are dropped.
fn entity_for_label(label: &str) -> Option<EntityType> {
    match label {
        "PER" | "PERSON" => Some(EntityType::Person),
        "ORG" | "ORGANIZATION" => Some(EntityType::Organization),
        "LOC" | "GPE" | "LOCATION" => Some(EntityType::Location),
        "DATE" | "TIME" | "DATE_TIME" => Some(EntityType::DateTime),
        "MONEY" | "FINANCIAL" => Some(EntityType::Financial),
        _ => None,
    }
}

#[cfg(feature = "onnx-ner")]
mod onnx {
    use std::path::Path;
    use std::sync::Mutex;

    use ort::session::Session;
    use serde::Deserialize;
    use thiserror::Error;

    use super::entity_for_label;
    use crate::detect::types::{DetectionMethod, EntityType, Finding};

    #[derive(Error, Debug)]
    pub enum ModelError {
        #[error("model file not found: {0}")]
        ModelNotFound(std::path::PathBuf),

        #[error("model initialization failed: {0}")]
        ModelInit(String),

        #[error("tokenization failed: {0}")]
        Tokenization(String),

        #[error("inference failed: {0}")]
        Inference(String),
    }

    /// Subset of the HuggingFace `config.json` we need: the label table.
    #[derive(Deserialize)]
    struct ModelConfig {
        id2label: std::collections::BTreeMap<String, String>,
    }

    /// ONNX NER model for token classification.
    ///
    /// The model directory must contain `model.onnx`, `tokenizer.json` and
    /// `config.json` (for `id2label`). Uses interior mutability (Mutex)
    /// because `ort::Session::run` requires `&mut self` but detection is
    /// exposed through `&self` for shared concurrent use.
    pub struct NerModel {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
        labels: Vec<String>,
    }

    impl NerModel {
        pub fn load(model_dir: &Path) -> Result<Self, ModelError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");
            let config_path = model_dir.join("config.json");

            for path in [&model_path, &tokenizer_path, &config_path] {
                if !path.exists() {
                    return Err(ModelError::ModelNotFound(path.clone()));
                }
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| ModelError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| ModelError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| ModelError::ModelInit(format!("ONNX load failed: {e}")))?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| ModelError::ModelInit(format!("Tokenizer load failed: {e}")))?;

            let config: ModelConfig = serde_json::from_slice(
                &std::fs::read(&config_path)
                    .map_err(|e| ModelError::ModelInit(e.to_string()))?,
            )
            .map_err(|e| ModelError::ModelInit(format!("config.json parse failed: {e}")))?;

            // id2label keys are stringified indices; order by index.
            let mut labels = vec![String::new(); config.id2label.len()];
            for (id, label) in config.id2label {
                let idx: usize = id
                    .parse()
                    .map_err(|_| ModelError::ModelInit(format!("bad label id: {id}")))?;
                if idx >= labels.len() {
                    return Err(ModelError::ModelInit(format!("label id out of range: {idx}")));
                }
                labels[idx] = label;
            }

            tracing::info!(dir = %model_dir.display(), labels = labels.len(), "NER model loaded");

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                labels,
            })
        }

        /// Run token classification and decode BIO spans into findings.
        pub fn infer(&self, text: &str) -> Result<Vec<Finding>, ModelError> {
            use ort::value::TensorRef;

            // encode_char_offsets, not encode: decode_bio_spans expects char
            // offsets and remaps them to byte indices itself.
            let encoding = self
                .tokenizer
                .encode_char_offsets(text, true)
                .map_err(|e| ModelError::Tokenization(e.to_string()))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let token_type_ids: Vec<i64> = encoding
                .get_type_ids()
                .iter()
                .map(|&t| t as i64)
                .collect();

            let seq_len = input_ids.len();
            if seq_len == 0 {
                return Ok(Vec::new());
            }

            let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
                .map_err(|e| ModelError::Inference(e.to_string()))?;
            let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask)
                .map_err(|e| ModelError::Inference(e.to_string()))?;
            let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            let ids_tensor = TensorRef::from_array_view(&ids_array)
                .map_err(|e| ModelError::Inference(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(&mask_array)
                .map_err(|e| ModelError::Inference(e.to_string()))?;
            let type_tensor = TensorRef::from_array_view(&type_array)
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| ModelError::Inference("session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| ModelError::Inference(format!("ONNX inference failed: {e}")))?;

            // Logits shape: [1, seq_len, num_labels]
            let (shape, logits) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| ModelError::Inference(format!("output extraction: {e}")))?;
            if shape.len() != 3 || shape[2] as usize != self.labels.len() {
                return Err(ModelError::Inference(format!(
                    "unexpected logits shape {shape:?} for {} labels",
                    self.labels.len()
                )));
            }
            let num_labels = self.labels.len();

            // Per-token argmax + softmax confidence on the winning label.
            let special = encoding.get_special_tokens_mask();
            let offsets = encoding.get_offsets();
            let mut token_labels: Vec<(usize, usize, &str, f32)> = Vec::new();
            for t in 0..seq_len {
                if special.get(t).copied().unwrap_or(0) == 1 {
                    continue;
                }
                let row = &logits[t * num_labels..(t + 1) * num_labels];
                let (best_idx, best_logit) = row
                    .iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |acc, (i, &v)| {
                        if v > acc.1 { (i, v) } else { acc }
                    });
                let denom: f32 = row.iter().map(|v| (v - best_logit).exp()).sum();
                let prob = 1.0 / denom;
                let (off_start, off_end) = offsets[t];
                if off_start == off_end {
                    continue;
                }
                token_labels.push((off_start, off_end, self.labels[best_idx].as_str(), prob));
            }

            Ok(decode_bio_spans(text, &token_labels))
        }
    }

    /// Fold per-token BIO labels into entity spans over the original text.
    ///
    /// Tokenizer offsets are character offsets into the input; they are
    /// converted to byte offsets so findings index the block directly.
    fn decode_bio_spans(text: &str, tokens: &[(usize, usize, &str, f32)]) -> Vec<Finding> {
        let char_to_byte: Vec<usize> = text
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(text.len()))
            .collect();
        let byte_of = |char_idx: usize| -> usize {
            *char_to_byte.get(char_idx).unwrap_or(&text.len())
        };

        let mut findings = Vec::new();
        let mut open: Option<(EntityType, usize, usize, f32, usize)> = None; // (entity, start, end, prob_sum, count)

        let close = |span: Option<(EntityType, usize, usize, f32, usize)>,
                         findings: &mut Vec<Finding>| {
            if let Some((entity, start, end, prob_sum, count)) = span {
                let (bs, be) = (byte_of(start), byte_of(end));
                if bs < be && be <= text.len() {
                    findings.push(Finding {
                        entity_type: entity,
                        start: bs,
                        end: be,
                        text: text[bs..be].to_string(),
                        confidence: prob_sum / count as f32,
                        method: DetectionMethod::Statistical,
                    });
                }
            }
        };

        for &(start, end, label, prob) in tokens {
            let (prefix, name) = match label.split_once('-') {
                Some((p, n)) => (p, n),
                None => ("O", label),
            };
            let entity = entity_for_label(name);

            match (prefix, entity) {
                ("B", Some(e)) => {
                    close(open.take(), &mut findings);
                    open = Some((e, start, end, prob, 1));
                }
                ("I", Some(e)) => match open {
                    Some((oe, os, _, ps, c)) if oe == e => {
                        open = Some((oe, os, end, ps + prob, c + 1));
                    }
                    _ => {
                        close(open.take(), &mut findings);
                        open = Some((e, start, end, prob, 1));
                    }
                },
                _ => close(open.take(), &mut findings),
            }
        }
        close(open, &mut findings);
        findings
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn bio_decode_single_entity() {
            let text = "John Smith called";
            let tokens = vec![(0, 4, "B-PER", 0.99), (5, 10, "I-PER", 0.98), (11, 17, "O", 0.9)];
            let findings = decode_bio_spans(text, &tokens);
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].text, "John Smith");
            assert_eq!(findings[0].entity_type, EntityType::Person);
        }

        #[test]
        fn bio_decode_orphan_inside_starts_new_span() {
            let text = "Acme Corp";
            let tokens = vec![(0, 4, "I-ORG", 0.8), (5, 9, "I-ORG", 0.8)];
            let findings = decode_bio_spans(text, &tokens);
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].text, "Acme Corp");
        }

        #[test]
        fn bio_decode_ignores_non_pii_labels() {
            let text = "first second";
            let tokens = vec![(0, 5, "B-MISC", 0.9), (6, 12, "I-MISC", 0.9)];
            assert!(decode_bio_spans(text, &tokens).is_empty());
        }

        #[test]
        fn bio_decode_adjacent_entities_kept_separate() {
            let text = "Paris London";
            let tokens = vec![(0, 5, "B-LOC", 0.9), (6, 12, "B-LOC", 0.9)];
            let findings = decode_bio_spans(text, &tokens);
            assert_eq!(findings.len(), 2);
        }

        #[test]
        fn bio_decode_multibyte_text_offsets_are_byte_indices() {
            let text = "café Zoé visited";
            // Character offsets: "Zoé" is chars 5..8
            let tokens = vec![(5, 8, "B-PER", 0.9)];
            let findings = decode_bio_spans(text, &tokens);
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].text, "Zoé");
            assert_eq!(&text[findings[0].start..findings[0].end], "Zoé");
        }
    }
}

#[cfg(feature = "onnx-ner")]
pub use onnx::ModelError;

/// NER-backed detector, or an explicit "unavailable" stand-in when the model
/// cannot be loaded. Assembled once at process start and shared read-only.
pub struct StatisticalDetector {
    #[cfg(feature = "onnx-ner")]
    model: Option<onnx::NerModel>,
    unavailable_reason: Option<String>,
}

impl StatisticalDetector {
    /// Load the NER model from `model_dir`. Failure to load is not an error:
    /// the detector reports itself unavailable and detection proceeds with
    /// reduced coverage.
    #[cfg(feature = "onnx-ner")]
    pub fn load(model_dir: &std::path::Path) -> Self {
        match onnx::NerModel::load(model_dir) {
            Ok(model) => Self {
                model: Some(model),
                unavailable_reason: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "NER model unavailable, statistical method degraded");
                Self {
                    model: None,
                    unavailable_reason: Some(e.to_string()),
                }
            }
        }
    }

    #[cfg(not(feature = "onnx-ner"))]
    pub fn load(_model_dir: &std::path::Path) -> Self {
        Self {
            unavailable_reason: Some("built without the onnx-ner feature".to_string()),
        }
    }

    /// An always-unavailable detector with an explicit reason. Used when no
    /// model directory is configured, and by tests exercising degradation.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            #[cfg(feature = "onnx-ner")]
            model: None,
            unavailable_reason: Some(reason.into()),
        }
    }
}

impl Detector for StatisticalDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Statistical
    }

    fn availability(&self) -> Option<String> {
        self.unavailable_reason.clone()
    }

    #[cfg(feature = "onnx-ner")]
    fn detect(&self, text: &str) -> Vec<Finding> {
        let Some(model) = &self.model else {
            return Vec::new();
        };
        match model.infer(text) {
            Ok(findings) => findings,
            Err(e) => {
                // Inference failure degrades this method for the block; it
                // must never abort the caller.
                tracing::warn!(error = %e, "NER inference failed, skipping statistical method");
                Vec::new()
            }
        }
    }

    #[cfg(not(feature = "onnx-ner"))]
    fn detect(&self, _text: &str) -> Vec<Finding> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_detector_reports_reason_and_no_findings() {
        let detector = StatisticalDetector::unavailable("no model configured");
        assert_eq!(detector.availability().as_deref(), Some("no model configured"));
        assert!(detector.detect("John Smith lives at 10 Main St").is_empty());
    }

    #[test]
    fn label_mapping_covers_pii_categories() {
        assert_eq!(entity_for_label("PER"), Some(EntityType::Person));
        assert_eq!(entity_for_label("ORG"), Some(EntityType::Organization));
        assert_eq!(entity_for_label("GPE"), Some(EntityType::Location));
        assert_eq!(entity_for_label("DATE"), Some(EntityType::DateTime));
        assert_eq!(entity_for_label("MONEY"), Some(EntityType::Financial));
        assert_eq!(entity_for_label("MISC"), None);
        assert_eq!(entity_for_label("O"), None);
    }

    #[cfg(not(feature = "onnx-ner"))]
    #[test]
    fn load_without_feature_is_unavailable() {
        let detector = StatisticalDetector::load(std::path::Path::new("/nonexistent"));
        let reason = detector.availability().expect("must be unavailable");
        assert!(reason.contains("onnx-ner"));
    }
}
