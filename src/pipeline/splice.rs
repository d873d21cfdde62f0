//! Interval splice: replaces each finding span with a redaction token,
//! leaving surrounding text byte-for-byte intact.

use crate::detect::{EntityType, FindingSet};

/// Full-block glyph used for the visual mask.
pub const MASK_CHAR: char = '█';
/// Mask length is capped so very long findings cannot blow up layout.
pub const MASK_CAP: usize = 20;

/// `[{label}:{mask}]` where the mask repeats [`MASK_CHAR`] once per
/// character of the original span, capped at [`MASK_CAP`].
pub fn redaction_token(entity_type: EntityType, span_chars: usize) -> String {
    let mask: String = std::iter::repeat(MASK_CHAR)
        .take(span_chars.min(MASK_CAP))
        .collect();
    format!("[{}:{}]", entity_type.display_label(), mask)
}

/// Splices redaction tokens over the finding spans of one block. Returns
/// the redacted text and the number of tokens emitted.
///
/// `findings` is merge output: sorted by start, non-overlapping, with byte
/// offsets valid for `text`.
pub fn splice_block(text: &str, findings: &FindingSet) -> (String, usize) {
    if findings.is_empty() {
        return (text.to_string(), 0);
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut tokens = 0usize;
    for finding in findings.iter() {
        out.push_str(&text[cursor..finding.start]);
        let span_chars = text[finding.start..finding.end].chars().count();
        out.push_str(&redaction_token(finding.entity_type, span_chars));
        tokens += 1;
        cursor = finding.end;
    }
    out.push_str(&text[cursor..]);
    (out, tokens)
}
