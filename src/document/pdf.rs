//! Paginated-flow adapter: pdf-extract for the text layer, lopdf for
//! geometry and document info, printpdf for regeneration.
//!
//! Reconstruction never copies original page objects. A fresh PDF is
//! generated with one page per original page (size preserved) and the
//! redacted text laid out in Helvetica. Visual layout is not preserved;
//! the original byte stream carrying recoverable PII must not survive.

use lopdf::{Dictionary, Document, Object, ObjectId};
use printpdf::{BuiltinFont, Mm, PdfDocument, Pt};
use std::io::BufWriter;

use super::{
    DocumentFormat, DocumentStructure, ExtractedDocument, ExtractionError, FormatAdapter,
    MetadataField, PageGeometry, ReconstructionError, StructuralLocation, TextBlock,
};

const FONT_SIZE_PT: f32 = 11.0;
const LINE_LEADING_PT: f32 = 14.0;
const MARGIN_PT: f32 = 54.0;
/// Average Helvetica glyph advance at 1pt, used for character-count wrapping.
const CHAR_WIDTH_FACTOR: f32 = 0.5;

pub struct PdfAdapter;

impl PdfAdapter {
    pub fn new() -> Self {
        PdfAdapter
    }
}

impl Default for PdfAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatAdapter for PdfAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(ExtractionError::PdfEncrypted);
        }

        // get_pages is keyed by 1-based page number in document order.
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let pages: Vec<PageGeometry> = page_ids
            .iter()
            .map(|&id| page_geometry(&doc, id))
            .collect();

        let page_texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
        if page_texts.len() != pages.len() {
            return Err(ExtractionError::PdfParsing(format!(
                "page count mismatch: {} text pages for {} page objects",
                page_texts.len(),
                pages.len()
            )));
        }

        let mut blocks: Vec<TextBlock> = page_texts
            .into_iter()
            .enumerate()
            .map(|(index, content)| TextBlock {
                content,
                location: StructuralLocation::Page { index },
            })
            .collect();

        if let Some(title) = document_title(&doc) {
            blocks.push(TextBlock {
                content: title,
                location: StructuralLocation::Metadata {
                    field: MetadataField::Title,
                },
            });
        }

        Ok(ExtractedDocument {
            blocks,
            structure: DocumentStructure::Paginated { pages },
        })
    }

    fn reconstruct(
        &self,
        structure: &DocumentStructure,
        blocks: &[TextBlock],
    ) -> Result<Vec<u8>, ReconstructionError> {
        let DocumentStructure::Paginated { pages } = structure else {
            return Err(ReconstructionError::StructureMismatch(
                "paginated structure required for PDF reconstruction".into(),
            ));
        };

        let mut page_content: Vec<Option<&str>> = vec![None; pages.len()];
        let mut title: Option<&str> = None;
        for block in blocks {
            match block.location {
                StructuralLocation::Page { index } => {
                    let slot = page_content.get_mut(index).ok_or_else(|| {
                        ReconstructionError::StructureMismatch(format!(
                            "page index {index} out of range for {} pages",
                            pages.len()
                        ))
                    })?;
                    *slot = Some(&block.content);
                }
                StructuralLocation::Metadata {
                    field: MetadataField::Title,
                } => title = Some(&block.content),
                other => {
                    return Err(ReconstructionError::StructureMismatch(format!(
                        "unexpected block location {other:?} in paginated document"
                    )));
                }
            }
        }
        for (index, slot) in page_content.iter().enumerate() {
            if slot.is_none() {
                return Err(ReconstructionError::MissingBlock(
                    StructuralLocation::Page { index },
                ));
            }
        }

        let first = pages.first().copied().unwrap_or(PageGeometry::LETTER);
        let (doc, page1, layer1) = PdfDocument::new(
            title.unwrap_or("Redacted Document"),
            Mm::from(Pt(first.width_pt)),
            Mm::from(Pt(first.height_pt)),
            "Layer 1",
        );
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReconstructionError::PdfGeneration(format!("font error: {e}")))?;

        for (index, geometry) in pages.iter().enumerate() {
            let (page, layer_index) = if index == 0 {
                (page1, layer1)
            } else {
                doc.add_page(
                    Mm::from(Pt(geometry.width_pt)),
                    Mm::from(Pt(geometry.height_pt)),
                    "Layer 1",
                )
            };
            let mut layer = doc.get_page(page).get_layer(layer_index);

            let text = page_content[index].unwrap_or("");
            let max_chars = usable_chars_per_line(geometry.width_pt);
            let mut y = Pt(geometry.height_pt - MARGIN_PT);
            for raw_line in text.lines() {
                for line in wrap_text(raw_line, max_chars) {
                    if y.0 < MARGIN_PT {
                        // Regenerated text takes more vertical space than the
                        // original layout; spill onto a continuation page
                        // rather than dropping lines.
                        tracing::warn!(page = index, "redacted text overflows page, continuing on spill page");
                        let (spill_page, spill_layer) = doc.add_page(
                            Mm::from(Pt(geometry.width_pt)),
                            Mm::from(Pt(geometry.height_pt)),
                            "Layer 1",
                        );
                        layer = doc.get_page(spill_page).get_layer(spill_layer);
                        y = Pt(geometry.height_pt - MARGIN_PT);
                    }
                    if !line.is_empty() {
                        layer.use_text(&line, FONT_SIZE_PT, Mm::from(Pt(MARGIN_PT)), Mm::from(y), &font);
                    }
                    y = Pt(y.0 - LINE_LEADING_PT);
                }
            }
        }

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| ReconstructionError::PdfGeneration(format!("save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| ReconstructionError::PdfGeneration(format!("buffer error: {e}")))
    }
}

fn usable_chars_per_line(width_pt: f32) -> usize {
    let usable = (width_pt - 2.0 * MARGIN_PT).max(FONT_SIZE_PT);
    (usable / (FONT_SIZE_PT * CHAR_WIDTH_FACTOR)).floor() as usize
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if !current.is_empty() && current.chars().count() + word_len + 1 > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if word_len > max_chars {
            // A word that fits on no line is hard-split; the tail stays in
            // the current line so following words can join it.
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(max_chars) {
                if chunk.len() == max_chars {
                    lines.push(chunk.iter().collect());
                } else {
                    current = chunk.iter().collect();
                }
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// MediaBox lookup with Pages-tree inheritance; falls back to US Letter.
fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        if let Some(geometry) = media_box_geometry(doc, dict) {
            return geometry;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|o| o.as_reference().ok());
    }
    PageGeometry::LETTER
}

fn media_box_geometry(doc: &Document, dict: &Dictionary) -> Option<PageGeometry> {
    let media_box = dict.get(b"MediaBox").ok()?;
    let media_box = match media_box {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let Object::Array(values) = media_box else {
        return None;
    };
    if values.len() != 4 {
        return None;
    }
    let num = |o: &Object| match o {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    };
    let x0 = num(&values[0])?;
    let y0 = num(&values[1])?;
    let x1 = num(&values[2])?;
    let y1 = num(&values[3])?;
    let width = (x1 - x0).abs();
    let height = (y1 - y0).abs();
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(PageGeometry {
        width_pt: width,
        height_pt: height,
    })
}

/// Title from the trailer Info dictionary, if present and non-empty.
fn document_title(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let info = match info {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let Ok(Object::String(bytes, _)) = info.get(b"Title") else {
        return None;
    };
    let title = decode_pdf_string(bytes);
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// PDF text strings are UTF-16BE when BOM-prefixed, otherwise treated as
/// Latin-1 (a superset of PDFDocEncoding for the characters we care about).
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
