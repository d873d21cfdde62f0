//! Structured-flow adapter: zip for the OOXML container, quick-xml for
//! streaming parse of `word/document.xml` and `docProps/core.xml`.
//!
//! Reconstruction writes a fresh container from scratch. Headers, footers,
//! embedded objects, revision history and every other part of the original
//! archive are dropped; only redacted blocks reach the output.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{
    BodyElement, DocumentFormat, DocumentStructure, ExtractedDocument, ExtractionError,
    FormatAdapter, MetadataField, ReconstructionError, StructuralLocation, TextBlock,
};

pub struct DocxAdapter;

impl DocxAdapter {
    pub fn new() -> Self {
        DocxAdapter
    }
}

impl Default for DocxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatAdapter for DocxAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::ArchiveFormat(e.to_string()))?;

        let document_xml = read_part(&mut archive, "word/document.xml")?
            .ok_or_else(|| ExtractionError::MissingPart("word/document.xml".into()))?;
        let mut parsed = parse_document_body(&document_xml)?;

        if let Some(core_xml) = read_part(&mut archive, "docProps/core.xml")? {
            for (field, value) in parse_core_properties(&core_xml)? {
                parsed.blocks.push(TextBlock {
                    content: value,
                    location: StructuralLocation::Metadata { field },
                });
            }
        }

        Ok(ExtractedDocument {
            blocks: parsed.blocks,
            structure: DocumentStructure::Structured { body: parsed.body },
        })
    }

    fn reconstruct(
        &self,
        structure: &DocumentStructure,
        blocks: &[TextBlock],
    ) -> Result<Vec<u8>, ReconstructionError> {
        let DocumentStructure::Structured { body } = structure else {
            return Err(ReconstructionError::StructureMismatch(
                "structured body required for DOCX reconstruction".into(),
            ));
        };

        let mut paragraphs: HashMap<usize, &str> = HashMap::new();
        let mut cells: HashMap<(usize, usize, usize), &str> = HashMap::new();
        let mut metadata: HashMap<MetadataField, &str> = HashMap::new();
        for block in blocks {
            match block.location {
                StructuralLocation::Paragraph { index } => {
                    paragraphs.insert(index, &block.content);
                }
                StructuralLocation::TableCell { table, row, cell } => {
                    cells.insert((table, row, cell), &block.content);
                }
                StructuralLocation::Metadata { field } => {
                    metadata.insert(field, &block.content);
                }
                other => {
                    return Err(ReconstructionError::StructureMismatch(format!(
                        "unexpected block location {other:?} in structured document"
                    )));
                }
            }
        }

        let mut document_xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        );
        let mut paragraph_index = 0usize;
        let mut table_index = 0usize;
        for element in body {
            match element {
                BodyElement::Paragraph => {
                    let content = paragraphs.get(&paragraph_index).copied().ok_or(
                        ReconstructionError::MissingBlock(StructuralLocation::Paragraph {
                            index: paragraph_index,
                        }),
                    )?;
                    write_paragraph(&mut document_xml, content);
                    paragraph_index += 1;
                }
                BodyElement::Table { rows, cols } => {
                    document_xml.push_str(
                        r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr>"#,
                    );
                    for row in 0..*rows {
                        document_xml.push_str("<w:tr>");
                        for cell in 0..*cols {
                            // Ragged source rows leave trailing cells without a
                            // block; those render empty.
                            let content = cells
                                .get(&(table_index, row, cell))
                                .copied()
                                .unwrap_or("");
                            document_xml.push_str("<w:tc>");
                            write_paragraph(&mut document_xml, content);
                            document_xml.push_str("</w:tc>");
                        }
                        document_xml.push_str("</w:tr>");
                    }
                    document_xml.push_str("</w:tbl>");
                    table_index += 1;
                }
            }
        }
        document_xml.push_str("</w:body></w:document>");

        let core_xml = core_properties_xml(&metadata);
        write_container(&document_xml, &core_xml)
    }
}

/// Reads one archive part as UTF-8, `Ok(None)` when the part is absent.
fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, ExtractionError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractionError::ArchiveFormat(e.to_string())),
    };
    let mut content = String::new();
    part.read_to_string(&mut content)
        .map_err(|e| ExtractionError::EncodingError(format!("{name}: {e}")))?;
    Ok(Some(content))
}

struct ParsedBody {
    blocks: Vec<TextBlock>,
    body: Vec<BodyElement>,
}

/// Streams `word/document.xml`, emitting one block per top-level paragraph
/// and one per table cell, in reading order. Nested tables fold into the
/// containing cell's text.
fn parse_document_body(xml: &str) -> Result<ParsedBody, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut blocks = Vec::new();
    let mut body = Vec::new();

    let mut paragraph_index = 0usize;
    let mut table_index = 0usize;
    let mut table_depth = 0usize;
    let mut current_rows = 0usize;
    let mut current_cols = 0usize;
    let mut row_cells = 0usize;

    let mut paragraph_buf = String::new();
    let mut cell_buf = String::new();
    let mut in_paragraph = false;
    let mut in_cell = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => {
                    if table_depth == 0 {
                        current_rows = 0;
                        current_cols = 0;
                    }
                    table_depth += 1;
                }
                b"w:tr" if table_depth == 1 => row_cells = 0,
                b"w:tc" if table_depth == 1 => {
                    cell_buf.clear();
                    in_cell = true;
                }
                b"w:p" => {
                    if table_depth == 0 {
                        paragraph_buf.clear();
                        in_paragraph = true;
                    } else if in_cell && !cell_buf.is_empty() {
                        cell_buf.push('\n');
                    }
                }
                b"w:t" => in_text = true,
                b"w:tab" => append_text(table_depth, in_cell, in_paragraph, &mut cell_buf, &mut paragraph_buf, "\t"),
                b"w:br" | b"w:cr" => append_text(table_depth, in_cell, in_paragraph, &mut cell_buf, &mut paragraph_buf, "\n"),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => append_text(table_depth, in_cell, in_paragraph, &mut cell_buf, &mut paragraph_buf, "\t"),
                b"w:br" | b"w:cr" => append_text(table_depth, in_cell, in_paragraph, &mut cell_buf, &mut paragraph_buf, "\n"),
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        body.push(BodyElement::Table {
                            rows: current_rows,
                            cols: current_cols,
                        });
                        table_index += 1;
                    }
                }
                b"w:tr" if table_depth == 1 => {
                    current_cols = current_cols.max(row_cells);
                    current_rows += 1;
                }
                b"w:tc" if table_depth == 1 => {
                    blocks.push(TextBlock {
                        content: std::mem::take(&mut cell_buf),
                        location: StructuralLocation::TableCell {
                            table: table_index,
                            row: current_rows,
                            cell: row_cells,
                        },
                    });
                    row_cells += 1;
                    in_cell = false;
                }
                b"w:p" if table_depth == 0 && in_paragraph => {
                    blocks.push(TextBlock {
                        content: std::mem::take(&mut paragraph_buf),
                        location: StructuralLocation::Paragraph {
                            index: paragraph_index,
                        },
                    });
                    body.push(BodyElement::Paragraph);
                    paragraph_index += 1;
                    in_paragraph = false;
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if in_text {
                    let text = t
                        .unescape()
                        .map_err(|e| ExtractionError::XmlParsing(e.to_string()))?;
                    append_text(table_depth, in_cell, in_paragraph, &mut cell_buf, &mut paragraph_buf, &text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ExtractionError::XmlParsing(e.to_string())),
        }
    }

    Ok(ParsedBody { blocks, body })
}

fn append_text(
    table_depth: usize,
    in_cell: bool,
    in_paragraph: bool,
    cell_buf: &mut String,
    paragraph_buf: &mut String,
    text: &str,
) {
    if table_depth > 0 {
        if in_cell {
            cell_buf.push_str(text);
        }
    } else if in_paragraph {
        paragraph_buf.push_str(text);
    }
}

/// Pulls dc:title / dc:subject / dc:creator out of `docProps/core.xml`.
fn parse_core_properties(
    xml: &str,
) -> Result<Vec<(MetadataField, String)>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut properties = Vec::new();
    let mut current: Option<MetadataField> = None;
    let mut buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = match e.name().as_ref() {
                    b"dc:title" => Some(MetadataField::Title),
                    b"dc:subject" => Some(MetadataField::Subject),
                    b"dc:creator" => Some(MetadataField::Author),
                    _ => None,
                };
                buf.clear();
            }
            Ok(Event::Text(t)) => {
                if current.is_some() {
                    buf.push_str(
                        &t.unescape()
                            .map_err(|e| ExtractionError::XmlParsing(e.to_string()))?,
                    );
                }
            }
            Ok(Event::End(_)) => {
                if let Some(field) = current.take() {
                    if !buf.trim().is_empty() {
                        properties.push((field, buf.trim().to_string()));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ExtractionError::XmlParsing(e.to_string())),
        }
    }

    Ok(properties)
}

/// Emits a `<w:p>` with one run per line, `<w:br/>` between lines and
/// `<w:tab/>` for tab stops.
fn write_paragraph(out: &mut String, content: &str) {
    out.push_str("<w:p><w:r>");
    for (i, line) in content.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<w:br/>");
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                out.push_str("<w:tab/>");
            }
            if !segment.is_empty() {
                out.push_str(r#"<w:t xml:space="preserve">"#);
                out.push_str(&escape(segment));
                out.push_str("</w:t>");
            }
        }
    }
    out.push_str("</w:r></w:p>");
}

fn core_properties_xml(metadata: &HashMap<MetadataField, &str>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
    );
    let mut push = |tag: &str, field: MetadataField| {
        if let Some(value) = metadata.get(&field).copied() {
            xml.push_str(&format!("<{tag}>{}</{tag}>", escape(value)));
        }
    };
    push("dc:title", MetadataField::Title);
    push("dc:subject", MetadataField::Subject);
    push("dc:creator", MetadataField::Author);
    xml.push_str("</cp:coreProperties>");
    xml
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

fn write_container(document_xml: &str, core_xml: &str) -> Result<Vec<u8>, ReconstructionError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, &str); 4] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        ("word/document.xml", document_xml),
        ("docProps/core.xml", core_xml),
    ];
    for (name, content) in parts {
        writer
            .start_file(name, options)
            .map_err(|e| ReconstructionError::ArchiveWrite(format!("{name}: {e}")))?;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| ReconstructionError::ArchiveWrite(format!("{name}: {e}")))?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| ReconstructionError::ArchiveWrite(e.to_string()))?;
    Ok(cursor.into_inner())
}
