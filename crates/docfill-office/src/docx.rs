//! DOCX (WordprocessingML) text extraction and rendering.
//!
//! A DOCX file is a ZIP archive. The body text lives in `word/document.xml`:
//!
//! ```xml
//! <w:p>                                  <!-- paragraph -->
//!   <w:r><w:t>Hello {{ na</w:t></w:r>    <!-- runs may split a token -->
//!   <w:r><w:t>me }}</w:t></w:r>
//!   <w:r><w:tab/><w:t>x</w:t><w:br/></w:r>
//! </w:p>
//! ```
//!
//! Extraction concatenates run text so tokens split across runs by Word's editing
//! history come back whole. Every paragraph, empty ones included, ends with a blank
//! line; `w:tab` becomes a tab and `w:br`/`w:cr` become newlines. Rendering is the
//! inverse: blank-line separated blocks become paragraphs, newlines become breaks,
//! tabs become tabs.

use std::io::{Cursor, Read, Write};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use docfill_core::backend::{DocumentRenderer, TextExtractor};
use docfill_core::error::{DocfillError, Result};

/// MIME type of `.docx` files.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = "<w:sectPr/></w:body></w:document>";

/// Extracts raw body text from `.docx` templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn format(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DocfillError::Extraction(format!("not a DOCX (ZIP) file: {e}")))?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| DocfillError::Extraction(format!("missing {DOCUMENT_PART}: {e}")))?
            .read_to_string(&mut xml)?;

        body_text(&xml)
    }
}

/// Collect the visible body text of a `word/document.xml` part.
fn body_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len() / 4);
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:r" => in_run = true,
                b"w:t" if in_run => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"w:p" => out.push_str("\n\n"),
            Ok(Event::Empty(e)) if in_run => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| DocfillError::Extraction(format!("bad XML text: {err}")))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:r" => in_run = false,
                b"w:p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocfillError::Extraction(format!(
                    "malformed {DOCUMENT_PART} at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(out)
}

/// Renders filled text as a minimal `.docx` document.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxRenderer;

impl DocumentRenderer for DocxRenderer {
    fn extension(&self) -> &'static str {
        "docx"
    }

    fn content_type(&self) -> &'static str {
        DOCX_CONTENT_TYPE
    }

    fn render(&self, text: &str) -> Result<Vec<u8>> {
        let document = document_xml(text);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for (name, body) in [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", PACKAGE_RELS_XML),
            (DOCUMENT_PART, document.as_str()),
        ] {
            zip.start_file(name, options)
                .map_err(|e| DocfillError::Render(format!("{name}: {e}")))?;
            zip.write_all(body.as_bytes())?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| DocfillError::Render(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

fn document_xml(text: &str) -> String {
    let mut xml = String::with_capacity(DOCUMENT_HEAD.len() + text.len() * 2);
    xml.push_str(DOCUMENT_HEAD);

    for paragraph in text.split("\n\n") {
        if paragraph.is_empty() {
            xml.push_str("<w:p/>");
            continue;
        }
        xml.push_str("<w:p><w:r>");
        for (i, line) in paragraph.split('\n').enumerate() {
            if i > 0 {
                xml.push_str("<w:br/>");
            }
            for (j, cell) in line.split('\t').enumerate() {
                if j > 0 {
                    xml.push_str("<w:tab/>");
                }
                if !cell.is_empty() {
                    xml.push_str(r#"<w:t xml:space="preserve">"#);
                    xml.push_str(&escape(cell));
                    xml.push_str("</w:t>");
                }
            }
        }
        xml.push_str("</w:r></w:p>");
    }

    xml.push_str(DOCUMENT_TAIL);
    xml
}
