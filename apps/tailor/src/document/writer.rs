//! Document Writer: splices replacement lines into located sections.
//!
//! Line `i` of an edit becomes a fresh paragraph carrying the paragraph properties
//! (`w:pPr`) of the `i`-th non-blank original paragraph and the run properties of
//! that paragraph's first run. Lines beyond the original count reuse the last
//! non-blank paragraph's properties; surplus original paragraphs are dropped.
//! Blank spacers inside the range are kept while lines remain to be written after
//! them and dropped otherwise. Whatever sits between paragraphs inside the range
//! (bookmarks, tables) is kept in place, and every byte outside the edited ranges
//! is copied through.

use std::io::{Cursor, Write};

use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::document::reader::parse_body;
use crate::document::{Document, Paragraph, Section, DOCUMENT_PART};

#[derive(Debug, Error)]
pub enum SpliceError {
    #[error(
        "section {heading:?} has an invalid paragraph range {start}..{end} (document has {len})"
    )]
    InvalidRange {
        heading: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("sections {first:?} and {second:?} overlap")]
    Overlap { first: String, second: String },

    #[error("no replacement lines for section {0:?}")]
    NoLines(String),

    #[error("spliced document no longer parses: {0}")]
    Reparse(String),

    #[error("failed to rebuild archive: {0}")]
    Archive(#[from] ZipError),

    #[error("failed to write archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Replacement text for one located section.
#[derive(Debug, Clone)]
pub struct SectionEdit {
    pub section: Section,
    pub lines: Vec<String>,
}

/// Applies `edits` to `document` and returns it. The paragraph index is rebuilt from
/// the new XML, so the returned document reflects the splice.
pub fn splice(mut document: Document, edits: &[SectionEdit]) -> Result<Document, SpliceError> {
    if edits.is_empty() {
        return Ok(document);
    }

    let mut ordered: Vec<&SectionEdit> = edits.iter().collect();
    ordered.sort_by_key(|e| e.section.start);
    validate(&document, &ordered)?;

    let mut xml = String::with_capacity(document.xml.len() + 1024);
    let mut cursor = 0;

    for edit in ordered {
        let originals = &document.paragraphs[edit.section.range()];
        let first = &originals[0];
        let last = &originals[originals.len() - 1];

        xml.push_str(&document.xml[cursor..first.span.start]);

        // A section break travels with the last paragraph of the range.
        let trailing_break = originals
            .iter()
            .rev()
            .find_map(|p| p.section_break.as_ref())
            .map(|r| document.slice(r).to_string());

        // Lines land on paragraphs that carry text; the last of them takes any
        // overflow. Blank spacers are never used as templates.
        let overflow_slot = originals
            .iter()
            .rposition(|p| !p.is_blank())
            .unwrap_or(originals.len() - 1);

        let mut lines = edit.lines.iter().peekable();
        for (slot, original) in originals.iter().enumerate() {
            if slot == overflow_slot {
                while let Some(line) = lines.next() {
                    let closing = lines.peek().is_none();
                    let section_break = if closing { trailing_break.as_deref() } else { None };
                    render_paragraph(&mut xml, &document, original, line, section_break);
                }
            } else if !original.is_blank() {
                if let Some(line) = lines.next() {
                    let closing = lines.peek().is_none();
                    let section_break = if closing { trailing_break.as_deref() } else { None };
                    render_paragraph(&mut xml, &document, original, line, section_break);
                }
            } else if lines.peek().is_some() && original.section_break.is_none() {
                // Spacer between two written lines stays as it was.
                xml.push_str(&document.xml[original.span.clone()]);
            }

            if let Some(next) = originals.get(slot + 1) {
                xml.push_str(&document.xml[original.span.end..next.span.start]);
            }
        }

        cursor = last.span.end;
    }
    xml.push_str(&document.xml[cursor..]);

    let (prefix, paragraphs) = parse_body(&xml).map_err(|e| SpliceError::Reparse(e.to_string()))?;
    debug!(
        before = document.paragraphs.len(),
        after = paragraphs.len(),
        edits = edits.len(),
        "document spliced"
    );

    document.xml = xml;
    document.prefix = prefix;
    document.paragraphs = paragraphs;
    document.modified = true;
    Ok(document)
}

fn validate(document: &Document, ordered: &[&SectionEdit]) -> Result<(), SpliceError> {
    let len = document.paragraphs.len();
    let mut previous: Option<&Section> = None;

    for edit in ordered {
        let section = &edit.section;
        if section.is_empty() || section.end > len {
            return Err(SpliceError::InvalidRange {
                heading: section.heading.clone(),
                start: section.start,
                end: section.end,
                len,
            });
        }
        if edit.lines.is_empty() {
            return Err(SpliceError::NoLines(section.heading.clone()));
        }
        if let Some(prev) = previous {
            if section.start < prev.end {
                return Err(SpliceError::Overlap {
                    first: prev.heading.clone(),
                    second: section.heading.clone(),
                });
            }
        }
        previous = Some(section);
    }
    Ok(())
}

fn render_paragraph(
    out: &mut String,
    document: &Document,
    template: &Paragraph,
    line: &str,
    section_break: Option<&str>,
) {
    let p = document.tag("p");
    let r = document.tag("r");

    out.push('<');
    out.push_str(&p);
    out.push('>');
    push_properties(out, document, template, section_break);

    out.push('<');
    out.push_str(&r);
    out.push('>');
    if let Some(rpr) = &template.run_properties {
        out.push_str(document.slice(rpr));
    }

    let t = document.tag("t");
    let tab = document.tag("tab");
    for (i, segment) in line.split('\t').enumerate() {
        if i > 0 {
            out.push_str(&format!("<{tab}/>"));
        }
        if !segment.is_empty() {
            out.push_str(&format!(r#"<{t} xml:space="preserve">"#));
            escape_text(out, segment);
            out.push_str(&format!("</{t}>"));
        }
    }

    out.push_str(&format!("</{r}></{p}>"));
}

/// Writes the template's `w:pPr` with its own section break removed, then attaches
/// `section_break` when given.
fn push_properties(
    out: &mut String,
    document: &Document,
    template: &Paragraph,
    section_break: Option<&str>,
) {
    let Some(ppr) = &template.properties else {
        if let Some(sect) = section_break {
            let tag = document.tag("pPr");
            out.push_str(&format!("<{tag}>{sect}</{tag}>"));
        }
        return;
    };

    let raw = document.slice(ppr);
    let own = template
        .section_break
        .as_ref()
        .map(|r| (r.start - ppr.start)..(r.end - ppr.start));
    let stripped = match own {
        Some(r) => format!("{}{}", &raw[..r.start], &raw[r.end..]),
        None => raw.to_string(),
    };

    let Some(sect) = section_break else {
        out.push_str(&stripped);
        return;
    };

    let tag = document.tag("pPr");
    if stripped.ends_with("/>") {
        // `<w:pPr/>` has nothing to keep besides the break.
        out.push_str(&format!("<{tag}>{sect}</{tag}>"));
    } else {
        let close = format!("</{tag}>");
        match stripped.rfind(&close) {
            Some(at) => {
                out.push_str(&stripped[..at]);
                out.push_str(sect);
                out.push_str(&stripped[at..]);
            }
            None => out.push_str(&stripped),
        }
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            // XML 1.0 forbids most C0 controls.
            c if (c as u32) < 0x20 && !matches!(c, '\n' | '\r') => {}
            c => out.push(c),
        }
    }
}

impl Document {
    /// Serializes the document. An untouched document returns its original bytes; a
    /// spliced one rebuilds the archive with every other part copied raw.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SpliceError> {
        if !self.modified {
            return Ok(self.source.to_vec());
        }

        let mut archive = ZipArchive::new(Cursor::new(&self.source[..]))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.source.len())));

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            if entry.name() == DOCUMENT_PART {
                drop(entry);
                let options =
                    FileOptions::default().compression_method(CompressionMethod::Deflated);
                writer.start_file(DOCUMENT_PART, options)?;
                writer.write_all(self.xml.as_bytes())?;
            } else {
                writer.raw_copy_file(entry)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}
