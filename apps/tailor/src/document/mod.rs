//! Word-processing document model.
//!
//! A `.docx` is a zip archive; the body lives in `word/document.xml`. We keep the
//! original archive bytes and the XML text verbatim, and index body paragraphs by
//! byte span so a splice can rewrite a handful of paragraphs while every other byte
//! is copied through unchanged.

use std::ops::Range;

use bytes::Bytes;
use thiserror::Error;

pub mod reader;
pub mod sections;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use reader::read_document;
pub use sections::{Section, SectionKind, SectionLocator};
pub use writer::{splice, SectionEdit, SpliceError};

/// WordprocessingML main namespace.
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
/// Archive part holding the document body.
pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("not a valid .docx document: {0}")]
    Format(String),

    #[error("document contains no paragraphs")]
    Empty,
}

/// A body-level paragraph.
#[derive(Debug, Clone)]
pub struct Paragraph {
    pub index: usize,
    /// Value of `w:pStyle`, e.g. `Heading1` or `ListBullet`.
    pub style_id: Option<String>,
    pub text: String,
    /// `Some(level)` when the paragraph carries list numbering (`w:numPr`).
    pub list_level: Option<u32>,
    pub(crate) span: Range<usize>,
    pub(crate) properties: Option<Range<usize>>,
    pub(crate) section_break: Option<Range<usize>>,
    pub(crate) run_properties: Option<Range<usize>>,
}

impl Paragraph {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn is_list_item(&self) -> bool {
        self.list_level.is_some()
    }
}

/// A parsed `.docx`. Owned by exactly one request at a time; the writer takes it by
/// value and hands it back.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) source: Bytes,
    pub(crate) xml: String,
    /// Namespace prefix bound to [`W_NS`] in the source XML (usually `w`).
    pub(crate) prefix: String,
    pub(crate) paragraphs: Vec<Paragraph>,
    pub(crate) modified: bool,
}

impl Document {
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Raw XML of a paragraph exactly as it appears in `word/document.xml`.
    pub fn paragraph_xml(&self, index: usize) -> Option<&str> {
        self.paragraphs
            .get(index)
            .map(|p| &self.xml[p.span.clone()])
    }

    /// Section body joined line by line, blank paragraphs skipped.
    pub fn section_text(&self, section: &Section) -> String {
        self.paragraphs[section.range()]
            .iter()
            .filter(|p| !p.is_blank())
            .map(|p| p.text.trim())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The paragraphs of a section that carry text, trimmed.
    pub fn section_lines(&self, section: &Section) -> Vec<String> {
        self.paragraphs[section.range()]
            .iter()
            .filter(|p| !p.is_blank())
            .map(|p| p.text.trim().to_string())
            .collect()
    }

    /// True when every non-blank paragraph of the section is a numbered list item.
    pub fn section_is_list(&self, section: &Section) -> bool {
        let mut content = self.paragraphs[section.range()]
            .iter()
            .filter(|p| !p.is_blank())
            .peekable();
        content.peek().is_some() && content.all(Paragraph::is_list_item)
    }

    pub(crate) fn slice(&self, range: &Range<usize>) -> &str {
        &self.xml[range.clone()]
    }

    pub(crate) fn tag(&self, local: &str) -> String {
        if self.prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}:{local}", self.prefix)
        }
    }
}
