use std::io::{Cursor, Read};

use bytes::Bytes;
use roxmltree::Node;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::document::{Document, DocumentError, Paragraph, DOCUMENT_PART, W_NS};

/// Opens `.docx` bytes and indexes the body paragraphs.
///
/// Fails with [`DocumentError::Format`] when the bytes are not a zip archive, the
/// archive has no `word/document.xml`, or that part is not well-formed XML, and with
/// [`DocumentError::Empty`] when the body holds no paragraphs.
pub fn read_document(source: Bytes) -> Result<Document, DocumentError> {
    let mut archive = ZipArchive::new(Cursor::new(&source[..]))
        .map_err(|e| DocumentError::Format(format!("not a zip archive ({e})")))?;

    let mut xml = String::new();
    match archive.by_name(DOCUMENT_PART) {
        Ok(mut part) => {
            part.read_to_string(&mut xml)
                .map_err(|e| DocumentError::Format(format!("unreadable {DOCUMENT_PART}: {e}")))?;
        }
        Err(ZipError::FileNotFound) => {
            return Err(DocumentError::Format(format!(
                "archive has no {DOCUMENT_PART}"
            )))
        }
        Err(e) => return Err(DocumentError::Format(e.to_string())),
    }

    let (prefix, paragraphs) = parse_body(&xml)?;
    if paragraphs.is_empty() {
        return Err(DocumentError::Empty);
    }

    debug!(
        paragraphs = paragraphs.len(),
        xml_bytes = xml.len(),
        "docx parsed"
    );

    Ok(Document {
        source,
        xml,
        prefix,
        paragraphs,
        modified: false,
    })
}

/// Parses `word/document.xml` text and returns the namespace prefix in use plus the
/// direct `w:p` children of `w:body`, in order.
pub(crate) fn parse_body(xml: &str) -> Result<(String, Vec<Paragraph>), DocumentError> {
    let tree = roxmltree::Document::parse(xml)
        .map_err(|e| DocumentError::Format(format!("malformed {DOCUMENT_PART}: {e}")))?;

    let body = tree
        .root_element()
        .children()
        .find(|n| n.has_tag_name((W_NS, "body")))
        .ok_or_else(|| DocumentError::Format("document has no body".to_string()))?;

    let prefix = body.lookup_prefix(W_NS).unwrap_or("w").to_string();

    let paragraphs = body
        .children()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .enumerate()
        .map(|(index, node)| read_paragraph(index, node))
        .collect();

    Ok((prefix, paragraphs))
}

fn read_paragraph(index: usize, node: Node<'_, '_>) -> Paragraph {
    let properties = child(node, "pPr");

    let style_id = properties
        .and_then(|ppr| child(ppr, "pStyle"))
        .and_then(|s| s.attribute((W_NS, "val")))
        .map(str::to_string);

    let list_level = properties.and_then(|ppr| child(ppr, "numPr")).map(|num| {
        child(num, "ilvl")
            .and_then(|l| l.attribute((W_NS, "val")))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    });

    let section_break = properties
        .and_then(|ppr| child(ppr, "sectPr"))
        .map(|n| n.range());

    let run_properties = node
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "r")))
        .find_map(|run| child(run, "rPr"))
        .map(|n| n.range());

    Paragraph {
        index,
        style_id,
        text: paragraph_text(node),
        list_level,
        span: node.range(),
        properties: properties.map(|n| n.range()),
        section_break,
        run_properties,
    }
}

fn paragraph_text(node: Node<'_, '_>) -> String {
    let mut text = String::new();
    for n in node.descendants().filter(|n| n.is_element()) {
        if n.tag_name().namespace() != Some(W_NS) {
            continue;
        }
        match n.tag_name().name() {
            "t" => text.push_str(n.text().unwrap_or_default()),
            "tab" if n.parent().is_some_and(|p| p.has_tag_name((W_NS, "r"))) => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name((W_NS, local)))
}
