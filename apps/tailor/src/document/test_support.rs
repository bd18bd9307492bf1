//! In-memory `.docx` fixtures for tests.

use std::io::{Cursor, Read, Write};

use bytes::Bytes;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::document::DOCUMENT_PART;

pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

pub const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style></w:styles>"#;

pub fn heading(text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
    )
}

pub fn para(text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:spacing w:after="120"/></w:pPr><w:r><w:rPr><w:rFonts w:ascii="Calibri"/><w:sz w:val="22"/></w:rPr><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#
    )
}

pub fn list_item(text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="ListBullet"/><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:rPr><w:b/><w:sz w:val="20"/></w:rPr><w:t>{text}</w:t></w:r></w:p>"#
    )
}

pub fn empty_para() -> String {
    "<w:p/>".to_string()
}

pub fn body(paragraphs: &[String]) -> String {
    paragraphs.concat()
}

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
    )
}

/// A minimal but complete archive: content types, styles, and the given body.
pub fn docx_from_body(body: &str) -> Bytes {
    docx_with_parts(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        (DOCUMENT_PART, &document_xml(body)),
        ("word/styles.xml", STYLES),
    ])
}

pub fn docx_with_parts(parts: &[(&str, &str)]) -> Bytes {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in parts {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    Bytes::from(writer.finish().unwrap().into_inner())
}

/// Every archive entry as (name, uncompressed bytes), in archive order.
pub fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

/// The standard fixture used across tests: header, Summary, Skills (3 bullets),
/// Experience.
pub fn sample_resume() -> Bytes {
    docx_from_body(&body(&[
        para("Jane Doe"),
        para("jane@example.com | (555) 010-2030"),
        heading("Professional Summary"),
        para("Backend engineer with seven years building payment systems in Rust and Go."),
        empty_para(),
        heading("Skills"),
        list_item("Rust, Go, Python"),
        list_item("PostgreSQL, Redis"),
        list_item("Kubernetes, Terraform"),
        heading("Experience"),
        para("Senior Engineer, Acme Payments, 2019 to present"),
        para("Led the ledger rewrite serving 2M daily transactions."),
    ]))
}
