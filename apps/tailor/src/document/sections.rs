//! Section Locator: finds the Summary and Skills ranges in a paragraph list.
//!
//! Headings are matched on normalized text against an allow-list. A section runs from
//! the paragraph after its heading up to the next heading of any kind, with blank
//! spacer paragraphs trimmed from both ends.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::Paragraph;

const SUMMARY_HEADINGS: &[&str] = &[
    "summary",
    "professional summary",
    "career summary",
    "executive summary",
    "profile",
    "professional profile",
    "objective",
    "career objective",
    "about",
    "about me",
    "overview",
];

const SKILLS_HEADINGS: &[&str] = &[
    "skills",
    "technical skills",
    "core skills",
    "key skills",
    "skills summary",
    "core competencies",
    "competencies",
    "expertise",
    "areas of expertise",
    "technologies",
];

/// Headings that end a section without starting one we rewrite.
const OTHER_HEADINGS: &[&str] = &[
    "experience",
    "work experience",
    "professional experience",
    "relevant experience",
    "employment",
    "employment history",
    "work history",
    "career history",
    "education",
    "academic background",
    "qualifications",
    "projects",
    "key projects",
    "notable projects",
    "certifications",
    "certificates",
    "credentials",
    "awards",
    "publications",
    "languages",
    "interests",
    "volunteer experience",
    "references",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Summary,
    Skills,
}

impl SectionKind {
    pub const ALL: [SectionKind; 2] = [SectionKind::Summary, SectionKind::Skills];

    pub fn label(self) -> &'static str {
        match self {
            SectionKind::Summary => "Summary",
            SectionKind::Skills => "Skills",
        }
    }
}

/// A located section. `start..end` indexes the body paragraphs after the heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub heading_index: usize,
    pub heading: String,
    pub start: usize,
    pub end: usize,
}

impl Section {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    Section(SectionKind),
    Other,
}

#[derive(Debug, Clone)]
pub struct SectionLocator {
    summary: Vec<String>,
    skills: Vec<String>,
    other: Vec<String>,
}

impl Default for SectionLocator {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

impl SectionLocator {
    /// Default allow-lists extended with extra labels (normalized the same way as
    /// document text).
    pub fn new(extra_summary: &[String], extra_skills: &[String]) -> Self {
        let build = |defaults: &[&str], extra: &[String]| {
            let mut labels: Vec<String> = defaults
                .iter()
                .map(|s| s.to_string())
                .chain(extra.iter().map(|s| normalize_heading(s)))
                .filter(|s| !s.is_empty())
                .collect();
            labels.dedup();
            labels
        };

        Self {
            summary: build(SUMMARY_HEADINGS, extra_summary),
            skills: build(SKILLS_HEADINGS, extra_skills),
            other: OTHER_HEADINGS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Scans once and returns at most one section per kind, in document order.
    /// When a label repeats, the first heading wins and later ones only end ranges.
    pub fn locate(&self, paragraphs: &[Paragraph]) -> Vec<Section> {
        let mut found: Vec<Section> = Vec::new();
        let mut open: Option<(SectionKind, usize)> = None;

        for (i, paragraph) in paragraphs.iter().enumerate() {
            let Some(heading) = self.classify(paragraph) else {
                continue;
            };

            if let Some((kind, heading_index)) = open.take() {
                found.push(close(paragraphs, kind, heading_index, i));
            }

            if let Heading::Section(kind) = heading {
                if !found.iter().any(|s| s.kind == kind) {
                    open = Some((kind, i));
                }
            }
        }

        if let Some((kind, heading_index)) = open {
            found.push(close(paragraphs, kind, heading_index, paragraphs.len()));
        }

        found
    }

    fn classify(&self, paragraph: &Paragraph) -> Option<Heading> {
        let normalized = normalize_heading(&paragraph.text);
        if normalized.is_empty() {
            return None;
        }
        if self.summary.contains(&normalized) {
            return Some(Heading::Section(SectionKind::Summary));
        }
        if self.skills.contains(&normalized) {
            return Some(Heading::Section(SectionKind::Skills));
        }
        if self.other.contains(&normalized) || has_heading_style(paragraph) {
            return Some(Heading::Other);
        }
        None
    }
}

fn close(paragraphs: &[Paragraph], kind: SectionKind, heading_index: usize, end: usize) -> Section {
    let mut start = heading_index + 1;
    let mut end = end;
    while start < end && paragraphs[start].is_blank() {
        start += 1;
    }
    while end > start && paragraphs[end - 1].is_blank() {
        end -= 1;
    }
    Section {
        kind,
        heading_index,
        heading: paragraphs[heading_index].text.trim().to_string(),
        start,
        end,
    }
}

fn has_heading_style(paragraph: &Paragraph) -> bool {
    paragraph.style_id.as_deref().is_some_and(|style| {
        let style = style.to_ascii_lowercase();
        style.starts_with("heading") || style == "title"
    })
}

/// Lowercases, drops decoration characters (`: - _ = * # |` and bullets) and collapses
/// whitespace, so "CORE SKILLS:" and "— Core  Skills —" both become "core skills".
pub fn normalize_heading(text: &str) -> String {
    static DECORATION: OnceLock<Regex> = OnceLock::new();
    let decoration = DECORATION.get_or_init(|| {
        Regex::new(r"[:\-_=*#|•·–—]+").expect("decoration pattern is valid")
    });

    let lowered = text.trim().to_lowercase();
    decoration
        .replace_all(&lowered, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
