//! Tailoring pipeline: read → locate → prompt → generate → normalize → splice.
//!
//! Summary is handled before Skills and the provider is called at most once per
//! section, sequentially. Any failure aborts the request; nothing partial is returned.

pub mod prompts;
pub mod response;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::{read_document, splice, Document, SectionEdit, SectionKind, SectionLocator};
use crate::errors::AppError;
use crate::llm_client::{GeneratorFactory, ModelSelection, TextGenerator};
use crate::tailoring::prompts::build_prompt;
use crate::tailoring::response::{judge, normalize_response, Outcome};

/// Output file name offered to the browser and used by the CLI default.
pub const OUTPUT_FILE_NAME: &str = "tailored_resume.docx";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// One tailoring job. Lives for a single request; nothing is persisted.
#[derive(Debug, Clone)]
pub struct TailoringRequest {
    pub resume: Bytes,
    pub job_description: String,
    pub selection: ModelSelection,
    /// User-supplied key; wins over the configured one.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct TailorOptions {
    /// Rewrites longer than this multiple of the original are refused. Zero disables.
    pub max_growth_ratio: f64,
}

impl Default for TailorOptions {
    fn default() -> Self {
        Self {
            max_growth_ratio: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub kind: SectionKind,
    pub heading: String,
    pub original: String,
    /// Cleaned model output, present whenever the provider was called.
    pub updated: Option<String>,
    pub outcome: Outcome,
    pub rewritten: bool,
}

#[derive(Debug, Clone)]
pub struct TailoringResult {
    pub document: Vec<u8>,
    pub sections: Vec<SectionReport>,
}

impl TailoringResult {
    pub fn rewritten(&self, kind: SectionKind) -> bool {
        self.sections
            .iter()
            .any(|s| s.kind == kind && s.rewritten)
    }

    pub fn rewrite_count(&self) -> usize {
        self.sections.iter().filter(|s| s.rewritten).count()
    }
}

/// What the parser sees in an uploaded resume, without calling a provider.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub paragraphs: usize,
    pub sections: Vec<SectionPreview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionPreview {
    pub kind: SectionKind,
    pub heading: String,
    pub start: usize,
    pub end: usize,
    pub is_list: bool,
    pub text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs the full pipeline.
///
/// The document is read before a generator is built, so a bad upload fails with a
/// document error before credentials are checked or any request leaves the process.
pub async fn tailor(
    request: &TailoringRequest,
    generators: &dyn GeneratorFactory,
    locator: &SectionLocator,
    options: &TailorOptions,
) -> Result<TailoringResult, AppError> {
    let document = read_document(request.resume.clone())?;
    let sections = locator.locate(document.paragraphs());
    info!(
        paragraphs = document.len(),
        sections = sections.len(),
        "resume parsed"
    );

    let mut generator: Option<Box<dyn TextGenerator>> = None;
    let mut reports = Vec::with_capacity(sections.len());
    let mut edits = Vec::new();

    for kind in SectionKind::ALL {
        let Some(section) = sections.iter().find(|s| s.kind == kind) else {
            debug!(section = kind.label(), "section not found, skipping");
            continue;
        };

        let original = document.section_text(section);
        if section.is_empty() || original.is_empty() {
            reports.push(SectionReport {
                kind,
                heading: section.heading.clone(),
                original,
                updated: None,
                outcome: Outcome::Empty,
                rewritten: false,
            });
            continue;
        }

        let prompt = build_prompt(
            kind,
            &request.job_description,
            &original,
            request.selection.provider,
        );

        // Built on first use: a resume with nothing to rewrite never needs a key.
        let active: &dyn TextGenerator = match &mut generator {
            Some(g) => &**g,
            slot @ None => &**slot.insert(
                generators.build(&request.selection, request.api_key.as_deref())?,
            ),
        };
        let raw = active.generate(&prompt.user, &prompt.system).await?;

        let lines = normalize_response(kind, &raw, document.section_is_list(section));
        if lines.is_empty() {
            return Err(AppError::ProviderResponse(format!(
                "the model returned no usable text for {}",
                kind.label()
            )));
        }

        let outcome = judge(&original, &lines, options.max_growth_ratio);
        match outcome {
            Outcome::Rewritten => {
                info!(section = kind.label(), lines = lines.len(), "section rewritten")
            }
            Outcome::RejectedTooLong => warn!(
                section = kind.label(),
                "rewrite exceeds {}x the original length, keeping original",
                options.max_growth_ratio
            ),
            _ => info!(section = kind.label(), "model returned the section unchanged"),
        }

        let updated = lines.join("\n");
        if outcome.is_rewritten() {
            edits.push(SectionEdit {
                section: section.clone(),
                lines,
            });
        }
        reports.push(SectionReport {
            kind,
            heading: section.heading.clone(),
            original,
            updated: Some(updated),
            outcome,
            rewritten: outcome.is_rewritten(),
        });
    }

    let document = splice(document, &edits)?;
    Ok(TailoringResult {
        document: document.to_bytes()?,
        sections: reports,
    })
}

/// Parses the upload and reports the located sections.
pub fn preview(resume: Bytes, locator: &SectionLocator) -> Result<Preview, AppError> {
    let document = read_document(resume)?;
    Ok(preview_document(&document, locator))
}

pub(crate) fn preview_document(document: &Document, locator: &SectionLocator) -> Preview {
    let sections = locator
        .locate(document.paragraphs())
        .into_iter()
        .map(|section| SectionPreview {
            kind: section.kind,
            is_list: document.section_is_list(&section),
            text: document.section_text(&section),
            heading: section.heading,
            start: section.start,
            end: section.end,
        })
        .collect();

    Preview {
        paragraphs: document.len(),
        sections,
    }
}
