//! Upload handlers: tailoring and the parser preview.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::document::SectionKind;
use crate::errors::AppError;
use crate::llm_client::ModelSelection;
use crate::state::AppState;
use crate::tailoring::response::Outcome;
use crate::tailoring::{
    self, Preview, SectionReport, TailoringRequest, TailoringResult, OUTPUT_FILE_NAME,
};

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

// ────────────────────────────────────────────────────────────────────────────
// Form parsing
// ────────────────────────────────────────────────────────────────────────────

/// Every field either upload form may carry. Unknown fields are ignored.
#[derive(Debug, Default)]
struct UploadForm {
    resume: Option<(String, Bytes)>,
    job_description: Option<String>,
    job_description_file: Option<Bytes>,
    provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "resume" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await.map_err(multipart_error)?;
                    form.resume = Some((file_name, data));
                }
                "job_description_file" => {
                    form.job_description_file = Some(field.bytes().await.map_err(multipart_error)?);
                }
                "job_description" | "provider" | "model" | "api_key" => {
                    let value = field.text().await.map_err(multipart_error)?;
                    let value = Some(value).filter(|v| !v.trim().is_empty());
                    match name.as_str() {
                        "job_description" => form.job_description = value,
                        "provider" => form.provider = value,
                        "model" => form.model = value,
                        _ => form.api_key = value,
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// The uploaded resume, checked for extension and size.
    fn resume(&mut self, max_bytes: usize) -> Result<Bytes, AppError> {
        let (file_name, data) = self
            .resume
            .take()
            .ok_or_else(|| AppError::Validation("a resume file is required".to_string()))?;

        if !file_name.to_ascii_lowercase().ends_with(".docx") {
            return Err(AppError::Validation(format!(
                "'{file_name}' is not a .docx file"
            )));
        }
        if data.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "the resume is {} bytes; the limit is {} MB",
                data.len(),
                max_bytes / (1024 * 1024)
            )));
        }
        Ok(data)
    }

    /// Pasted text wins over an uploaded `.txt` file.
    fn job_description(&mut self) -> Result<String, AppError> {
        if let Some(text) = self.job_description.take() {
            return Ok(text);
        }
        let file = self.job_description_file.take().unwrap_or_default();
        let text = String::from_utf8(file.to_vec()).map_err(|_| {
            AppError::Validation("the job description file must be UTF-8 text".to_string())
        })?;
        if text.trim().is_empty() {
            return Err(AppError::Validation(
                "a job description is required".to_string(),
            ));
        }
        Ok(text)
    }

    /// `provider` picks the backend, `model` optionally overrides its default.
    /// With neither, the server default applies.
    fn selection(&self, default: &ModelSelection) -> Result<ModelSelection, AppError> {
        let mut selection = match (&self.provider, &self.model) {
            (Some(provider), _) => ModelSelection::parse(provider)?,
            (None, Some(model)) => return Ok(ModelSelection::parse(model)?),
            (None, None) => return Ok(default.clone()),
        };
        if let Some(model) = &self.model {
            selection.model = Some(model.trim().to_string());
        }
        Ok(selection)
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(e.body_text())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/tailor
///
/// Multipart form: `resume` (.docx), `job_description` or `job_description_file`,
/// `provider`, optional `model` and `api_key`. Responds with the tailored document.
pub async fn handle_tailor(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let resume = form.resume(state.config.max_upload_bytes)?;
    let job_description = form.job_description()?;
    let selection = form.selection(&state.config.default_model)?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "tailor",
        request_id = %request_id,
        provider = %selection.provider
    );

    let request = TailoringRequest {
        resume,
        job_description,
        selection,
        api_key: form.api_key.take(),
    };

    let result = async {
        info!(resume_bytes = request.resume.len(), "tailoring request received");
        let result = tailoring::tailor(
            &request,
            state.generators.as_ref(),
            &state.locator,
            &state.config.tailor_options(),
        )
        .await?;
        info!(rewritten = result.rewrite_count(), "tailoring finished");
        Ok::<_, AppError>(result)
    }
    .instrument(span)
    .await?;

    docx_response(result, request_id)
}

/// POST /api/v1/resume/preview
///
/// Multipart form with `resume` only. Returns what the parser found, without
/// calling a provider.
pub async fn handle_preview(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Preview>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let resume = form.resume(state.config.max_upload_bytes)?;
    Ok(Json(tailoring::preview(resume, &state.locator)?))
}

// ────────────────────────────────────────────────────────────────────────────
// Response
// ────────────────────────────────────────────────────────────────────────────

/// Per-section result carried in the `x-section-outcomes` header.
#[derive(Debug, Serialize)]
struct SectionOutcome<'a> {
    kind: SectionKind,
    heading: &'a str,
    outcome: Outcome,
    original: &'a str,
    updated: Option<&'a str>,
    original_words: usize,
    updated_words: Option<usize>,
}

impl<'a> From<&'a SectionReport> for SectionOutcome<'a> {
    fn from(report: &'a SectionReport) -> Self {
        Self {
            kind: report.kind,
            heading: &report.heading,
            outcome: report.outcome,
            original: &report.original,
            updated: report.updated.as_deref(),
            original_words: word_count(&report.original),
            updated_words: report.updated.as_deref().map(word_count),
        }
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// JSON with every non-ASCII character written as a `\u` escape, so it fits in a
/// header value.
fn ascii_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    let json = serde_json::to_string(value).map_err(|e| AppError::Internal(e.into()))?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    Ok(out)
}

fn docx_response(result: TailoringResult, request_id: Uuid) -> Result<Response, AppError> {
    let flag = |kind: SectionKind| {
        HeaderValue::from_static(if result.rewritten(kind) { "true" } else { "false" })
    };
    let disposition =
        HeaderValue::from_str(&format!("attachment; filename=\"{OUTPUT_FILE_NAME}\""))
            .map_err(|e| AppError::Internal(e.into()))?;
    let request_id = HeaderValue::from_str(&request_id.to_string())
        .map_err(|e| AppError::Internal(e.into()))?;
    let outcomes: Vec<SectionOutcome> = result.sections.iter().map(SectionOutcome::from).collect();
    let outcomes = HeaderValue::from_str(&ascii_json(&outcomes)?)
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DOCX_CONTENT_TYPE));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(HeaderName::from_static("x-summary-rewritten"), flag(SectionKind::Summary));
    headers.insert(HeaderName::from_static("x-skills-rewritten"), flag(SectionKind::Skills));
    headers.insert(HeaderName::from_static("x-section-outcomes"), outcomes);
    headers.insert(HeaderName::from_static("x-request-id"), request_id);

    Ok((headers, result.document).into_response())
}
