//! Prompt Builder: pure, deterministic prompt text per section.

use serde::Serialize;

use crate::document::SectionKind;
use crate::llm_client::prompts::{PLAIN_TEXT_INSTRUCTION, SYSTEM, TRUTHFULNESS_INSTRUCTION};
use crate::llm_client::ProviderKind;

/// Local models get a shorter job description; small context windows truncate the
/// section text otherwise.
pub const LOCAL_JD_CHAR_LIMIT: usize = 3000;

/// Replace: {truthfulness}, {job_description}, {section_text}, {format_rules},
///          {plain_text}
const SUMMARY_PROMPT_TEMPLATE: &str = r#"{truthfulness}

Rewrite the professional summary below so it speaks directly to the job description.
Keep the candidate's voice and keep it to roughly the same length.

JOB DESCRIPTION:
{job_description}

CURRENT SUMMARY:
{section_text}

OUTPUT RULES:
{format_rules}
{plain_text}"#;

/// Replace: {truthfulness}, {job_description}, {section_text}, {format_rules},
///          {plain_text}
const SKILLS_PROMPT_TEMPLATE: &str = r#"{truthfulness}

Reorder and regroup the skills below so the ones the job description asks for come
first. Drop nothing the candidate listed unless it is a duplicate, and add nothing new.

JOB DESCRIPTION:
{job_description}

CURRENT SKILLS:
{section_text}

OUTPUT RULES:
{format_rules}
{plain_text}"#;

const SUMMARY_FORMAT_RULES: &str =
    "- Write one or more plain paragraphs; put each paragraph on its own line.";

const SKILLS_FORMAT_RULES: &str =
    "- Put one skill line per line, the way the current skills are laid out.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds the prompt for one section. Same inputs always give the same text.
pub fn build_prompt(
    kind: SectionKind,
    job_description: &str,
    section_text: &str,
    provider: ProviderKind,
) -> Prompt {
    let job_description = job_description.trim();
    let job_description = if provider.is_local() {
        truncate_chars(job_description, LOCAL_JD_CHAR_LIMIT)
    } else {
        job_description
    };

    let (template, rules) = match kind {
        SectionKind::Summary => (SUMMARY_PROMPT_TEMPLATE, SUMMARY_FORMAT_RULES.to_string()),
        SectionKind::Skills => (SKILLS_PROMPT_TEMPLATE, SKILLS_FORMAT_RULES.to_string()),
    };

    let mut format_rules = rules;
    if let Some(glyph) = leading_glyph(section_text) {
        format_rules.push_str(&format!(
            "\n- Start every line with \"{glyph} \" as the current text does."
        ));
    }

    let user = fill(
        template,
        &[
            ("{truthfulness}", TRUTHFULNESS_INSTRUCTION),
            ("{format_rules}", format_rules.as_str()),
            ("{plain_text}", PLAIN_TEXT_INSTRUCTION),
            ("{job_description}", job_description),
            ("{section_text}", section_text.trim()),
        ],
    );

    Prompt {
        system: SYSTEM.to_string(),
        user,
    }
}

/// Substitutes placeholders in one pass over the template. Inserted values are
/// never scanned again, so user text that looks like a placeholder stays literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    while let Some(at) = rest.find('{') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        match values.iter().find(|(key, _)| rest.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &rest[key.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Bullet glyphs typed into the text itself, as opposed to list numbering.
pub(crate) const BULLET_GLYPHS: &[char] = &['•', '◦', '▪', '‣', '●', '○', '■', '-', '*', '–'];

/// The typed bullet glyph shared by every line, if any.
pub(crate) fn leading_glyph(section_text: &str) -> Option<char> {
    let mut lines = section_text.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next()?.chars().next()?;
    if !BULLET_GLYPHS.contains(&first) {
        return None;
    }
    lines
        .all(|l| l.starts_with(first))
        .then_some(first)
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
