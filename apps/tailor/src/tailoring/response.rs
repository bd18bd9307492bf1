//! Cleans model output into paragraph lines and decides whether to keep it.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::document::sections::normalize_heading;
use crate::document::SectionKind;
use crate::llm_client::strip_fences;
use crate::tailoring::prompts::BULLET_GLYPHS;

/// What happened to one located section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Rewritten,
    /// The model handed back the original text.
    Unchanged,
    /// The rewrite grew past the allowed ratio; the original stays.
    RejectedTooLong,
    /// Heading found but nothing under it.
    Empty,
}

impl Outcome {
    pub fn is_rewritten(self) -> bool {
        matches!(self, Outcome::Rewritten)
    }
}

/// Turns a raw reply into trimmed, non-empty lines.
///
/// `numbered` is true when the target paragraphs are list items, in which case typed
/// bullets and `1.` markers are dropped since the list numbering draws its own.
pub fn normalize_response(kind: SectionKind, raw: &str, numbered: bool) -> Vec<String> {
    static EMPHASIS: OnceLock<Regex> = OnceLock::new();
    static ORDINAL: OnceLock<Regex> = OnceLock::new();
    let emphasis = EMPHASIS.get_or_init(|| {
        Regex::new(r"(\*\*|__)(.+?)(\*\*|__)").expect("emphasis pattern is valid")
    });
    let ordinal =
        ORDINAL.get_or_init(|| Regex::new(r"^\d{1,2}[.)]\s+").expect("ordinal pattern is valid"));

    let text = strip_fences(raw);
    let mut lines: Vec<String> = text
        .lines()
        .map(|line| {
            let line = line.trim().trim_start_matches('#').trim();
            emphasis.replace_all(line, "$2").replace('`', "")
        })
        .filter(|line| !line.is_empty())
        .collect();

    if let Some(first) = lines.first_mut() {
        match strip_label(kind, first) {
            Some(rest) if rest.is_empty() => {
                lines.remove(0);
            }
            Some(rest) => *first = rest,
            None => {}
        }
    }

    if numbered {
        for line in &mut lines {
            let stripped = line.trim_start_matches(BULLET_GLYPHS).trim_start();
            *line = ordinal.replace(stripped, "").into_owned();
        }
        lines.retain(|l| !l.is_empty());
    }

    lines
}

/// Returns the remainder of `line` after an echoed label ("Summary:", "Here is the
/// rewritten skills section:"), or `None` when the line is content.
fn strip_label(kind: SectionKind, line: &str) -> Option<String> {
    let lower = line.to_lowercase();
    if (lower.starts_with("here is") || lower.starts_with("here's") || lower.starts_with("sure"))
        && line.trim_end().ends_with(':')
    {
        return Some(String::new());
    }

    let (head, rest) = line.split_once(':')?;
    let head = normalize_heading(head);
    let label = kind.label().to_lowercase();
    let is_label = head == label
        || head.ends_with(&format!(" {label}"))
        || (kind == SectionKind::Summary
            && matches!(head.as_str(), "profile" | "professional profile"));
    is_label.then(|| rest.trim().to_string())
}

/// Compares the cleaned reply against the current text.
///
/// A `max_growth_ratio` of zero or less turns the length guard off.
pub fn judge(original: &str, updated: &[String], max_growth_ratio: f64) -> Outcome {
    let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    let original_flat = squash(original);
    let updated_flat = squash(&updated.join("\n"));

    if updated_flat == original_flat {
        return Outcome::Unchanged;
    }

    let original_len = original_flat.chars().count() as f64;
    let updated_len = updated_flat.chars().count() as f64;
    if max_growth_ratio > 0.0 && updated_len > original_len * max_growth_ratio {
        return Outcome::RejectedTooLong;
    }

    Outcome::Rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strips_fences_and_emphasis() {
        let raw = "```markdown\n**Rust**, Go\n__Kafka__ and `gRPC`\n```";
        assert_eq!(
            normalize_response(SectionKind::Skills, raw, false),
            lines(&["Rust, Go", "Kafka and gRPC"])
        );
    }

    #[test]
    fn test_drops_echoed_label_line() {
        let raw = "SKILLS:\nRust, Go\n\nKafka";
        assert_eq!(
            normalize_response(SectionKind::Skills, raw, false),
            lines(&["Rust, Go", "Kafka"])
        );
    }

    #[test]
    fn test_strips_inline_label_and_preamble() {
        assert_eq!(
            normalize_response(
                SectionKind::Summary,
                "Professional Summary: Engineer who ships.",
                false
            ),
            lines(&["Engineer who ships."])
        );
        assert_eq!(
            normalize_response(
                SectionKind::Summary,
                "Here is the rewritten summary:\nEngineer.",
                false
            ),
            lines(&["Engineer."])
        );
    }

    #[test]
    fn test_content_with_colon_is_kept() {
        assert_eq!(
            normalize_response(SectionKind::Skills, "Languages: Rust, Go", false),
            lines(&["Languages: Rust, Go"])
        );
    }

    #[test]
    fn test_bullets_removed_only_for_numbered_targets() {
        let raw = "• Rust, Go\n- Kafka\n3. Terraform";
        assert_eq!(
            normalize_response(SectionKind::Skills, raw, true),
            lines(&["Rust, Go", "Kafka", "Terraform"])
        );
        assert_eq!(
            normalize_response(SectionKind::Skills, "• Rust\n• Go", false),
            lines(&["• Rust", "• Go"])
        );
    }

    #[test]
    fn test_blank_reply_normalizes_to_nothing() {
        assert!(normalize_response(SectionKind::Summary, "```\n\n```", false).is_empty());
        assert!(normalize_response(SectionKind::Summary, "Summary:", false).is_empty());
    }

    #[test]
    fn test_judge_unchanged_ignores_whitespace() {
        assert_eq!(
            judge("Rust, Go\nKafka", &lines(&["Rust,  Go", "Kafka"]), 1.5),
            Outcome::Unchanged
        );
    }

    #[test]
    fn test_judge_growth_guard() {
        let original = "Backend engineer.";
        let long = lines(&["Backend engineer with a very long list of things nobody asked for."]);
        assert_eq!(judge(original, &long, 1.5), Outcome::RejectedTooLong);
        assert_eq!(judge(original, &long, 0.0), Outcome::Rewritten);
        assert_eq!(
            judge(original, &lines(&["Platform engineer."]), 1.5),
            Outcome::Rewritten
        );
    }
}
