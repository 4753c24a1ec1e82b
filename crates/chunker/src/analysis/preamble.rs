//! Preamble extraction: the text that precedes the first header.

use serde::{Deserialize, Serialize};

/// Sub-classification of a preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreambleType {
    Introduction,
    Summary,
    Metadata,
    General,
}

/// Text before the first header of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preamble {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub preamble_type: PreambleType,
}

const SUMMARY_MAX_CHARS: usize = 200;

const INTRO_PHRASES: &[&str] = &[
    "this ",
    "welcome",
    "in this",
    "introduction",
    "overview",
    "the following",
];

/// Extract the preamble from normalized lines.
///
/// `first_header` is the 0-based index of the first header line. Returns
/// `None` when the document has no header or nothing but whitespace before it.
pub(crate) fn extract_preamble(lines: &[&str], first_header: Option<usize>) -> Option<Preamble> {
    let first_header = first_header?;
    let start = lines[..first_header]
        .iter()
        .position(|l| !l.trim().is_empty())?;
    let end = lines[..first_header]
        .iter()
        .rposition(|l| !l.trim().is_empty())?;

    let content = lines[start..=end].join("\n");
    let preamble_type = classify_preamble(&content);

    Some(Preamble {
        content,
        start_line: start + 1,
        end_line: end + 1,
        preamble_type,
    })
}

/// Classify preamble text by link density, key/value density and length.
pub fn classify_preamble(content: &str) -> PreambleType {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.chars().all(|c| c == '-'))
        .collect();

    if lines.is_empty() {
        return PreambleType::General;
    }

    let link_lines = lines.iter().filter(|l| is_link_line(l)).count();
    let kv_lines = lines.iter().filter(|l| is_key_value_line(l)).count();

    if link_lines * 10 >= lines.len() * 3 || kv_lines * 2 >= lines.len() {
        return PreambleType::Metadata;
    }

    if content.chars().count() < SUMMARY_MAX_CHARS {
        return PreambleType::Summary;
    }

    let lower = content.trim_start().to_lowercase();
    let paragraphs = content.split("\n\n").filter(|p| !p.trim().is_empty()).count();
    if paragraphs >= 2 || INTRO_PHRASES.iter().any(|p| lower.starts_with(p)) {
        return PreambleType::Introduction;
    }

    PreambleType::General
}

fn is_link_line(line: &str) -> bool {
    line.contains("](") || line.contains("http://") || line.contains("https://")
}

/// `key: value` lines as found in front matter and document headers.
fn is_key_value_line(line: &str) -> bool {
    let Some((key, value)) = line.split_once(':') else {
        return false;
    };
    !key.is_empty()
        && key.len() <= 32
        && !value.trim().is_empty()
        && value.starts_with(' ')
        && key.chars().next().is_some_and(|c| c.is_alphabetic())
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ')
}
