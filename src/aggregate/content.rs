//! Text cleanup, cross-tier supplementation, and content-type
//! classification.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ContentType, Entity, TableData};

/// Marker line prepended to text recovered from the non-selected tier.
pub const SUPPLEMENT_MARKER: &str = "[supplementary]";

/// Other tier's text must be at least this much longer before it is
/// mined for supplementary lines.
pub const SUPPLEMENT_LENGTH_RATIO: f32 = 1.2;

/// Supplementary lines shorter than this (trimmed) are noise.
const MIN_SUPPLEMENT_CHARS: usize = 10;

/// At most this many supplementary lines are appended.
const MAX_SUPPLEMENT_LINES: usize = 3;

/// Fraction of lines that must look structured to classify the text
/// as structured.
const STRUCTURED_LINE_RATIO: f32 = 0.3;

static TRIPLE_BLANK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").expect("static regex"));
static INLINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static regex"));
static LEADING_INDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]+").expect("static regex"));
static STRAY_SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s,.!?:;()\-]").expect("static regex"));

static STRUCTURED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^\d+\.\s+").expect("static regex"),
        Regex::new(r"^[-*]\s+").expect("static regex"),
        Regex::new(r"^#{1,6}\s+").expect("static regex"),
        Regex::new(r"^\|.*\|").expect("static regex"),
    ]
});

/// Normalize OCR text: collapse blank runs and inline whitespace,
/// strip leading indentation and stray symbols.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let cleaned = text.trim();
    let cleaned = TRIPLE_BLANK.replace_all(cleaned, "\n\n");
    let cleaned = INLINE_RUNS.replace_all(&cleaned, " ");
    let cleaned = LEADING_INDENT.replace_all(&cleaned, "\n");
    STRAY_SYMBOLS.replace_all(&cleaned, "").into_owned()
}

/// Lines present in the other tier's text but not the selected one,
/// taken in the other tier's order so output is stable. Short lines
/// and bracketed markers are skipped.
pub fn supplementary_lines(main_text: &str, other_text: &str) -> Vec<String> {
    let main_lines: std::collections::BTreeSet<&str> = main_text.split('\n').collect();

    let mut additions = Vec::new();
    for line in other_text.split('\n') {
        if additions.len() == MAX_SUPPLEMENT_LINES {
            break;
        }
        let trimmed = line.trim();
        if trimmed.chars().count() <= MIN_SUPPLEMENT_CHARS || trimmed.starts_with('[') {
            continue;
        }
        if main_lines.contains(line) || additions.iter().any(|a| a == line) {
            continue;
        }
        additions.push(line.to_string());
    }
    additions
}

/// Append supplementary lines under the marker.
pub fn append_supplement(text: &mut String, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    text.push_str("\n\n");
    text.push_str(SUPPLEMENT_MARKER);
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
}

/// First matching rule wins: tables, entities, structured text, then
/// plain text.
pub fn determine_content_type(
    text: &str,
    tables: &[TableData],
    entities: &[Entity],
) -> ContentType {
    if !tables.is_empty() {
        return ContentType::MarkdownTable;
    }
    if !entities.is_empty() {
        return ContentType::EnhancedText;
    }
    if has_structured_content(text) {
        return ContentType::StructuredText;
    }
    ContentType::PlainText
}

/// True when more than 30% of lines look like list items, headers, or
/// table rows.
pub fn has_structured_content(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let structured = lines
        .iter()
        .filter(|line| {
            let trimmed = line.trim();
            STRUCTURED_PATTERNS.iter().any(|p| p.is_match(trimmed))
        })
        .count();

    structured as f32 / lines.len() as f32 > STRUCTURED_LINE_RATIO
}
