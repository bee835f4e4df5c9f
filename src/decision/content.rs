//! Content-based upgrade signals: special-case categories, mixed-script
//! text, and financial material.

use crate::config::SpecialCaseKeywords;
use crate::types::{ContextHints, TierResult};

/// Minimum script characters before mixed-language detection applies.
const MIN_SCRIPT_CHARS: usize = 10;

/// A script must cover this fraction of script characters to count.
const SIGNIFICANT_SCRIPT_RATIO: f32 = 0.2;

/// Financial keyword hits (text + context tags) needed to flag.
const FINANCIAL_HIT_THRESHOLD: usize = 2;

/// Detect special-content categories from the tier text, the caller's
/// context tags, and the presence of extracted tables. Category order
/// follows the configured list, so output is deterministic.
pub fn detect_special_cases(
    tier_result: &TierResult,
    hints: Option<&ContextHints>,
    categories: &[SpecialCaseKeywords],
) -> Vec<String> {
    let text = tier_result.text.to_lowercase();
    let mut detected = Vec::new();

    for category in categories {
        if category.keywords.iter().any(|k| text.contains(k.as_str())) {
            detected.push(category.name.clone());
        }
    }

    if let Some(hints) = hints {
        for tag in &hints.context_tags {
            let tag = tag.to_lowercase();
            for category in categories {
                if category.keywords.iter().any(|k| tag.contains(k.as_str()))
                    && !detected.contains(&category.name)
                {
                    detected.push(category.name.clone());
                }
            }
        }
    }

    if !tier_result.tables.is_empty() && !detected.iter().any(|c| c == "table_structure") {
        detected.push("table_structure".to_string());
    }

    detected
}

/// Script buckets used for mixed-language detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Hangul,
    Latin,
    Han,
    Kana,
}

fn script_of(c: char) -> Option<Script> {
    match c {
        '\u{AC00}'..='\u{D7AF}' => Some(Script::Hangul),
        '\u{4E00}'..='\u{9FFF}' => Some(Script::Han),
        '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' => Some(Script::Kana),
        _ if c.is_ascii_alphabetic() => Some(Script::Latin),
        _ => None,
    }
}

/// True when at least two scripts each cover more than 20% of the
/// text's script characters. Short texts never qualify.
pub fn has_mixed_language_content(text: &str) -> bool {
    let mut counts = [0usize; 4];
    for c in text.chars() {
        match script_of(c) {
            Some(Script::Hangul) => counts[0] += 1,
            Some(Script::Latin) => counts[1] += 1,
            Some(Script::Han) => counts[2] += 1,
            Some(Script::Kana) => counts[3] += 1,
            None => {}
        }
    }

    let total: usize = counts.iter().sum();
    if total < MIN_SCRIPT_CHARS {
        return false;
    }

    let significant = counts
        .iter()
        .filter(|&&count| count as f32 / total as f32 > SIGNIFICANT_SCRIPT_RATIO)
        .count();
    significant >= 2
}

/// True when financial keywords accumulate at least two hits across
/// the text and the caller's context tags.
pub fn has_financial_content(
    text: &str,
    hints: Option<&ContextHints>,
    keywords: &[String],
) -> bool {
    let text = text.to_lowercase();
    let mut hits = keywords
        .iter()
        .filter(|k| text.contains(k.as_str()))
        .count();

    if let Some(hints) = hints {
        for tag in &hints.context_tags {
            let tag = tag.to_lowercase();
            hits += keywords.iter().filter(|k| tag.contains(k.as_str())).count();
        }
    }

    hits >= FINANCIAL_HIT_THRESHOLD
}
