//! Text-quality heuristics over a tier's raw OCR output.
//!
//! Five independent [0,1] signals combined into one weighted composite:
//! character consistency, word completeness, punctuation, sentence
//! structure, and numeric patterns. Each signal targets a failure mode
//! OCR engines actually produce (digit/letter confusion, shattered
//! words, repeated punctuation, run-on garbage, absurdly long numbers).

use std::sync::LazyLock;

use regex::Regex;

/// Composite weights, in signal order.
const WEIGHT_CHAR_CONSISTENCY: f32 = 0.3;
const WEIGHT_WORD_COMPLETENESS: f32 = 0.25;
const WEIGHT_PUNCTUATION: f32 = 0.15;
const WEIGHT_SENTENCE_STRUCTURE: f32 = 0.2;
const WEIGHT_NUMERIC_PATTERNS: f32 = 0.1;

/// Character sequences that OCR engines produce but humans rarely type.
static WEIRD_SEQUENCES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"[0-9][a-zA-Z][0-9]").expect("static regex"),
        Regex::new(r"[a-zA-Z][0-9][a-zA-Z]").expect("static regex"),
        Regex::new(r"[가-힣][0-9][가-힣]").expect("static regex"),
        Regex::new(r"[!@#$%^&*()]{2,}").expect("static regex"),
    ]
});

static GOOD_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?,:;]").expect("static regex"));

static BAD_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]{2,}|[,;:]{2,}").expect("static regex"));

static NUMBER_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

/// Single-character words that are legitimate on their own
/// (English articles/pronoun plus common Korean particles).
const VALID_SINGLE_CHAR_WORDS: &[&str] =
    &["I", "a", "가", "을", "를", "이", "은", "는", "와", "과"];

/// Words longer than this are treated as probable merge errors.
const MAX_WORD_CHARS: usize = 20;

/// Numbers longer than this many digits are treated as misreads.
const MAX_NUMBER_DIGITS: usize = 10;

/// Weighted composite quality of the text, in [0,1]. Empty text is 0.
pub fn text_quality(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }

    character_consistency(text) * WEIGHT_CHAR_CONSISTENCY
        + word_completeness(text) * WEIGHT_WORD_COMPLETENESS
        + punctuation_quality(text) * WEIGHT_PUNCTUATION
        + sentence_structure_quality(text) * WEIGHT_SENTENCE_STRUCTURE
        + numeric_pattern_quality(text) * WEIGHT_NUMERIC_PATTERNS
}

/// 1 minus the fraction of characters caught in weird sequences.
pub fn character_consistency(text: &str) -> f32 {
    let total_chars = text.chars().count();
    if total_chars == 0 {
        return 1.0;
    }

    let weird_chars: usize = WEIRD_SEQUENCES
        .iter()
        .flat_map(|pattern| pattern.find_iter(text))
        .map(|m| m.as_str().chars().count())
        .sum();

    (1.0 - weird_chars as f32 / total_chars as f32).max(0.0)
}

/// 1 minus the fraction of problematic words: stray single characters,
/// overlong words, and digit/letter mixtures.
pub fn word_completeness(text: &str) -> f32 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }

    let problematic = words.iter().filter(|word| is_problematic_word(word)).count();
    (1.0 - problematic as f32 / words.len() as f32).max(0.0)
}

fn is_problematic_word(word: &str) -> bool {
    let char_count = word.chars().count();
    if char_count == 1 {
        return !VALID_SINGLE_CHAR_WORDS.contains(&word);
    }
    if char_count > MAX_WORD_CHARS {
        return true;
    }
    char_count > 3
        && word.chars().any(|c| c.is_ascii_digit())
        && word.chars().any(char::is_alphabetic)
}

/// Ratio of well-formed punctuation to total, with repeats penalized
/// double. No punctuation at all is fine.
pub fn punctuation_quality(text: &str) -> f32 {
    let good = GOOD_PUNCTUATION.find_iter(text).count();
    let bad = BAD_PUNCTUATION.find_iter(text).count();
    if good + bad == 0 {
        return 1.0;
    }
    (good as f32 / (good + bad * 2) as f32).min(1.0)
}

/// 1 minus the fraction of sentences that are implausibly short or
/// long. Single-sentence text is not penalized.
pub fn sentence_structure_quality(text: &str) -> f32 {
    let sentences: Vec<&str> = text.split('.').collect();
    if sentences.len() <= 1 {
        return 1.0;
    }

    let problematic = sentences
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let chars = s.chars().count();
            chars < 5 || chars > 200
        })
        .count();

    (1.0 - problematic as f32 / sentences.len() as f32).max(0.0)
}

/// Fraction of digit runs with a plausible length. No numbers is fine.
pub fn numeric_pattern_quality(text: &str) -> f32 {
    let mut good = 0usize;
    let mut bad = 0usize;
    for run in NUMBER_RUNS.find_iter(text) {
        if run.as_str().len() <= MAX_NUMBER_DIGITS {
            good += 1;
        } else {
            bad += 1;
        }
    }
    if good + bad == 0 {
        return 1.0;
    }
    good as f32 / (good + bad) as f32
}
