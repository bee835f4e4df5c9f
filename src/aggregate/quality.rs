//! Structural quality scoring of a single tier result.
//!
//! Used both to pick between tiers and as one term of the final
//! confidence. Looks only at the result's shape (text completeness,
//! table structure, entity coverage, reported confidence), never at
//! the image.

use crate::types::{Entity, TableData, TierResult};

const TEXT_WEIGHT: f32 = 0.3;
const TABLE_WEIGHT: f32 = 0.25;
const ENTITY_WEIGHT: f32 = 0.2;
const CONFIDENCE_WEIGHT: f32 = 0.25;

/// Text shorter than this is penalized proportionally.
const MIN_TEXT_CHARS: usize = 10;

/// Empty-line ratio at which the empty-line score bottoms out.
const MAX_EMPTY_LINE_RATIO: f32 = 0.1;

/// Distinct characters needed for full diversity credit.
const CHAR_DIVERSITY_TARGET: usize = 50;

const MIN_TABLE_ROWS: usize = 2;
const MIN_TABLE_COLUMNS: usize = 2;

const MIN_ENTITIES: usize = 1;
const ENTITY_CONFIDENCE_FLOOR: f32 = 0.7;
const ENTITY_TYPE_TARGET: usize = 3;

/// Weighted structural quality of one tier result, in [0,1].
pub fn result_quality(result: &TierResult) -> f32 {
    text_completeness(&result.text) * TEXT_WEIGHT
        + table_quality(&result.tables) * TABLE_WEIGHT
        + entity_quality(&result.entities) * ENTITY_WEIGHT
        + result.confidence.clamp(0.0, 1.0) * CONFIDENCE_WEIGHT
}

/// Mean of length, empty-line, and character-diversity scores.
pub fn text_completeness(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }

    let length_score = (text.chars().count() as f32 / MIN_TEXT_CHARS as f32).min(1.0);

    let lines: Vec<&str> = text.split('\n').collect();
    let empty_lines = lines.iter().filter(|l| l.trim().is_empty()).count();
    let empty_ratio = empty_lines as f32 / lines.len() as f32;
    let empty_score = (1.0 - empty_ratio / MAX_EMPTY_LINE_RATIO).max(0.0);

    let unique_chars: std::collections::BTreeSet<char> =
        text.to_lowercase().chars().collect();
    let diversity_score = (unique_chars.len() as f32 / CHAR_DIVERSITY_TARGET as f32).min(1.0);

    (length_score + empty_score + diversity_score) / 3.0
}

/// Mean per-table score over row count, column count, and row/header
/// width consistency. No tables scores zero.
pub fn table_quality(tables: &[TableData]) -> f32 {
    if tables.is_empty() {
        return 0.0;
    }

    let total: f32 = tables
        .iter()
        .map(|table| {
            let row_score = (table.rows.len() as f32 / MIN_TABLE_ROWS as f32).min(1.0);
            let col_score = (table.headers.len() as f32 / MIN_TABLE_COLUMNS as f32).min(1.0);
            let consistency = if table.rows.is_empty() || table.headers.is_empty() {
                0.0
            } else {
                let consistent = table
                    .rows
                    .iter()
                    .filter(|row| row.len() == table.headers.len())
                    .count();
                consistent as f32 / table.rows.len() as f32
            };
            (row_score + col_score + consistency) / 3.0
        })
        .sum();

    total / tables.len() as f32
}

/// Mean of count, high-confidence fraction, and type-diversity scores.
pub fn entity_quality(entities: &[Entity]) -> f32 {
    if entities.is_empty() {
        return 0.0;
    }

    let count_score = (entities.len() as f32 / MIN_ENTITIES as f32).min(1.0);

    let confident = entities
        .iter()
        .filter(|e| e.confidence >= ENTITY_CONFIDENCE_FLOOR)
        .count();
    let confidence_score = confident as f32 / entities.len() as f32;

    let kinds: std::collections::BTreeSet<&str> =
        entities.iter().map(|e| e.kind.as_str()).collect();
    let diversity_score = (kinds.len() as f32 / ENTITY_TYPE_TARGET as f32).min(1.0);

    (count_score + confidence_score + diversity_score) / 3.0
}
