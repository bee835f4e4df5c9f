//! Cross-tier entity merging: dedupe by (value, type), normalize, and
//! order by confidence.

use std::cmp::Ordering;

use crate::types::Entity;

/// Merge the selected tier's entities with non-duplicate entities from
/// the other tier, clean them, and sort by descending confidence. The
/// sort is stable, so equal confidences keep their merge order.
pub fn merge_entities(selected: &[Entity], other: &[Entity]) -> Vec<Entity> {
    let mut merged: Vec<Entity> = selected.to_vec();
    for entity in other {
        if !is_duplicate(entity, &merged) {
            merged.push(entity.clone());
        }
    }

    let mut cleaned: Vec<Entity> = merged.iter().filter_map(clean_entity).collect();
    cleaned.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    cleaned
}

/// Duplicate means same trimmed lowercase value and same type.
fn is_duplicate(entity: &Entity, existing: &[Entity]) -> bool {
    let value = entity.value.trim().to_lowercase();
    existing
        .iter()
        .any(|e| e.kind == entity.kind && e.value.trim().to_lowercase() == value)
}

/// Trim the value and clamp confidence to [0,1]. Entities with empty
/// values are dropped.
fn clean_entity(entity: &Entity) -> Option<Entity> {
    let value = entity.value.trim();
    if value.is_empty() {
        return None;
    }
    Some(Entity {
        kind: entity.kind.clone(),
        value: value.to_string(),
        confidence: entity.confidence.clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: &str, value: &str, confidence: f32) -> Entity {
        Entity {
            kind: kind.to_string(),
            value: value.to_string(),
            confidence,
        }
    }

    #[test]
    fn duplicates_are_case_insensitive_per_type() {
        let merged = merge_entities(
            &[entity("amount", "1,200", 0.9)],
            &[
                entity("amount", " 1,200 ", 0.7),
                entity("date", "1,200", 0.6),
            ],
        );
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|e| e.kind == "date"));
    }

    #[test]
    fn sorted_by_descending_confidence() {
        let merged = merge_entities(
            &[entity("a", "low", 0.3), entity("b", "high", 0.9)],
            &[entity("c", "mid", 0.6)],
        );
        let confidences: Vec<f32> = merged.iter().map(|e| e.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.6, 0.3]);
    }

    #[test]
    fn empty_values_dropped_and_confidence_clamped() {
        let merged = merge_entities(
            &[entity("a", "   ", 0.9), entity("b", "kept", 1.7)],
            &[],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "kept");
        assert_eq!(merged[0].confidence, 1.0);
    }
}
