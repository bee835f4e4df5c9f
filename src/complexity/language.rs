//! Language-difficulty resolution from context hints or the filename.
//!
//! An explicit hint wins and carries a fixed detection confidence;
//! otherwise the lowercased filename is scanned for per-language
//! keywords and the highest-confidence match is used. Unknown inputs
//! fall back to the plain-Latin baseline.

use std::path::Path;

use crate::config::LanguageProfile;
use crate::types::ContextHints;

/// Confidence assigned to an explicit hint.
const HINT_CONFIDENCE: f32 = 0.9;

/// Baseline difficulty when no language can be resolved.
const DEFAULT_DIFFICULTY: f32 = 0.4;

/// Resolve the language-complexity score for one image.
pub fn language_complexity(
    path: &Path,
    hints: Option<&ContextHints>,
    profiles: &[LanguageProfile],
) -> f32 {
    if let Some(language) = hints.and_then(|h| h.language.as_deref()) {
        let tag = language.to_lowercase();
        if let Some(profile) = profiles.iter().find(|p| p.name == tag) {
            return (profile.difficulty * HINT_CONFIDENCE).min(1.0);
        }
        return DEFAULT_DIFFICULTY;
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut best: Option<&LanguageProfile> = None;
    for profile in profiles {
        if profile.keywords.iter().any(|k| filename.contains(k)) {
            let better =
                best.map_or(true, |b| profile.detection_confidence > b.detection_confidence);
            if better {
                best = Some(profile);
            }
        }
    }

    match best {
        Some(profile) => (profile.difficulty * profile.detection_confidence).min(1.0),
        None => DEFAULT_DIFFICULTY,
    }
}
