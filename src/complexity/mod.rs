//! Image complexity scoring: how hard is this image to OCR correctly?
//!
//! Produces a [`ComplexityMetrics`] value per image along four axes
//! (table structure, text density, language difficulty, layout
//! structure) plus a weighted overall score and a processing
//! recommendation. Scoring failures never block the pipeline: a
//! missing or corrupt image yields neutral fallback metrics with the
//! cause recorded as a warning.

pub mod image_ops;
pub mod language;

use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::config::AnalyzerConfig;
use crate::error::TriageError;
use crate::types::{
    AnalysisMetadata, ComplexityMetrics, ContextHints, ProcessingTier, Recommendations,
    SpecialProcessing,
};

/// Weights of the four dimensions in the overall score.
const WEIGHT_TABLE: f32 = 0.3;
const WEIGHT_TEXT: f32 = 0.25;
const WEIGHT_LANGUAGE: f32 = 0.25;
const WEIGHT_STRUCTURE: f32 = 0.2;

/// Overall score above which a manual-review warning is attached.
const VERY_HIGH_OVERALL: f32 = 0.9;

/// Table and density scores that together flag a high-error-risk page.
const DENSE_TABLE_WARNING_LEVEL: f32 = 0.8;

pub struct ComplexityAnalyzer {
    config: AnalyzerConfig,
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl ComplexityAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Analyze one image. Infallible: load failures return neutral
    /// fallback metrics with the failure message as a warning.
    pub fn analyze(&self, image_path: &Path, hints: Option<&ContextHints>) -> ComplexityMetrics {
        match self.try_analyze(image_path, hints) {
            Ok(metrics) => metrics,
            Err(err) => {
                tracing::warn!(
                    path = %image_path.display(),
                    error = %err,
                    "complexity analysis failed, using fallback metrics"
                );
                ComplexityMetrics::fallback(err.to_string())
            }
        }
    }

    fn try_analyze(
        &self,
        image_path: &Path,
        hints: Option<&ContextHints>,
    ) -> Result<ComplexityMetrics, TriageError> {
        let gray = image_ops::load_grayscale(image_path)?;

        let table_complexity = image_ops::table_complexity(&gray);
        let text_density = image_ops::text_density(&gray);
        let language_complexity =
            language::language_complexity(image_path, hints, &self.config.languages);
        let structure_complexity = image_ops::structure_complexity(&gray);

        let overall_complexity = overall(
            table_complexity,
            text_density,
            language_complexity,
            structure_complexity,
        );

        let recommendations = self.recommend(
            table_complexity,
            text_density,
            language_complexity,
            structure_complexity,
            overall_complexity,
        );

        tracing::debug!(
            path = %image_path.display(),
            table = table_complexity,
            text = text_density,
            language = language_complexity,
            structure = structure_complexity,
            overall = overall_complexity,
            "image complexity scored"
        );

        Ok(ComplexityMetrics {
            table_complexity,
            text_density,
            language_complexity,
            structure_complexity,
            overall_complexity,
            recommendations,
            metadata: metadata_for(&gray, image_path),
        })
    }

    /// Analyze a batch of images. Per-image failures degrade to
    /// fallback metrics like single analysis.
    pub fn analyze_batch(
        &self,
        image_paths: &[PathBuf],
        hints: Option<&ContextHints>,
    ) -> Vec<(PathBuf, ComplexityMetrics)> {
        image_paths
            .iter()
            .map(|path| (path.clone(), self.analyze(path, hints)))
            .collect()
    }

    /// Deterministic rule table mapping threshold breaches to special
    /// processing tags, hints, and warnings.
    fn recommend(
        &self,
        table: f32,
        text: f32,
        language: f32,
        structure: f32,
        overall: f32,
    ) -> Recommendations {
        let thresholds = &self.config.thresholds;
        let mut rec = Recommendations::default();

        if overall > thresholds.overall {
            rec.tier = ProcessingTier::Tier3;
        }

        if table > thresholds.table_complexity {
            rec.special_processing
                .push(SpecialProcessing::TableStructureAnalysis);
            rec.optimization_hints
                .push("use specialized table OCR models".to_string());
        }
        if text > thresholds.text_density {
            rec.special_processing
                .push(SpecialProcessing::HighDensityTextProcessing);
            rec.optimization_hints
                .push("apply text region segmentation".to_string());
        }
        if language > thresholds.language_complexity {
            rec.special_processing
                .push(SpecialProcessing::MultilingualProcessing);
            rec.optimization_hints
                .push("use language-specific OCR models".to_string());
        }
        if structure > thresholds.structure_complexity {
            rec.special_processing
                .push(SpecialProcessing::ComplexLayoutAnalysis);
            rec.optimization_hints
                .push("apply advanced layout detection".to_string());
        }

        if overall > VERY_HIGH_OVERALL {
            rec.warnings
                .push("very high complexity, consider manual review".to_string());
        }
        if table > DENSE_TABLE_WARNING_LEVEL && text > DENSE_TABLE_WARNING_LEVEL {
            rec.warnings
                .push("complex table with dense text, high error risk".to_string());
        }

        rec
    }
}

/// Fixed weighted sum of the four dimensions, clamped to [0,1].
pub fn overall(table: f32, text: f32, language: f32, structure: f32) -> f32 {
    (table * WEIGHT_TABLE
        + text * WEIGHT_TEXT
        + language * WEIGHT_LANGUAGE
        + structure * WEIGHT_STRUCTURE)
        .min(1.0)
}

fn metadata_for(gray: &GrayImage, path: &Path) -> AnalysisMetadata {
    let (mean, std, min, max) = image_ops::brightness_stats(gray);
    AnalysisMetadata {
        image_width: gray.width(),
        image_height: gray.height(),
        total_pixels: gray.width() as u64 * gray.height() as u64,
        mean_brightness: mean,
        brightness_std: std,
        min_brightness: min,
        max_brightness: max,
        source: path.display().to_string(),
    }
}

/// Distribution statistics over a batch of complexity results.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityDistribution {
    pub total_images: usize,
    pub mean_complexity: f32,
    pub std_complexity: f32,
    pub min_complexity: f32,
    pub max_complexity: f32,
    /// overall < 0.3
    pub low_complexity: usize,
    /// 0.3 ≤ overall < 0.7
    pub medium_complexity: usize,
    /// overall ≥ 0.7
    pub high_complexity: usize,
    pub tier3_recommended: usize,
}

/// Summarize a batch of results. Returns `None` for an empty batch.
pub fn distribution_stats(results: &[ComplexityMetrics]) -> Option<ComplexityDistribution> {
    if results.is_empty() {
        return None;
    }

    let overalls: Vec<f32> = results.iter().map(|r| r.overall_complexity).collect();
    let total = overalls.len();
    let mean = overalls.iter().sum::<f32>() / total as f32;
    let variance = overalls.iter().map(|c| (c - mean) * (c - mean)).sum::<f32>() / total as f32;

    Some(ComplexityDistribution {
        total_images: total,
        mean_complexity: mean,
        std_complexity: variance.sqrt(),
        min_complexity: overalls.iter().copied().fold(f32::INFINITY, f32::min),
        max_complexity: overalls.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        low_complexity: overalls.iter().filter(|&&c| c < 0.3).count(),
        medium_complexity: overalls.iter().filter(|&&c| (0.3..0.7).contains(&c)).count(),
        high_complexity: overalls.iter().filter(|&&c| c >= 0.7).count(),
        tier3_recommended: results
            .iter()
            .filter(|r| r.recommendations.tier == ProcessingTier::Tier3)
            .count(),
    })
}
