//! Shared data model of the triage core, plus the OCR engine
//! abstraction the orchestrator drives.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TriageError;

/// OCR processing tier in the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingTier {
    Tier1,
    Tier2,
    Tier3,
    Failed,
}

impl ProcessingTier {
    /// Weight applied to the final confidence of a result produced at
    /// this tier.
    pub fn confidence_weight(self) -> f32 {
        match self {
            Self::Tier3 => 0.95,
            Self::Tier2 => 0.85,
            Self::Tier1 => 0.75,
            Self::Failed => 0.0,
        }
    }
}

/// Shape of the final extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    PlainText,
    StructuredText,
    MarkdownTable,
    EnhancedText,
    Error,
}

/// Normalized table container shared by both tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub column_count: usize,
}

impl TableData {
    /// Build a table with counts derived from the data.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        let column_count = headers.len();
        Self {
            headers,
            rows,
            row_count,
            column_count,
        }
    }
}

/// A typed value extracted by a tier (amount, date, account name, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub confidence: f32,
}

/// Output of one OCR tier, consumed as an opaque record by the core.
///
/// Collaborators do not guarantee `success == false` implies empty
/// text; empty or low-quality text is treated as low quality regardless
/// of the flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TierResult {
    pub success: bool,
    pub text: String,
    pub confidence: f32,
    pub tables: Vec<TableData>,
    pub entities: Vec<Entity>,
    /// Accuracy for the configured target language, when the tier
    /// measures it (typically only the Tier-2 engine does).
    pub target_language_accuracy: Option<f32>,
    pub error: Option<String>,
}

impl TierResult {
    /// Failed result carrying the engine's error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Caller-supplied hints about the document being processed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextHints {
    /// Explicit language tag; overrides filename-based detection.
    pub language: Option<String>,
    pub context_tags: Vec<String>,
    pub document_type: Option<String>,
}

// ──────────────────────────────────────────────
// Complexity analysis output
// ──────────────────────────────────────────────

/// Special handling a dimension's threshold breach calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialProcessing {
    TableStructureAnalysis,
    HighDensityTextProcessing,
    MultilingualProcessing,
    ComplexLayoutAnalysis,
}

/// Processing recommendations derived from the complexity scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub tier: ProcessingTier,
    pub special_processing: Vec<SpecialProcessing>,
    pub optimization_hints: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for Recommendations {
    fn default() -> Self {
        Self {
            tier: ProcessingTier::Tier2,
            special_processing: Vec::new(),
            optimization_hints: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Basic image statistics recorded alongside the scores.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub image_width: u32,
    pub image_height: u32,
    pub total_pixels: u64,
    pub mean_brightness: f32,
    pub brightness_std: f32,
    pub min_brightness: u8,
    pub max_brightness: u8,
    pub source: String,
}

/// Multi-dimensional complexity score for one image. Immutable after
/// creation; every dimension lies in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub table_complexity: f32,
    pub text_density: f32,
    pub language_complexity: f32,
    pub structure_complexity: f32,
    pub overall_complexity: f32,
    pub recommendations: Recommendations,
    pub metadata: AnalysisMetadata,
}

impl ComplexityMetrics {
    /// Neutral fallback used when the image cannot be analyzed. All
    /// dimensions sit at 0.5 so the decision engine neither rushes to
    /// Tier 3 nor rules it out.
    pub fn fallback(warning: impl Into<String>) -> Self {
        Self {
            table_complexity: 0.5,
            text_density: 0.5,
            language_complexity: 0.5,
            structure_complexity: 0.5,
            overall_complexity: 0.5,
            recommendations: Recommendations {
                tier: ProcessingTier::Tier2,
                special_processing: Vec::new(),
                optimization_hints: vec![
                    "manual analysis recommended after analysis failure".to_string()
                ],
                warnings: vec![warning.into()],
            },
            metadata: AnalysisMetadata::default(),
        }
    }
}

// ──────────────────────────────────────────────
// Upgrade decision output
// ──────────────────────────────────────────────

/// Why a single upgrade rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeReason {
    LowConfidence,
    LowLanguageAccuracy,
    HighTableComplexity,
    HighOverallComplexity,
    SpecialContentDetected,
    PoorTextQuality,
    MixedLanguageDetected,
    FinancialContent,
}

impl std::fmt::Display for UpgradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LowConfidence => "low_confidence",
            Self::LowLanguageAccuracy => "low_language_accuracy",
            Self::HighTableComplexity => "high_table_complexity",
            Self::HighOverallComplexity => "high_overall_complexity",
            Self::SpecialContentDetected => "special_content_detected",
            Self::PoorTextQuality => "poor_text_quality",
            Self::MixedLanguageDetected => "mixed_language_detected",
            Self::FinancialContent => "financial_content",
        };
        f.write_str(s)
    }
}

/// One triggered rule during decision evaluation. Lives only inside a
/// single `decide` call; the decision keeps the human-readable reasons
/// and the summed score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradeFactor {
    pub reason: UpgradeReason,
    pub score: f32,
    pub evidence: serde_json::Value,
}

/// One rule's value against its threshold, for the decision report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub value: f32,
    pub threshold: f32,
    pub passed: bool,
}

/// Advisory cost/benefit analysis attached to a decision. Metadata
/// only; the rule sum is the authoritative trigger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBenefit {
    pub current_quality: f32,
    pub expected_improvement: f32,
    pub expected_final_quality: f32,
    pub tier2_cost: f32,
    pub tier3_cost: f32,
    pub additional_cost: f32,
    pub quality_benefit: f32,
    pub roi: f32,
    pub cost_effective: bool,
    pub upgrade_recommended: bool,
}

/// Output of the upgrade-decision engine.
///
/// Invariants: `should_upgrade == (priority_score > priority
/// threshold)` and `target_tier == Tier3` iff `should_upgrade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDecision {
    pub should_upgrade: bool,
    pub target_tier: ProcessingTier,
    pub reasons: Vec<String>,
    /// The Tier-2 confidence the decision was based on.
    pub confidence_score: f32,
    pub priority_score: f32,
    pub cost_benefit: CostBenefit,
    /// Per-rule value/threshold comparison for the scalar rules.
    pub threshold_report: BTreeMap<String, ThresholdCheck>,
}

// ──────────────────────────────────────────────
// Final aggregated result
// ──────────────────────────────────────────────

/// Terminal output of the aggregator, the only artifact exposed to the
/// caller. Constructed once per aggregation; never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub success: bool,
    pub processing_tier: ProcessingTier,
    pub extracted_content: String,
    pub content_type: ContentType,
    pub table_data: Vec<TableData>,
    pub entities: Vec<Entity>,
    pub final_confidence: f32,
    pub complexity_metrics: Option<ComplexityMetrics>,
    pub upgrade_decision: Option<UpgradeDecision>,
    pub processing_metadata: serde_json::Map<String, serde_json::Value>,
    pub error: Option<String>,
}

impl FinalResult {
    /// Result for an aggregation that failed internally.
    pub fn aggregation_error(error: impl Into<String>) -> Self {
        let error = error.into();
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "aggregation_error".to_string(),
            serde_json::Value::String(error.clone()),
        );
        Self {
            success: false,
            processing_tier: ProcessingTier::Failed,
            extracted_content: String::new(),
            content_type: ContentType::Error,
            table_data: Vec::new(),
            entities: Vec::new(),
            final_confidence: 0.0,
            complexity_metrics: None,
            upgrade_decision: None,
            processing_metadata: metadata,
            error: Some(error),
        }
    }
}

// ──────────────────────────────────────────────
// Engine abstraction
// ──────────────────────────────────────────────

/// OCR engine abstraction. Tier implementations are interchangeable
/// behind this trait; the orchestrator owns the boxed instances
/// (allows mocking for tests).
pub trait OcrEngine: Send + Sync {
    /// Run OCR on the image at `path`. Errors are converted to failed
    /// tier results by the orchestrator, never propagated.
    fn process_image(&self, path: &Path, hints: &ContextHints) -> Result<TierResult, TriageError>;

    /// Whether the engine can handle the given language tag.
    fn supports_language(&self, language: &str) -> bool;

    /// Which rung of the escalation ladder this engine occupies.
    fn processing_tier(&self) -> ProcessingTier;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_confidence_weights() {
        assert_eq!(ProcessingTier::Tier3.confidence_weight(), 0.95);
        assert_eq!(ProcessingTier::Tier2.confidence_weight(), 0.85);
        assert_eq!(ProcessingTier::Failed.confidence_weight(), 0.0);
    }

    #[test]
    fn table_counts_derived_from_data() {
        let table = TableData::new(
            vec!["A".into(), "B".into()],
            vec![vec!["1".into(), "2".into()], vec!["3".into(), "4".into()]],
        );
        assert_eq!(table.row_count, 2);
        assert_eq!(table.column_count, 2);
    }

    #[test]
    fn fallback_metrics_are_neutral() {
        let metrics = ComplexityMetrics::fallback("boom");
        assert_eq!(metrics.overall_complexity, 0.5);
        assert_eq!(metrics.recommendations.tier, ProcessingTier::Tier2);
        assert_eq!(metrics.recommendations.warnings, vec!["boom".to_string()]);
    }

    #[test]
    fn entity_serializes_kind_as_type() {
        let entity = Entity {
            kind: "amount".into(),
            value: "1,234".into(),
            confidence: 0.9,
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "amount");
    }
}
