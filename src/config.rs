//! Configuration surface for the triage core.
//!
//! Everything here is plain data passed at construction: complexity
//! thresholds per dimension, upgrade-decision thresholds and reason
//! weights, cost-model constants, aggregation weights, and cache
//! settings. Defaults reproduce the tuned production values; archetype
//! presets swap threshold sets without changing behavior.

use std::time::Duration;

use crate::types::UpgradeReason;

// ──────────────────────────────────────────────
// Complexity analysis
// ──────────────────────────────────────────────

/// Per-dimension thresholds that drive recommendation generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityThresholds {
    pub table_complexity: f32,
    pub text_density: f32,
    pub language_complexity: f32,
    pub structure_complexity: f32,
    /// Above this, the analyzer recommends Tier 3 outright.
    pub overall: f32,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            table_complexity: 0.7,
            text_density: 0.8,
            language_complexity: 0.6,
            structure_complexity: 0.75,
            overall: 0.65,
        }
    }
}

/// Document archetypes with pre-tuned threshold sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentArchetype {
    FinancialDocument,
    TechnicalDrawing,
    MixedContent,
    General,
}

impl DocumentArchetype {
    /// Threshold preset for this archetype. Pure data, no behavior
    /// change beyond which numbers get compared.
    pub fn thresholds(self) -> ComplexityThresholds {
        match self {
            Self::FinancialDocument => ComplexityThresholds {
                table_complexity: 0.6,
                text_density: 0.7,
                language_complexity: 0.5,
                structure_complexity: 0.7,
                overall: 0.6,
            },
            Self::TechnicalDrawing => ComplexityThresholds {
                table_complexity: 0.8,
                text_density: 0.9,
                language_complexity: 0.4,
                structure_complexity: 0.8,
                overall: 0.7,
            },
            Self::MixedContent => ComplexityThresholds {
                table_complexity: 0.7,
                text_density: 0.8,
                language_complexity: 0.6,
                structure_complexity: 0.75,
                overall: 0.65,
            },
            Self::General => ComplexityThresholds::default(),
        }
    }
}

/// One language the analyzer can recognize from hints or filenames,
/// with its fixed OCR difficulty and detection confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageProfile {
    /// Canonical name matched against explicit context hints.
    pub name: String,
    /// Filename fragments that imply this language.
    pub keywords: Vec<String>,
    /// How hard this language is to OCR, in [0,1].
    pub difficulty: f32,
    /// Confidence attached to a keyword-based detection.
    pub detection_confidence: f32,
}

impl LanguageProfile {
    fn new(name: &str, keywords: &[&str], difficulty: f32, detection_confidence: f32) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            difficulty,
            detection_confidence,
        }
    }
}

/// Default language table. Scripts with large glyph inventories or
/// cursive joining score high; plain Latin scores low.
pub fn default_language_profiles() -> Vec<LanguageProfile> {
    vec![
        LanguageProfile::new(
            "korean",
            &["korean", "hangul", "kr", "한글", "한국", "kor"],
            0.8,
            0.9,
        ),
        LanguageProfile::new("chinese", &["chinese", "china", "중국", "cn", "zh"], 0.85, 0.9),
        LanguageProfile::new("japanese", &["japanese", "japan", "일본", "jp", "ja"], 0.8, 0.9),
        LanguageProfile::new("arabic", &["arabic", "arab", "아랍", "ar"], 0.9, 0.8),
        LanguageProfile::new(
            "mixed",
            &["excel", "table", "chart", "multi", "mixed"],
            0.6,
            0.7,
        ),
        LanguageProfile::new("english", &["english", "en", "eng"], 0.4, 0.8),
    ]
}

/// Full analyzer configuration.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub thresholds: ComplexityThresholds,
    pub languages: Vec<LanguageProfile>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            thresholds: ComplexityThresholds::default(),
            languages: default_language_profiles(),
        }
    }
}

impl AnalyzerConfig {
    /// Configuration with an archetype threshold preset and the default
    /// language table.
    pub fn for_archetype(archetype: DocumentArchetype) -> Self {
        Self {
            thresholds: archetype.thresholds(),
            ..Self::default()
        }
    }
}

// ──────────────────────────────────────────────
// Upgrade decision
// ──────────────────────────────────────────────

/// Thresholds for the eight upgrade rules plus the decision cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionThresholds {
    pub confidence: f32,
    pub target_language_accuracy: f32,
    pub table_complexity: f32,
    pub overall_complexity: f32,
    pub text_quality: f32,
    /// Summed factor scores above this trigger the upgrade. An
    /// empirical constant, not a semantically meaningful value.
    pub priority: f32,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            confidence: 0.85,
            target_language_accuracy: 0.9,
            table_complexity: 0.7,
            overall_complexity: 0.6,
            text_quality: 0.8,
            priority: 0.5,
        }
    }
}

/// Fixed weight applied to each triggered rule's threshold gap.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonWeights {
    pub low_confidence: f32,
    pub low_language_accuracy: f32,
    pub high_table_complexity: f32,
    pub high_overall_complexity: f32,
    pub special_content: f32,
    pub poor_text_quality: f32,
    pub mixed_language: f32,
    pub financial_content: f32,
}

impl Default for ReasonWeights {
    fn default() -> Self {
        Self {
            low_confidence: 0.9,
            low_language_accuracy: 0.8,
            high_table_complexity: 0.7,
            high_overall_complexity: 0.6,
            special_content: 0.75,
            poor_text_quality: 0.85,
            mixed_language: 0.7,
            financial_content: 0.65,
        }
    }
}

impl ReasonWeights {
    pub fn for_reason(&self, reason: UpgradeReason) -> f32 {
        match reason {
            UpgradeReason::LowConfidence => self.low_confidence,
            UpgradeReason::LowLanguageAccuracy => self.low_language_accuracy,
            UpgradeReason::HighTableComplexity => self.high_table_complexity,
            UpgradeReason::HighOverallComplexity => self.high_overall_complexity,
            UpgradeReason::SpecialContentDetected => self.special_content,
            UpgradeReason::PoorTextQuality => self.poor_text_quality,
            UpgradeReason::MixedLanguageDetected => self.mixed_language,
            UpgradeReason::FinancialContent => self.financial_content,
        }
    }
}

/// Cost-model constants for the advisory cost/benefit analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct CostModel {
    pub tier2_cost: f32,
    pub tier3_cost: f32,
    /// How much one unit of accuracy improvement is worth in cost units.
    pub accuracy_improvement_value: f32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            tier2_cost: 1.0,
            tier3_cost: 5.0,
            accuracy_improvement_value: 10.0,
        }
    }
}

/// A named special-content category and the keywords that imply it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialCaseKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

impl SpecialCaseKeywords {
    fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Default special-content categories. Keyword lists carry both English
/// and Korean terms from the production deployment.
pub fn default_special_cases() -> Vec<SpecialCaseKeywords> {
    vec![
        SpecialCaseKeywords::new(
            "charts",
            &["chart", "graph", "차트", "그래프", "도표", "pie", "bar", "line"],
        ),
        SpecialCaseKeywords::new(
            "forms",
            &["form", "application", "신청서", "양식", "서식", "questionnaire"],
        ),
        SpecialCaseKeywords::new(
            "complex_layouts",
            &["invoice", "receipt", "영수증", "송장", "계산서", "statement"],
        ),
        SpecialCaseKeywords::new(
            "financial",
            &["balance", "income", "revenue", "재무", "손익", "대차", "financial"],
        ),
        SpecialCaseKeywords::new(
            "technical",
            &["diagram", "blueprint", "도면", "schematic", "technical"],
        ),
        SpecialCaseKeywords::new(
            "handwritten",
            &["handwritten", "manuscript", "손글씨", "필기"],
        ),
        SpecialCaseKeywords::new(
            "multilingual",
            &["multilingual", "mixed", "다국어", "bilingual"],
        ),
    ]
}

/// Default financial keyword list for the financial-content rule.
pub fn default_financial_keywords() -> Vec<String> {
    [
        "balance", "income", "revenue", "profit", "loss", "asset", "liability", "재무", "손익",
        "대차", "자산", "부채", "매출", "이익", "손실", "financial", "statement", "제표",
        "계산서",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

/// Full decision-engine configuration.
#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub thresholds: DecisionThresholds,
    pub weights: ReasonWeights,
    pub cost: CostModel,
    pub special_cases: Vec<SpecialCaseKeywords>,
    pub financial_keywords: Vec<String>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            thresholds: DecisionThresholds::default(),
            weights: ReasonWeights::default(),
            cost: CostModel::default(),
            special_cases: default_special_cases(),
            financial_keywords: default_financial_keywords(),
        }
    }
}

// ──────────────────────────────────────────────
// Aggregation
// ──────────────────────────────────────────────

/// Result-aggregation options. The consistency weight is the remainder
/// `1 - confidence_weight - quality_weight`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationOptions {
    /// Tentatively select the Tier-3 result when it succeeded.
    pub prefer_higher_tier: bool,
    pub confidence_weight: f32,
    pub quality_weight: f32,
    /// Run the non-blocking post-hoc validation pass.
    pub enable_validation: bool,
    pub enable_caching: bool,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            prefer_higher_tier: true,
            confidence_weight: 0.4,
            quality_weight: 0.3,
            enable_validation: true,
            enable_caching: true,
            cache_capacity: 256,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl AggregationOptions {
    /// Weight applied to the cross-tier consistency score.
    pub fn consistency_weight(&self) -> f32 {
        (1.0 - self.confidence_weight - self.quality_weight).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archetype_presets_differ_from_general() {
        let general = DocumentArchetype::General.thresholds();
        let financial = DocumentArchetype::FinancialDocument.thresholds();
        assert_eq!(general, ComplexityThresholds::default());
        assert!(financial.overall < general.overall);
    }

    #[test]
    fn consistency_weight_is_remainder() {
        let opts = AggregationOptions::default();
        assert!((opts.consistency_weight() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn reason_weight_lookup_matches_fields() {
        let weights = ReasonWeights::default();
        assert_eq!(weights.for_reason(UpgradeReason::LowConfidence), 0.9);
        assert_eq!(weights.for_reason(UpgradeReason::FinancialContent), 0.65);
    }
}
