//! Tier-upgrade decision engine.
//!
//! Evaluates eight weighted rules against the Tier-2 result and the
//! image complexity metrics. Each triggered rule contributes its
//! threshold gap (or a fixed score for the boolean rules) times a
//! per-reason weight; the summed priority decides the upgrade. The
//! cost/benefit analysis is advisory metadata and never changes the
//! decision.

pub mod content;
pub mod text_quality;

use std::collections::BTreeMap;

use serde_json::json;

use crate::config::DecisionConfig;
use crate::types::{
    ComplexityMetrics, ContextHints, CostBenefit, ProcessingTier, ThresholdCheck, TierResult,
    UpgradeDecision, UpgradeFactor, UpgradeReason,
};

/// Fixed raw score of the mixed-language rule.
const MIXED_LANGUAGE_SCORE: f32 = 0.5;

/// Fixed raw score of the financial-content rule.
const FINANCIAL_CONTENT_SCORE: f32 = 0.4;

/// Raw score per detected special-content category.
const SPECIAL_CASE_SCORE: f32 = 0.2;

/// Cap on the expected accuracy improvement from escalation.
const MAX_EXPECTED_IMPROVEMENT: f32 = 0.3;

/// ROI above which escalation is labeled cost-effective.
const COST_EFFECTIVE_ROI: f32 = 0.5;

/// ROI floor for the advisory upgrade recommendation.
const RECOMMENDATION_ROI: f32 = 0.2;

/// Tier-2 confidence below which the degraded fallback decision still
/// escalates.
const FALLBACK_CONFIDENCE: f32 = 0.7;

pub struct UpgradeDecisionEngine {
    config: DecisionConfig,
}

impl Default for UpgradeDecisionEngine {
    fn default() -> Self {
        Self::new(DecisionConfig::default())
    }
}

impl UpgradeDecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    /// Decide whether the document should escalate to Tier 3.
    ///
    /// Pure over its inputs: the same result, metrics, and hints always
    /// produce the same decision.
    pub fn decide(
        &self,
        tier2_result: &TierResult,
        metrics: &ComplexityMetrics,
        hints: Option<&ContextHints>,
    ) -> UpgradeDecision {
        let thresholds = &self.config.thresholds;
        let weights = &self.config.weights;
        let mut factors: Vec<UpgradeFactor> = Vec::new();

        let confidence = tier2_result.confidence;
        if confidence < thresholds.confidence {
            factors.push(UpgradeFactor {
                reason: UpgradeReason::LowConfidence,
                score: thresholds.confidence - confidence,
                evidence: json!({
                    "confidence": confidence,
                    "threshold": thresholds.confidence,
                }),
            });
        }

        if let Some(accuracy) = tier2_result.target_language_accuracy {
            if accuracy < thresholds.target_language_accuracy {
                factors.push(UpgradeFactor {
                    reason: UpgradeReason::LowLanguageAccuracy,
                    score: thresholds.target_language_accuracy - accuracy,
                    evidence: json!({
                        "accuracy": accuracy,
                        "threshold": thresholds.target_language_accuracy,
                    }),
                });
            }
        }

        if metrics.table_complexity > thresholds.table_complexity {
            factors.push(UpgradeFactor {
                reason: UpgradeReason::HighTableComplexity,
                score: metrics.table_complexity - thresholds.table_complexity,
                evidence: json!({
                    "table_complexity": metrics.table_complexity,
                    "threshold": thresholds.table_complexity,
                }),
            });
        }

        if metrics.overall_complexity > thresholds.overall_complexity {
            factors.push(UpgradeFactor {
                reason: UpgradeReason::HighOverallComplexity,
                score: metrics.overall_complexity - thresholds.overall_complexity,
                evidence: json!({
                    "overall_complexity": metrics.overall_complexity,
                    "threshold": thresholds.overall_complexity,
                }),
            });
        }

        let special_cases =
            content::detect_special_cases(tier2_result, hints, &self.config.special_cases);
        if !special_cases.is_empty() {
            factors.push(UpgradeFactor {
                reason: UpgradeReason::SpecialContentDetected,
                score: (special_cases.len() as f32 * SPECIAL_CASE_SCORE).min(1.0),
                evidence: json!({ "categories": special_cases }),
            });
        }

        let quality = text_quality::text_quality(&tier2_result.text);
        if quality < thresholds.text_quality {
            factors.push(UpgradeFactor {
                reason: UpgradeReason::PoorTextQuality,
                score: thresholds.text_quality - quality,
                evidence: json!({
                    "text_quality": quality,
                    "threshold": thresholds.text_quality,
                }),
            });
        }

        if content::has_mixed_language_content(&tier2_result.text) {
            factors.push(UpgradeFactor {
                reason: UpgradeReason::MixedLanguageDetected,
                score: MIXED_LANGUAGE_SCORE,
                evidence: json!({}),
            });
        }

        if content::has_financial_content(
            &tier2_result.text,
            hints,
            &self.config.financial_keywords,
        ) {
            factors.push(UpgradeFactor {
                reason: UpgradeReason::FinancialContent,
                score: FINANCIAL_CONTENT_SCORE,
                evidence: json!({}),
            });
        }

        let priority_score: f32 = factors
            .iter()
            .map(|f| f.score * weights.for_reason(f.reason))
            .sum();
        let should_upgrade = priority_score > thresholds.priority;

        // The improvement estimate discounts each weighted factor by
        // its weight again: low-weight signals promise less recovery.
        let improvement_basis: f32 = factors
            .iter()
            .map(|f| {
                let weight = weights.for_reason(f.reason);
                f.score * weight * weight
            })
            .sum();

        let decision = UpgradeDecision {
            should_upgrade,
            target_tier: if should_upgrade {
                ProcessingTier::Tier3
            } else {
                ProcessingTier::Tier2
            },
            reasons: factors.iter().map(describe_factor).collect(),
            confidence_score: confidence,
            priority_score,
            cost_benefit: self.cost_benefit(confidence, improvement_basis, should_upgrade),
            threshold_report: self.threshold_report(tier2_result, metrics, quality),
        };

        tracing::debug!(
            should_upgrade = decision.should_upgrade,
            priority = decision.priority_score,
            confidence = confidence,
            reasons = decision.reasons.len(),
            "upgrade decision evaluated"
        );

        decision
    }

    /// Degraded decision for when the normal inputs are unavailable
    /// (for example when complexity analysis could not run at all).
    /// Escalates purely on low Tier-2 confidence.
    pub fn fallback_decision(&self, tier2_result: &TierResult) -> UpgradeDecision {
        let should_upgrade = tier2_result.confidence < FALLBACK_CONFIDENCE;
        UpgradeDecision {
            should_upgrade,
            target_tier: if should_upgrade {
                ProcessingTier::Tier3
            } else {
                ProcessingTier::Tier2
            },
            reasons: vec!["fallback decision on tier-2 confidence only".to_string()],
            confidence_score: tier2_result.confidence,
            priority_score: self.config.thresholds.priority,
            cost_benefit: CostBenefit::default(),
            threshold_report: BTreeMap::new(),
        }
    }

    /// Advisory cost/benefit analysis. Never changes the decision.
    fn cost_benefit(
        &self,
        confidence: f32,
        improvement_basis: f32,
        should_upgrade: bool,
    ) -> CostBenefit {
        let cost = &self.config.cost;
        let expected_improvement = improvement_basis.min(MAX_EXPECTED_IMPROVEMENT);
        let additional_cost = cost.tier3_cost - cost.tier2_cost;
        let quality_benefit = expected_improvement * cost.accuracy_improvement_value;
        let roi = if additional_cost > 0.0 {
            (quality_benefit - additional_cost) / additional_cost
        } else {
            0.0
        };

        CostBenefit {
            current_quality: confidence,
            expected_improvement,
            expected_final_quality: (confidence + expected_improvement).min(1.0),
            tier2_cost: cost.tier2_cost,
            tier3_cost: cost.tier3_cost,
            additional_cost,
            quality_benefit,
            roi,
            cost_effective: roi > COST_EFFECTIVE_ROI,
            upgrade_recommended: should_upgrade && roi > RECOMMENDATION_ROI,
        }
    }

    /// Value/threshold comparison for each scalar rule. `passed` means
    /// the value stayed on the healthy side of the threshold.
    fn threshold_report(
        &self,
        tier2_result: &TierResult,
        metrics: &ComplexityMetrics,
        quality: f32,
    ) -> BTreeMap<String, ThresholdCheck> {
        let thresholds = &self.config.thresholds;
        let mut report = BTreeMap::new();

        report.insert(
            "confidence".to_string(),
            ThresholdCheck {
                value: tier2_result.confidence,
                threshold: thresholds.confidence,
                passed: tier2_result.confidence >= thresholds.confidence,
            },
        );
        if let Some(accuracy) = tier2_result.target_language_accuracy {
            report.insert(
                "target_language_accuracy".to_string(),
                ThresholdCheck {
                    value: accuracy,
                    threshold: thresholds.target_language_accuracy,
                    passed: accuracy >= thresholds.target_language_accuracy,
                },
            );
        }
        report.insert(
            "table_complexity".to_string(),
            ThresholdCheck {
                value: metrics.table_complexity,
                threshold: thresholds.table_complexity,
                passed: metrics.table_complexity <= thresholds.table_complexity,
            },
        );
        report.insert(
            "overall_complexity".to_string(),
            ThresholdCheck {
                value: metrics.overall_complexity,
                threshold: thresholds.overall_complexity,
                passed: metrics.overall_complexity <= thresholds.overall_complexity,
            },
        );
        report.insert(
            "text_quality".to_string(),
            ThresholdCheck {
                value: quality,
                threshold: thresholds.text_quality,
                passed: quality >= thresholds.text_quality,
            },
        );

        report
    }
}

fn describe_factor(factor: &UpgradeFactor) -> String {
    format!("{} (score {:.3})", factor.reason, factor.score)
}

/// Static tier recommendation for a known document type, usable before
/// any processing has run.
pub fn tier_for_document_type(document_type: &str) -> ProcessingTier {
    match document_type {
        "financial_statement" | "complex_table" | "handwritten_form" | "technical_diagram" => {
            ProcessingTier::Tier3
        }
        _ => ProcessingTier::Tier2,
    }
}

/// Aggregate statistics over a batch of decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradePatternStats {
    pub total_decisions: usize,
    pub upgrades: usize,
    pub upgrade_rate: f32,
    pub mean_priority: f32,
    pub mean_confidence: f32,
    /// priority < 0.3
    pub low_priority: usize,
    /// 0.3 ≤ priority ≤ 0.5
    pub medium_priority: usize,
    /// priority > 0.5
    pub high_priority: usize,
    /// How often each reason string appeared across the batch.
    pub reason_counts: BTreeMap<String, usize>,
}

/// Summarize a batch of decisions. Returns `None` for an empty batch.
pub fn analyze_upgrade_patterns(decisions: &[UpgradeDecision]) -> Option<UpgradePatternStats> {
    if decisions.is_empty() {
        return None;
    }

    let total = decisions.len();
    let upgrades = decisions.iter().filter(|d| d.should_upgrade).count();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    for decision in decisions {
        for reason in &decision.reasons {
            // Strip the per-decision score suffix so identical rules
            // collate together.
            let key = reason
                .split_once(" (score")
                .map(|(head, _)| head.to_string())
                .unwrap_or_else(|| reason.clone());
            *reason_counts.entry(key).or_default() += 1;
        }
    }

    Some(UpgradePatternStats {
        total_decisions: total,
        upgrades,
        upgrade_rate: upgrades as f32 / total as f32,
        mean_priority: decisions.iter().map(|d| d.priority_score).sum::<f32>() / total as f32,
        mean_confidence: decisions.iter().map(|d| d.confidence_score).sum::<f32>() / total as f32,
        low_priority: decisions.iter().filter(|d| d.priority_score < 0.3).count(),
        medium_priority: decisions
            .iter()
            .filter(|d| (0.3..=0.5).contains(&d.priority_score))
            .count(),
        high_priority: decisions.iter().filter(|d| d.priority_score > 0.5).count(),
        reason_counts,
    })
}
