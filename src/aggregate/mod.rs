//! Final-result aggregation across the two OCR tiers.
//!
//! Selects the better tier result (higher tier preferred, overridden
//! when the lower tier is structurally better), merges tables and
//! entities from both tiers, computes the final confidence, classifies
//! the content, and enriches the processing metadata. Aggregation is
//! infallible: with no usable tier result it returns a failed final
//! result instead of erroring.

pub mod content;
pub mod entities;
pub mod quality;
pub mod tables;

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde_json::{json, Map, Value};

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::config::AggregationOptions;
use crate::types::{
    ComplexityMetrics, FinalResult, ProcessingTier, TierResult, UpgradeDecision,
};

/// Consistency when only one tier produced text.
const ONE_SIDED_CONSISTENCY: f32 = 0.5;

/// Final confidence below this raises a validation issue.
const MIN_FINAL_CONFIDENCE: f32 = 0.3;

/// Extracted text shorter than this raises a validation issue.
const MIN_CONTENT_CHARS: usize = 5;

/// Fraction of entities below 0.5 confidence that raises an issue.
const LOW_ENTITY_FRACTION: f32 = 0.5;

/// Inputs to one aggregation. Tier results are borrowed; either may be
/// absent.
#[derive(Default)]
pub struct AggregationRequest<'a> {
    pub tier2_result: Option<&'a TierResult>,
    pub tier3_result: Option<&'a TierResult>,
    pub complexity_metrics: Option<&'a ComplexityMetrics>,
    pub upgrade_decision: Option<&'a UpgradeDecision>,
    pub processing_metadata: Map<String, Value>,
    pub cache_key: Option<CacheKey>,
}

pub struct ResultAggregator {
    options: AggregationOptions,
    cache: Option<Mutex<ResultCache>>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(AggregationOptions::default())
    }
}

impl ResultAggregator {
    pub fn new(options: AggregationOptions) -> Self {
        let cache = options
            .enable_caching
            .then(|| Mutex::new(ResultCache::new(options.cache_capacity, options.cache_ttl)));
        Self { options, cache }
    }

    /// Aggregate the tier results into the terminal [`FinalResult`].
    pub fn aggregate(&self, request: AggregationRequest<'_>) -> FinalResult {
        if let Some(cached) = self.lookup(request.cache_key.as_ref()) {
            tracing::debug!("returning cached aggregation result");
            return cached;
        }

        let (selected, processing_tier) =
            self.select_best_result(request.tier2_result, request.tier3_result);

        let Some(selected) = selected else {
            tracing::warn!("no usable tier result, aggregation failed");
            let mut result = FinalResult::aggregation_error("no valid results available");
            let mut metadata = self.enhance_metadata(
                request.processing_metadata,
                request.tier2_result,
                request.tier3_result,
                None,
                ProcessingTier::Failed,
                0,
            );
            metadata.append(&mut result.processing_metadata);
            result.processing_metadata = metadata;
            return result;
        };

        let selected_is_tier2 = request
            .tier2_result
            .map_or(false, |t2| std::ptr::eq(t2, selected));
        let other = if selected_is_tier2 {
            request.tier3_result
        } else {
            request.tier2_result
        };

        let mut extracted = content::clean_text(&selected.text);
        if selected_is_tier2 {
            if let Some(tier3) = request.tier3_result {
                let tier3_len = tier3.text.chars().count() as f32;
                let main_len = extracted.chars().count() as f32;
                if tier3_len > main_len * content::SUPPLEMENT_LENGTH_RATIO {
                    let lines = content::supplementary_lines(&extracted, &tier3.text);
                    content::append_supplement(&mut extracted, &lines);
                }
            }
        }

        let empty_tables: &[crate::types::TableData] = &[];
        let empty_entities: &[crate::types::Entity] = &[];
        let table_data = tables::merge_tables(
            &selected.tables,
            other.map_or(empty_tables, |o| &o.tables),
        );
        let merged_entities = entities::merge_entities(
            &selected.entities,
            other.map_or(empty_entities, |o| &o.entities),
        );

        let final_confidence = self.final_confidence(
            request.tier2_result,
            request.tier3_result,
            selected,
            processing_tier,
        );

        let content_type =
            content::determine_content_type(&extracted, &table_data, &merged_entities);

        let mut metadata = self.enhance_metadata(
            request.processing_metadata,
            request.tier2_result,
            request.tier3_result,
            Some(selected),
            processing_tier,
            extracted.chars().count(),
        );

        if self.options.enable_validation {
            let issues = validate(&extracted, &table_data, &merged_entities, final_confidence);
            if !issues.is_empty() {
                tracing::warn!(?issues, "final result validation raised issues");
            }
            metadata.insert(
                "validation".to_string(),
                json!({ "valid": issues.is_empty(), "issues": issues }),
            );
        }

        let result = FinalResult {
            success: selected.success,
            processing_tier,
            extracted_content: extracted,
            content_type,
            table_data,
            entities: merged_entities,
            final_confidence,
            complexity_metrics: request.complexity_metrics.cloned(),
            upgrade_decision: request.upgrade_decision.cloned(),
            processing_metadata: metadata,
            error: selected.error.clone(),
        };

        self.store(request.cache_key, &result);
        result
    }

    /// Pick the tier result to build on. The higher tier wins when
    /// preferred, unless the lower tier's structural quality is
    /// strictly better.
    fn select_best_result<'a>(
        &self,
        tier2: Option<&'a TierResult>,
        tier3: Option<&'a TierResult>,
    ) -> (Option<&'a TierResult>, ProcessingTier) {
        let tier2_ok = tier2.filter(|r| r.success);
        let tier3_ok = tier3.filter(|r| r.success);

        match (tier2_ok, tier3_ok) {
            (Some(t2), Some(t3)) => {
                let q2 = quality::result_quality(t2);
                let q3 = quality::result_quality(t3);
                let take_tier3 = if self.options.prefer_higher_tier {
                    q3 >= q2
                } else {
                    q3 > q2
                };
                if take_tier3 {
                    tracing::debug!(tier3_quality = q3, tier2_quality = q2, "selected tier 3");
                    (Some(t3), ProcessingTier::Tier3)
                } else {
                    tracing::debug!(tier2_quality = q2, tier3_quality = q3, "selected tier 2");
                    (Some(t2), ProcessingTier::Tier2)
                }
            }
            (None, Some(t3)) => (Some(t3), ProcessingTier::Tier3),
            (Some(t2), None) => (Some(t2), ProcessingTier::Tier2),
            (None, None) => (None, ProcessingTier::Failed),
        }
    }

    /// Weighted blend of base confidence, structural quality, and
    /// cross-tier consistency, scaled by the tier weight.
    fn final_confidence(
        &self,
        tier2: Option<&TierResult>,
        tier3: Option<&TierResult>,
        selected: &TierResult,
        processing_tier: ProcessingTier,
    ) -> f32 {
        let quality_score = quality::result_quality(selected);
        let consistency = match (tier2, tier3) {
            (Some(t2), Some(t3)) => tier_consistency(&t2.text, &t3.text),
            _ => 1.0,
        };

        let blended = selected.confidence * self.options.confidence_weight
            + quality_score * self.options.quality_weight
            + consistency * self.options.consistency_weight();

        (blended * processing_tier.confidence_weight()).min(1.0)
    }

    fn enhance_metadata(
        &self,
        mut metadata: Map<String, Value>,
        tier2: Option<&TierResult>,
        tier3: Option<&TierResult>,
        selected: Option<&TierResult>,
        processing_tier: ProcessingTier,
        text_length: usize,
    ) -> Map<String, Value> {
        metadata.insert(
            "aggregation_info".to_string(),
            json!({
                "selected_tier": processing_tier,
                "tier2_available": tier2.map_or(false, |r| r.success),
                "tier3_available": tier3.map_or(false, |r| r.success),
                "aggregation_method": "quality_based_selection",
            }),
        );
        metadata.insert(
            "result_statistics".to_string(),
            json!({
                "text_length": text_length,
                "table_count": selected.map_or(0, |r| r.tables.len()),
                "entity_count": selected.map_or(0, |r| r.entities.len()),
            }),
        );
        metadata.insert(
            "quality_assessment".to_string(),
            json!({
                "tier2_quality": tier2.map_or(0.0, quality::result_quality),
                "tier3_quality": tier3.map_or(0.0, quality::result_quality),
                "selected_quality": selected.map_or(0.0, quality::result_quality),
            }),
        );
        metadata
    }

    fn lookup(&self, key: Option<&CacheKey>) -> Option<FinalResult> {
        let (cache, key) = (self.cache.as_ref()?, key?);
        let mut cache = cache.lock().ok()?;
        cache.get(key)
    }

    fn store(&self, key: Option<CacheKey>, result: &FinalResult) {
        if let (Some(cache), Some(key)) = (self.cache.as_ref(), key) {
            if let Ok(mut cache) = cache.lock() {
                cache.insert(key, result.clone());
            }
        }
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Cache counters, when caching is enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        let cache = self.cache.as_ref()?.lock().ok()?;
        Some(cache.stats())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = self.cache.as_ref() {
            if let Ok(mut cache) = cache.lock() {
                cache.clear();
            }
        }
    }
}

/// Word-set Jaccard similarity between the two tiers' texts. One-sided
/// text is weak evidence either way.
fn tier_consistency(tier2_text: &str, tier3_text: &str) -> f32 {
    if tier2_text.is_empty() && tier3_text.is_empty() {
        return 1.0;
    }
    if tier2_text.is_empty() || tier3_text.is_empty() {
        return ONE_SIDED_CONSISTENCY;
    }

    let words2: BTreeSet<String> = tier2_text
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let words3: BTreeSet<String> = tier3_text
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let intersection = words2.intersection(&words3).count();
    let union = words2.union(&words3).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

/// Non-blocking post-hoc checks. Issues are reported in metadata and
/// logs, never enforced. The table check re-runs the structural
/// validation so a future merge change cannot silently pass broken
/// tables through.
fn validate(
    text: &str,
    table_data: &[crate::types::TableData],
    merged_entities: &[crate::types::Entity],
    confidence: f32,
) -> Vec<String> {
    let mut issues = Vec::new();

    if text.chars().count() < MIN_CONTENT_CHARS {
        issues.push("extracted text is empty or too short".to_string());
    }
    if confidence < MIN_FINAL_CONFIDENCE {
        issues.push(format!("final confidence too low: {confidence:.2}"));
    }
    for (index, table) in table_data.iter().enumerate() {
        if !tables::is_valid_table(table) {
            issues.push(format!("table {} has an incomplete structure", index + 1));
        }
    }
    if !merged_entities.is_empty() {
        let low = merged_entities
            .iter()
            .filter(|e| e.confidence < 0.5)
            .count();
        if low as f32 > merged_entities.len() as f32 * LOW_ENTITY_FRACTION {
            issues.push("entity confidence is broadly low".to_string());
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentType, Entity, TableData};
    use std::path::Path;

    fn rich_result(confidence: f32) -> TierResult {
        TierResult {
            success: true,
            text: "Account ledger for March.\nRevenue climbed while operating costs fell."
                .to_string(),
            confidence,
            tables: vec![TableData::new(
                vec!["Item".into(), "Amount".into()],
                vec![
                    vec!["Revenue".into(), "1200".into()],
                    vec!["Costs".into(), "800".into()],
                ],
            )],
            entities: vec![Entity {
                kind: "amount".into(),
                value: "1200".into(),
                confidence: 0.9,
            }],
            ..TierResult::default()
        }
    }

    fn request<'a>(
        tier2: Option<&'a TierResult>,
        tier3: Option<&'a TierResult>,
    ) -> AggregationRequest<'a> {
        AggregationRequest {
            tier2_result: tier2,
            tier3_result: tier3,
            ..AggregationRequest::default()
        }
    }

    #[test]
    fn higher_tier_is_preferred_when_at_least_as_good() {
        let aggregator = ResultAggregator::default();
        let tier2 = TierResult {
            success: true,
            text: "short".to_string(),
            confidence: 0.5,
            ..TierResult::default()
        };
        let tier3 = rich_result(0.9);

        let result = aggregator.aggregate(request(Some(&tier2), Some(&tier3)));
        assert_eq!(result.processing_tier, ProcessingTier::Tier3);
        assert!(result.success);
    }

    #[test]
    fn structurally_better_lower_tier_overrides_preference() {
        let aggregator = ResultAggregator::default();
        let tier2 = rich_result(0.9);
        let tier3 = TierResult {
            success: true,
            text: String::new(),
            confidence: 0.1,
            ..TierResult::default()
        };

        let result = aggregator.aggregate(request(Some(&tier2), Some(&tier3)));
        assert_eq!(result.processing_tier, ProcessingTier::Tier2);
    }

    #[test]
    fn single_successful_tier_is_used() {
        let aggregator = ResultAggregator::default();
        let tier2 = rich_result(0.8);
        let failed = TierResult::failed("engine crashed");

        let result = aggregator.aggregate(request(Some(&tier2), Some(&failed)));
        assert_eq!(result.processing_tier, ProcessingTier::Tier2);
        let alone = aggregator.aggregate(request(None, Some(&rich_result(0.8))));
        assert_eq!(alone.processing_tier, ProcessingTier::Tier3);
    }

    #[test]
    fn both_failed_yields_failed_result() {
        let aggregator = ResultAggregator::default();
        let failed2 = TierResult::failed("boom");
        let failed3 = TierResult::failed("also boom");

        let result = aggregator.aggregate(request(Some(&failed2), Some(&failed3)));
        assert!(!result.success);
        assert_eq!(result.processing_tier, ProcessingTier::Failed);
        assert_eq!(result.final_confidence, 0.0);
        assert!(result.error.is_some());
        assert!(result.processing_metadata.contains_key("aggregation_info"));
    }

    #[test]
    fn supplementary_lines_from_unused_tier_are_appended() {
        let aggregator = ResultAggregator::default();
        let tier2 = rich_result(0.9);
        let tier3 = TierResult {
            success: false,
            text: format!(
                "{}\nadditional recovered ledger line one\nadditional recovered ledger line two",
                tier2.text
            ),
            ..TierResult::default()
        };

        let result = aggregator.aggregate(request(Some(&tier2), Some(&tier3)));
        assert_eq!(result.processing_tier, ProcessingTier::Tier2);
        assert!(result
            .extracted_content
            .contains(content::SUPPLEMENT_MARKER));
        assert!(result
            .extracted_content
            .contains("additional recovered ledger line one"));
    }

    #[test]
    fn final_confidence_blends_and_scales_by_tier() {
        let aggregator = ResultAggregator::default();
        let tier2 = rich_result(0.9);

        let result = aggregator.aggregate(request(Some(&tier2), None));

        let q = quality::result_quality(&tier2);
        let expected = (0.9 * 0.4 + q * 0.3 + 1.0 * 0.3) * 0.85;
        assert!((result.final_confidence - expected).abs() < 1e-5);
        assert!(result.final_confidence <= 1.0);
    }

    #[test]
    fn content_type_follows_merged_artifacts() {
        let aggregator = ResultAggregator::default();
        let tier2 = rich_result(0.9);
        let with_tables = aggregator.aggregate(request(Some(&tier2), None));
        assert_eq!(with_tables.content_type, ContentType::MarkdownTable);

        let plain = TierResult {
            success: true,
            text: "just ordinary prose text".to_string(),
            confidence: 0.9,
            ..TierResult::default()
        };
        let result = aggregator.aggregate(request(Some(&plain), None));
        assert_eq!(result.content_type, ContentType::PlainText);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let aggregator = ResultAggregator::default();
        let tier2 = rich_result(0.9);
        let tier3 = rich_result(0.95);

        let first = aggregator.aggregate(request(Some(&tier2), Some(&tier3)));
        let second = aggregator.aggregate(request(Some(&tier2), Some(&tier3)));
        assert_eq!(first, second);
    }

    #[test]
    fn cached_result_is_returned_on_second_call() {
        let aggregator = ResultAggregator::default();
        let tier2 = rich_result(0.9);
        let key = CacheKey::for_image(Path::new("/nonexistent/cached.png"), &[]);

        let mut req = request(Some(&tier2), None);
        req.cache_key = Some(key.clone());
        let first = aggregator.aggregate(req);

        let mut req = request(Some(&tier2), None);
        req.cache_key = Some(key);
        let second = aggregator.aggregate(req);

        assert_eq!(first, second);
        let stats = aggregator.cache_stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.len, 1);
    }

    #[test]
    fn validation_issues_surface_in_metadata() {
        let aggregator = ResultAggregator::default();
        let weak = TierResult {
            success: true,
            text: "x".to_string(),
            confidence: 0.1,
            ..TierResult::default()
        };

        let result = aggregator.aggregate(request(Some(&weak), None));
        let validation = &result.processing_metadata["validation"];
        assert_eq!(validation["valid"], false);
        assert!(!validation["issues"].as_array().unwrap().is_empty());
    }

    #[test]
    fn validation_flags_structurally_broken_tables() {
        // Aggregation only emits validated tables, so exercise the
        // check directly with a ragged table.
        let ragged = TableData::new(
            vec!["A".into(), "B".into()],
            vec![vec!["1".into()], vec!["2".into()], vec!["3".into(), "4".into()]],
        );
        let issues = validate("long enough text", &[ragged], &[], 0.9);
        assert_eq!(issues, vec!["table 1 has an incomplete structure".to_string()]);

        let sound = TableData::new(
            vec!["A".into(), "B".into()],
            vec![vec!["1".into(), "2".into()]],
        );
        assert!(validate("long enough text", &[sound], &[], 0.9).is_empty());
    }

    #[test]
    fn consistency_edge_cases() {
        assert_eq!(tier_consistency("", ""), 1.0);
        assert_eq!(tier_consistency("text", ""), 0.5);
        assert_eq!(tier_consistency("alpha beta", "alpha beta"), 1.0);
        let partial = tier_consistency("alpha beta", "alpha gamma");
        assert!((partial - 1.0 / 3.0).abs() < 1e-6);
    }
}
