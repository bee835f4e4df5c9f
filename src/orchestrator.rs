//! Two-tier pipeline driver.
//!
//! Runs the Tier-2 engine, scores the image, asks the decision engine
//! whether to escalate, optionally runs the Tier-3 engine, and hands
//! everything to the aggregator. Engine failures become failed tier
//! results; the pipeline itself never errors.

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::aggregate::{AggregationRequest, ResultAggregator};
use crate::cache::CacheKey;
use crate::complexity::ComplexityAnalyzer;
use crate::config::{AggregationOptions, AnalyzerConfig, DecisionConfig};
use crate::decision::UpgradeDecisionEngine;
use crate::types::{ContextHints, FinalResult, OcrEngine, TierResult};

pub struct TwoTierPipeline {
    analyzer: ComplexityAnalyzer,
    decision_engine: UpgradeDecisionEngine,
    aggregator: ResultAggregator,
    tier2_engine: Box<dyn OcrEngine>,
    tier3_engine: Box<dyn OcrEngine>,
}

impl TwoTierPipeline {
    /// Pipeline with default configuration.
    pub fn new(tier2_engine: Box<dyn OcrEngine>, tier3_engine: Box<dyn OcrEngine>) -> Self {
        Self::with_config(
            AnalyzerConfig::default(),
            DecisionConfig::default(),
            AggregationOptions::default(),
            tier2_engine,
            tier3_engine,
        )
    }

    pub fn with_config(
        analyzer_config: AnalyzerConfig,
        decision_config: DecisionConfig,
        aggregation_options: AggregationOptions,
        tier2_engine: Box<dyn OcrEngine>,
        tier3_engine: Box<dyn OcrEngine>,
    ) -> Self {
        Self {
            analyzer: ComplexityAnalyzer::new(analyzer_config),
            decision_engine: UpgradeDecisionEngine::new(decision_config),
            aggregator: ResultAggregator::new(aggregation_options),
            tier2_engine,
            tier3_engine,
        }
    }

    /// Process one image end to end.
    pub fn process(&self, image_path: &Path, hints: &ContextHints) -> FinalResult {
        tracing::info!(path = %image_path.display(), "processing image");

        let cache_key = self
            .aggregator
            .caching_enabled()
            .then(|| CacheKey::for_image(image_path, &hints.context_tags));

        let tier2_result = run_engine(self.tier2_engine.as_ref(), image_path, hints);
        let metrics = self.analyzer.analyze(image_path, Some(hints));
        let decision = self.decision_engine.decide(&tier2_result, &metrics, Some(hints));

        let escalate = decision.should_upgrade && self.tier3_supports(hints);
        let tier3_result =
            escalate.then(|| run_engine(self.tier3_engine.as_ref(), image_path, hints));

        let mut metadata: Map<String, Value> = Map::new();
        metadata.insert(
            "pipeline".to_string(),
            json!({
                "source_image": image_path.display().to_string(),
                "escalated": escalate,
            }),
        );

        self.aggregator.aggregate(AggregationRequest {
            tier2_result: Some(&tier2_result),
            tier3_result: tier3_result.as_ref(),
            complexity_metrics: Some(&metrics),
            upgrade_decision: Some(&decision),
            processing_metadata: metadata,
            cache_key,
        })
    }

    fn tier3_supports(&self, hints: &ContextHints) -> bool {
        match hints.language.as_deref() {
            Some(language) if !self.tier3_engine.supports_language(language) => {
                tracing::warn!(language, "tier 3 engine lacks language support, not escalating");
                false
            }
            _ => true,
        }
    }
}

fn run_engine(engine: &dyn OcrEngine, image_path: &Path, hints: &ContextHints) -> TierResult {
    let tier = engine.processing_tier();
    match engine.process_image(image_path, hints) {
        Ok(result) => {
            tracing::debug!(?tier, confidence = result.confidence, "engine completed");
            result
        }
        Err(err) => {
            tracing::warn!(?tier, error = %err, "engine failed");
            TierResult::failed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriageError;
    use crate::types::ProcessingTier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockEngine {
        tier: ProcessingTier,
        response: Option<TierResult>,
        calls: Arc<AtomicUsize>,
        supported_language: Option<String>,
    }

    impl MockEngine {
        fn boxed(
            tier: ProcessingTier,
            response: Option<TierResult>,
        ) -> (Box<dyn OcrEngine>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let engine = Box::new(Self {
                tier,
                response,
                calls: Arc::clone(&calls),
                supported_language: None,
            });
            (engine, calls)
        }
    }

    impl OcrEngine for MockEngine {
        fn process_image(
            &self,
            _path: &Path,
            _hints: &ContextHints,
        ) -> Result<TierResult, TriageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .clone()
                .ok_or_else(|| TriageError::TotalFailure("mock engine failure".to_string()))
        }

        fn supports_language(&self, language: &str) -> bool {
            self.supported_language
                .as_deref()
                .map_or(true, |supported| supported == language)
        }

        fn processing_tier(&self) -> ProcessingTier {
            self.tier
        }
    }

    fn ok_result(text: &str, confidence: f32) -> TierResult {
        TierResult {
            success: true,
            text: text.to_string(),
            confidence,
            ..TierResult::default()
        }
    }

    #[test]
    fn confident_tier2_skips_escalation() {
        let (tier2, _) = MockEngine::boxed(
            ProcessingTier::Tier2,
            Some(ok_result("ordinary body text here", 0.95)),
        );
        let (tier3, tier3_calls) = MockEngine::boxed(
            ProcessingTier::Tier3,
            Some(ok_result("unused tier three output", 0.99)),
        );
        let pipeline = TwoTierPipeline::new(tier2, tier3);

        let result = pipeline.process(Path::new("/nonexistent/page_01.png"), &ContextHints::default());

        assert_eq!(tier3_calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.processing_tier, ProcessingTier::Tier2);
        assert!(result.success);
        assert!(!result.upgrade_decision.as_ref().unwrap().should_upgrade);
    }

    #[test]
    fn weak_tier2_escalates_to_tier3() {
        let (tier2, _) = MockEngine::boxed(ProcessingTier::Tier2, Some(ok_result("", 0.3)));
        let (tier3, tier3_calls) = MockEngine::boxed(
            ProcessingTier::Tier3,
            Some(ok_result("recovered ledger text from the stronger model", 0.9)),
        );
        let pipeline = TwoTierPipeline::new(tier2, tier3);

        let result = pipeline.process(Path::new("/nonexistent/page_02.png"), &ContextHints::default());

        assert_eq!(tier3_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.processing_tier, ProcessingTier::Tier3);
        assert!(result.success);
    }

    #[test]
    fn tier2_engine_error_becomes_failed_result_and_escalates() {
        let (tier2, _) = MockEngine::boxed(ProcessingTier::Tier2, None);
        let (tier3, tier3_calls) = MockEngine::boxed(
            ProcessingTier::Tier3,
            Some(ok_result("salvaged by the vision model", 0.85)),
        );
        let pipeline = TwoTierPipeline::new(tier2, tier3);

        let result = pipeline.process(Path::new("/nonexistent/page_03.png"), &ContextHints::default());

        assert_eq!(tier3_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.processing_tier, ProcessingTier::Tier3);
    }

    #[test]
    fn both_engines_failing_yields_failed_result() {
        let (tier2, _) = MockEngine::boxed(ProcessingTier::Tier2, None);
        let (tier3, _) = MockEngine::boxed(ProcessingTier::Tier3, None);
        let pipeline = TwoTierPipeline::new(tier2, tier3);

        let result = pipeline.process(Path::new("/nonexistent/page_04.png"), &ContextHints::default());

        assert!(!result.success);
        assert_eq!(result.processing_tier, ProcessingTier::Failed);
    }

    #[test]
    fn unsupported_language_blocks_escalation() {
        let (tier2, _) = MockEngine::boxed(ProcessingTier::Tier2, Some(ok_result("", 0.3)));
        let calls = Arc::new(AtomicUsize::new(0));
        let tier3 = Box::new(MockEngine {
            tier: ProcessingTier::Tier3,
            response: Some(ok_result("never reached", 0.9)),
            calls: Arc::clone(&calls),
            supported_language: Some("korean".to_string()),
        });
        let pipeline = TwoTierPipeline::new(tier2, tier3);

        let hints = ContextHints {
            language: Some("arabic".to_string()),
            ..ContextHints::default()
        };
        let result = pipeline.process(Path::new("/nonexistent/page_05.png"), &hints);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.processing_tier, ProcessingTier::Tier2);
    }
}
