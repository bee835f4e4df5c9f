//! End-to-end pipeline tests over real image files and mock engines.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ocr_triage::{
    AggregationOptions, AnalyzerConfig, ContentType, ContextHints, DecisionConfig, Entity,
    OcrEngine, ProcessingTier, TableData, TierResult, TriageError, TwoTierPipeline,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct ScriptedEngine {
    tier: ProcessingTier,
    response: Option<TierResult>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    fn boxed(
        tier: ProcessingTier,
        response: Option<TierResult>,
    ) -> (Box<dyn OcrEngine>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Box::new(Self {
            tier,
            response,
            calls: Arc::clone(&calls),
        });
        (engine, calls)
    }
}

impl OcrEngine for ScriptedEngine {
    fn process_image(
        &self,
        _path: &Path,
        _hints: &ContextHints,
    ) -> Result<TierResult, TriageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| TriageError::TotalFailure("scripted failure".to_string()))
    }

    fn supports_language(&self, _language: &str) -> bool {
        true
    }

    fn processing_tier(&self) -> ProcessingTier {
        self.tier
    }
}

/// White page with a dark line grid, saved as a PNG fixture.
fn save_grid_image(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let size = 240u32;
    let mut img = image::GrayImage::from_pixel(size, size, image::Luma([255]));
    for i in 1..6 {
        let pos = i * size / 6;
        for t in 0..size {
            img.put_pixel(t, pos, image::Luma([0]));
            img.put_pixel(pos, t, image::Luma([0]));
        }
    }
    let path = dir.path().join(name);
    img.save(&path).unwrap();
    path
}

fn financial_tier2() -> TierResult {
    TierResult {
        success: true,
        text: "Quarterly Statement\nRevenue 1,234,000\nOperating profit 210,000".to_string(),
        confidence: 0.93,
        tables: vec![TableData::new(
            vec!["Item".into(), "Amount".into()],
            vec![
                vec!["Revenue".into(), "1,234,000".into()],
                vec!["Profit".into(), "210,000".into()],
            ],
        )],
        entities: vec![Entity {
            kind: "amount".into(),
            value: "1,234,000".into(),
            confidence: 0.9,
        }],
        ..TierResult::default()
    }
}

#[test]
fn confident_result_finishes_at_tier2() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let image_path = save_grid_image(&dir, "ledger_scan.png");

    let (tier2, _) = ScriptedEngine::boxed(ProcessingTier::Tier2, Some(financial_tier2()));
    let (tier3, tier3_calls) = ScriptedEngine::boxed(
        ProcessingTier::Tier3,
        Some(TierResult {
            success: true,
            text: "unused".to_string(),
            confidence: 0.99,
            ..TierResult::default()
        }),
    );
    let pipeline = TwoTierPipeline::new(tier2, tier3);

    let result = pipeline.process(&image_path, &ContextHints::default());

    assert_eq!(tier3_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.processing_tier, ProcessingTier::Tier2);
    assert!(result.success);
    assert_eq!(result.content_type, ContentType::MarkdownTable);
    assert!(result.final_confidence > 0.5);

    let metrics = result.complexity_metrics.as_ref().unwrap();
    assert_eq!(metrics.metadata.image_width, 240);
    assert!(metrics.overall_complexity <= 1.0);

    let decision = result.upgrade_decision.as_ref().unwrap();
    assert!(!decision.should_upgrade);
    assert!(result.processing_metadata.contains_key("pipeline"));
}

#[test]
fn garbled_tier2_escalates_and_uses_tier3_output() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let image_path = save_grid_image(&dir, "dense_table.png");

    let tier2_result = TierResult {
        success: true,
        text: "a1b2 x9y8 1l1l".to_string(),
        confidence: 0.35,
        ..TierResult::default()
    };
    let tier3_result = TierResult {
        success: true,
        text: "Account ledger recovered in full by the vision model.".to_string(),
        confidence: 0.92,
        ..TierResult::default()
    };

    let (tier2, _) = ScriptedEngine::boxed(ProcessingTier::Tier2, Some(tier2_result));
    let (tier3, tier3_calls) = ScriptedEngine::boxed(ProcessingTier::Tier3, Some(tier3_result));
    let pipeline = TwoTierPipeline::new(tier2, tier3);

    let result = pipeline.process(&image_path, &ContextHints::default());

    assert_eq!(tier3_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.processing_tier, ProcessingTier::Tier3);
    assert!(result.upgrade_decision.as_ref().unwrap().should_upgrade);
    assert!(result
        .extracted_content
        .contains("Account ledger recovered"));
}

#[test]
fn repeated_processing_hits_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = save_grid_image(&dir, "cached_page.png");

    let (tier2, tier2_calls) =
        ScriptedEngine::boxed(ProcessingTier::Tier2, Some(financial_tier2()));
    let (tier3, _) = ScriptedEngine::boxed(ProcessingTier::Tier3, None);
    let pipeline = TwoTierPipeline::new(tier2, tier3);

    let hints = ContextHints {
        context_tags: vec!["financial".to_string()],
        ..ContextHints::default()
    };
    let first = pipeline.process(&image_path, &hints);
    let second = pipeline.process(&image_path, &hints);

    assert_eq!(first, second);
    // Tier 2 still ran twice: the cache short-circuits aggregation,
    // not the engines.
    assert_eq!(tier2_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn engine_failures_degrade_to_a_failed_final_result() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = save_grid_image(&dir, "broken_page.png");

    let (tier2, _) = ScriptedEngine::boxed(ProcessingTier::Tier2, None);
    let (tier3, tier3_calls) = ScriptedEngine::boxed(ProcessingTier::Tier3, None);
    let pipeline = TwoTierPipeline::new(tier2, tier3);

    let result = pipeline.process(&image_path, &ContextHints::default());

    assert_eq!(tier3_calls.load(Ordering::SeqCst), 1);
    assert!(!result.success);
    assert_eq!(result.processing_tier, ProcessingTier::Failed);
    assert_eq!(result.final_confidence, 0.0);
    assert!(result.error.is_some());
}

#[test]
fn custom_configuration_flows_through_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = save_grid_image(&dir, "custom_config.png");

    let mut options = AggregationOptions::default();
    options.enable_caching = false;
    let pipeline = TwoTierPipeline::with_config(
        AnalyzerConfig::default(),
        DecisionConfig::default(),
        options,
        ScriptedEngine::boxed(ProcessingTier::Tier2, Some(financial_tier2())).0,
        ScriptedEngine::boxed(ProcessingTier::Tier3, None).0,
    );

    let result = pipeline.process(&image_path, &ContextHints::default());
    assert!(result.success);
    assert!(result.processing_metadata.contains_key("aggregation_info"));
}
