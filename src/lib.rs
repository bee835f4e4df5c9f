//! Two-tier OCR escalation core.
//!
//! Documents enter at a fast Tier-2 OCR engine; pages that come back
//! uncertain are escalated to a slower, stronger Tier-3 engine. This
//! crate holds the decision and aggregation logic of that pipeline:
//!
//! - [`complexity::ComplexityAnalyzer`] scores how hard an image is to
//!   OCR along four dimensions.
//! - [`decision::UpgradeDecisionEngine`] turns the Tier-2 result and
//!   the complexity scores into an escalation decision.
//! - [`aggregate::ResultAggregator`] merges the tier outputs into one
//!   final result.
//! - [`orchestrator::TwoTierPipeline`] drives the whole flow over two
//!   [`OcrEngine`] implementations.
//!
//! The public entry points never fail: unreadable images degrade to
//! neutral complexity metrics, engine errors become failed tier
//! results, and an aggregation with nothing usable returns a failed
//! final result. Emits `tracing` events; install a subscriber to see
//! them.

pub mod aggregate;
pub mod cache;
pub mod complexity;
pub mod config;
pub mod decision;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use aggregate::{AggregationRequest, ResultAggregator};
pub use cache::{CacheKey, CacheStats};
pub use complexity::ComplexityAnalyzer;
pub use config::{
    AggregationOptions, AnalyzerConfig, DecisionConfig, DocumentArchetype,
};
pub use decision::UpgradeDecisionEngine;
pub use error::TriageError;
pub use orchestrator::TwoTierPipeline;
pub use types::{
    ComplexityMetrics, ContentType, ContextHints, Entity, FinalResult, OcrEngine,
    ProcessingTier, TableData, TierResult, UpgradeDecision,
};
