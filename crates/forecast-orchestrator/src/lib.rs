//! End-to-end forecast flow and the shared latest-result slot.

pub mod pipeline;
pub mod slot;

#[path = "pipeline_tests.rs"]
mod pipeline_tests;

pub use pipeline::{
    normalize_ticker, ForecastOutcome, ForecastOverrides, ForecastPipeline, NewsSummary, PipelineConfig,
    TrainingSummary, DEFAULT_HISTORY_DAYS, MAX_EPOCHS,
};
pub use slot::{ForecastStatus, LatestResult, LatestResultSlot};
