use chrono::{DateTime, Utc};
use forecast_core::ForecastError;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::pipeline::ForecastOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastStatus {
    Idle,
    Success,
    Error,
}

/// Snapshot of the most recent forecast request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestResult {
    pub status: ForecastStatus,
    pub ticker: Option<String>,
    pub outcome: Option<ForecastOutcome>,
    pub error: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl LatestResult {
    fn idle() -> Self {
        Self {
            status: ForecastStatus::Idle,
            ticker: None,
            outcome: None,
            error: None,
            timestamp: None,
        }
    }

    pub fn chart(&self) -> Option<&str> {
        self.outcome.as_ref().map(|o| o.chart.as_str())
    }
}

/// Single shared slot holding the last completed or failed forecast.
///
/// Every write replaces the whole entry; a failure clears the previous chart.
pub struct LatestResultSlot {
    inner: RwLock<LatestResult>,
}

impl LatestResultSlot {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LatestResult::idle()),
        }
    }

    pub async fn record_success(&self, outcome: ForecastOutcome) {
        let mut slot = self.inner.write().await;
        *slot = LatestResult {
            status: ForecastStatus::Success,
            ticker: Some(outcome.ticker.clone()),
            outcome: Some(outcome),
            error: None,
            timestamp: Some(Utc::now()),
        };
    }

    pub async fn record_failure(&self, ticker: &str, error: &ForecastError) {
        let mut slot = self.inner.write().await;
        *slot = LatestResult {
            status: ForecastStatus::Error,
            ticker: Some(ticker.to_string()),
            outcome: None,
            error: Some(error.to_string()),
            timestamp: Some(Utc::now()),
        };
    }

    pub async fn snapshot(&self) -> LatestResult {
        self.inner.read().await.clone()
    }

    pub async fn latest_chart(&self) -> Option<String> {
        self.inner.read().await.chart().map(str::to_string)
    }
}

impl Default for LatestResultSlot {
    fn default() -> Self {
        Self::new()
    }
}
