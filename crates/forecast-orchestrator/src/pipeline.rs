use chart_renderer::{ChartConfig, ChartRenderer};
use chrono::{Duration, NaiveDate, Utc};
use forecast_core::{
    CompanyProfile, ForecastError, ForecastResult, MarketDataProvider, NewsArticle, PriceSeries,
};
use price_forecaster::{forecast_next_close, ForecasterConfig, PointForecast, DEFAULT_EPOCHS};
use sentiment_scorer::{NewsAggregator, NewsReport, DEFAULT_MAX_ARTICLES};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::slot::LatestResultSlot;

pub const DEFAULT_HISTORY_DAYS: i64 = 730;
pub const MAX_EPOCHS: usize = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Calendar days of daily history requested from the provider.
    pub history_days: i64,
    pub epochs: usize,
    pub max_articles: usize,
    /// Applied when a request does not carry its own seed.
    pub seed: Option<u64>,
    pub chart: ChartConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_days: DEFAULT_HISTORY_DAYS,
            epochs: DEFAULT_EPOCHS,
            max_articles: DEFAULT_MAX_ARTICLES,
            seed: None,
            chart: ChartConfig::default(),
        }
    }
}

/// Per-request overrides of the pipeline defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastOverrides {
    pub epochs: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub final_loss: Option<f64>,
    pub final_val_loss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub ticker: String,
    pub company_name: String,
    pub sector: String,
    pub news_sentiment: f64,
    pub news_articles: usize,
    pub last_date: NaiveDate,
    pub last_price: f64,
    pub predicted_date: NaiveDate,
    pub predicted_price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub history_days: i64,
    pub epochs: usize,
    pub data_points: usize,
    pub seed: u64,
    pub training: TrainingSummary,
    /// `data:image/png;base64,...`
    pub chart: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSummary {
    pub ticker: String,
    pub company_name: String,
    pub sector: String,
    pub overall_sentiment: f64,
    pub news: Vec<NewsArticle>,
}

pub fn normalize_ticker(ticker: &str) -> ForecastResult<String> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(ForecastError::InvalidData("ticker must not be empty".to_string()));
    }
    if !ticker.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
        return Err(ForecastError::InvalidData(format!("invalid ticker '{}'", ticker)));
    }
    Ok(ticker)
}

/// Fetch → score → train → predict → render, for one ticker per call.
#[derive(Clone)]
pub struct ForecastPipeline {
    provider: Arc<dyn MarketDataProvider>,
    news: NewsAggregator,
    config: PipelineConfig,
}

impl ForecastPipeline {
    pub fn new(provider: Arc<dyn MarketDataProvider>, news: NewsAggregator, config: PipelineConfig) -> Self {
        Self { provider, news, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sentiment_backend(&self) -> &'static str {
        self.news.scorer().backend_name()
    }

    async fn profile(&self, ticker: &str) -> CompanyProfile {
        match self.provider.company_profile(ticker).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Failed to fetch company info for {}: {}", ticker, e);
                CompanyProfile::fallback(ticker)
            }
        }
    }

    async fn history(&self, ticker: &str) -> ForecastResult<PriceSeries> {
        let to = Utc::now().date_naive();
        let from = to - Duration::days(self.config.history_days);
        let records = self.provider.daily_history(ticker, from, to).await?;
        if records.is_empty() {
            return Err(ForecastError::DataUnavailable(format!("No price data found for ticker {}", ticker)));
        }
        tracing::info!("Fetched {} daily records for {} ({} to {})", records.len(), ticker, from, to);
        PriceSeries::new(ticker, records)
    }

    /// Run a full forecast. News failures degrade to neutral sentiment; everything else aborts.
    pub async fn run(&self, ticker: &str, overrides: ForecastOverrides) -> ForecastResult<ForecastOutcome> {
        let ticker = normalize_ticker(ticker)?;
        let epochs = overrides.epochs.unwrap_or(self.config.epochs);
        if epochs == 0 || epochs > MAX_EPOCHS {
            return Err(ForecastError::InvalidData(format!(
                "epochs must be between 1 and {}, got {}",
                MAX_EPOCHS, epochs
            )));
        }
        let seed = overrides.seed.or(self.config.seed);

        tracing::info!("Starting forecast for {} ({} epochs)", ticker, epochs);

        let (series_result, news_result, profile) = tokio::join!(
            self.history(&ticker),
            self.news.collect(&ticker, self.config.max_articles),
            self.profile(&ticker),
        );

        let series = series_result?;
        let report = news_result.unwrap_or_else(|e| {
            tracing::warn!("News unavailable for {}, using neutral sentiment: {}", ticker, e);
            NewsReport::empty()
        });
        tracing::info!(
            "Sentiment for {}: {:.4} from {} articles",
            ticker,
            report.overall_sentiment,
            report.articles.len()
        );

        let last = series
            .last()
            .cloned()
            .ok_or_else(|| ForecastError::DataUnavailable(format!("No price data found for ticker {}", ticker)))?;
        let predicted_date = last.date + Duration::days(1);

        let sentiment = report.overall_sentiment;
        let forecaster_config = ForecasterConfig {
            seed,
            ..ForecasterConfig::default()
        };
        let renderer = ChartRenderer::new(self.config.chart);

        let (forecast, chart) = tokio::task::spawn_blocking(move || -> ForecastResult<(PointForecast, String)> {
            let forecast = forecast_next_close(&series, sentiment, epochs, forecaster_config)?;
            let chart = renderer.render(&series, predicted_date, forecast.predicted_price)?;
            Ok((forecast, chart))
        })
        .await
        .map_err(|e| ForecastError::Training(format!("forecast task failed: {}", e)))??;

        let change = forecast.predicted_price - last.close;
        let change_percent = if last.close != 0.0 {
            change / last.close * 100.0
        } else {
            0.0
        };

        tracing::info!(
            "Forecast for {}: {:.2} -> {:.2} ({:+.2}%) on {}",
            ticker,
            last.close,
            forecast.predicted_price,
            change_percent,
            predicted_date
        );

        Ok(ForecastOutcome {
            company_name: profile.name,
            sector: profile.sector,
            news_sentiment: sentiment,
            news_articles: report.articles.len(),
            last_date: last.date,
            last_price: last.close,
            predicted_date,
            predicted_price: forecast.predicted_price,
            change,
            change_percent,
            history_days: self.config.history_days,
            epochs,
            data_points: forecast.data_points,
            seed: forecast.seed,
            training: TrainingSummary {
                final_loss: forecast.history.final_loss(),
                final_val_loss: forecast.history.final_val_loss(),
            },
            chart,
            ticker,
        })
    }

    /// Run and store the result (success or failure) in `slot`.
    pub async fn run_recorded(
        &self,
        ticker: &str,
        overrides: ForecastOverrides,
        slot: &LatestResultSlot,
    ) -> ForecastResult<ForecastOutcome> {
        match self.run(ticker, overrides).await {
            Ok(outcome) => {
                slot.record_success(outcome.clone()).await;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!("Forecast for {} failed: {}", ticker, e);
                slot.record_failure(&ticker.trim().to_uppercase(), &e).await;
                Err(e)
            }
        }
    }

    /// Scored news plus company info. Unlike [`run`](Self::run), a news fetch failure is returned.
    pub async fn news(&self, ticker: &str) -> ForecastResult<NewsSummary> {
        let ticker = normalize_ticker(ticker)?;
        let (report, profile) = tokio::join!(
            self.news.collect(&ticker, self.config.max_articles),
            self.profile(&ticker),
        );
        let report = report?;

        Ok(NewsSummary {
            company_name: profile.name,
            sector: profile.sector,
            overall_sentiment: report.overall_sentiment,
            news: report.articles,
            ticker,
        })
    }
}
