use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{ClassProbabilities, CompanyProfile, ForecastError, PriceRecord, RawArticle};

/// Source of daily price history, news and company reference data.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily OHLCV records between `from` and `to` inclusive, oldest first.
    async fn daily_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceRecord>, ForecastError>;

    /// Most recent news items for `ticker`, in provider order.
    async fn recent_news(&self, ticker: &str, limit: usize) -> Result<Vec<RawArticle>, ForecastError>;

    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, ForecastError>;

    /// Landing page used when an article comes without a link.
    fn homepage_url(&self, ticker: &str) -> String;

    /// Publisher name used when an article does not carry one.
    fn display_name(&self) -> &'static str;
}

/// Pretrained three-class text classifier.
///
/// Loaded once at startup and shared read-only between requests.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassProbabilities, ForecastError>;

    fn backend_name(&self) -> &'static str;
}
