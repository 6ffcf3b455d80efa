use chrono::Utc;
use forecast_core::{stats, ForecastError, MarketDataProvider, NewsArticle, RawArticle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::SentimentScorer;

pub const DEFAULT_MAX_ARTICLES: usize = 8;

const MISSING_SUMMARY: &str = "Financial news summary not available";

/// Scored articles plus their mean tone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsReport {
    pub articles: Vec<NewsArticle>,
    pub overall_sentiment: f64,
}

impl NewsReport {
    pub fn empty() -> Self {
        Self {
            articles: Vec::new(),
            overall_sentiment: 0.0,
        }
    }
}

/// Pulls recent headlines from the market-data provider and reduces them to a
/// single sentiment scalar.
#[derive(Clone)]
pub struct NewsAggregator {
    provider: Arc<dyn MarketDataProvider>,
    scorer: SentimentScorer,
}

impl NewsAggregator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, scorer: SentimentScorer) -> Self {
        Self { provider, scorer }
    }

    pub fn scorer(&self) -> &SentimentScorer {
        &self.scorer
    }

    /// Recent news in provider order, at most `max_articles`, with missing fields filled in.
    pub async fn fetch(&self, ticker: &str, max_articles: usize) -> Result<Vec<NewsArticle>, ForecastError> {
        let raw = self.provider.recent_news(ticker, max_articles).await?;
        let articles: Vec<NewsArticle> = raw
            .into_iter()
            .take(max_articles)
            .enumerate()
            .map(|(i, article)| self.fill_defaults(ticker, i, article))
            .collect();

        tracing::info!("Fetched {} news articles for {}", articles.len(), ticker);
        Ok(articles)
    }

    fn fill_defaults(&self, ticker: &str, index: usize, raw: RawArticle) -> NewsArticle {
        NewsArticle {
            title: non_blank(raw.title).unwrap_or_else(|| format!("Financial News for {} #{}", ticker, index + 1)),
            summary: non_blank(raw.summary).unwrap_or_else(|| MISSING_SUMMARY.to_string()),
            url: non_blank(raw.url).unwrap_or_else(|| self.provider.homepage_url(ticker)),
            published_at: raw.published_at.unwrap_or_else(Utc::now),
            source: non_blank(raw.source).unwrap_or_else(|| self.provider.display_name().to_string()),
            sentiment: None,
        }
    }

    /// Score every article and average the results. No articles means neutral.
    pub async fn score_articles(&self, mut articles: Vec<NewsArticle>) -> NewsReport {
        let mut scores = Vec::with_capacity(articles.len());
        for article in articles.iter_mut() {
            let score = self.scorer.score(&article.scoring_text()).await;
            article.sentiment = Some(score);
            scores.push(score);
        }

        NewsReport {
            overall_sentiment: stats::mean(&scores),
            articles,
        }
    }

    pub async fn collect(&self, ticker: &str, max_articles: usize) -> Result<NewsReport, ForecastError> {
        let articles = self.fetch(ticker, max_articles).await?;
        Ok(self.score_articles(articles).await)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use forecast_core::{ClassProbabilities, CompanyProfile, PriceRecord, SentimentClassifier};

    struct FakeProvider {
        articles: Vec<RawArticle>,
        fail: bool,
    }

    #[async_trait]
    impl MarketDataProvider for FakeProvider {
        async fn daily_history(
            &self,
            _ticker: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Vec<PriceRecord>, ForecastError> {
            Ok(vec![])
        }

        async fn recent_news(&self, _ticker: &str, _limit: usize) -> Result<Vec<RawArticle>, ForecastError> {
            if self.fail {
                return Err(ForecastError::Provider("news endpoint down".to_string()));
            }
            Ok(self.articles.clone())
        }

        async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, ForecastError> {
            Ok(CompanyProfile::fallback(ticker))
        }

        fn homepage_url(&self, ticker: &str) -> String {
            format!("https://example.test/{}", ticker)
        }

        fn display_name(&self) -> &'static str {
            "Example Wire"
        }
    }

    /// Positive when the text mentions "up", negative otherwise.
    struct KeywordClassifier;

    #[async_trait]
    impl SentimentClassifier for KeywordClassifier {
        async fn classify(&self, text: &str) -> Result<ClassProbabilities, ForecastError> {
            if text.contains("up") {
                ClassProbabilities::normalized(0.0, 0.2, 0.8)
            } else {
                ClassProbabilities::normalized(0.6, 0.4, 0.0)
            }
        }

        fn backend_name(&self) -> &'static str {
            "keyword"
        }
    }

    fn aggregator(articles: Vec<RawArticle>, scorer: SentimentScorer) -> NewsAggregator {
        NewsAggregator::new(Arc::new(FakeProvider { articles, fail: false }), scorer)
    }

    fn titled(title: &str) -> RawArticle {
        RawArticle {
            title: Some(title.to_string()),
            summary: Some("details".to_string()),
            url: Some("https://news.test/a".to_string()),
            published_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            source: Some("Wire".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_fields_get_defaults() {
        let agg = aggregator(vec![titled("first"), RawArticle::default()], SentimentScorer::neutral());
        let articles = agg.fetch("AAPL", DEFAULT_MAX_ARTICLES).await.unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "first");
        assert_eq!(articles[1].title, "Financial News for AAPL #2");
        assert_eq!(articles[1].summary, MISSING_SUMMARY);
        assert_eq!(articles[1].url, "https://example.test/AAPL");
        assert_eq!(articles[1].source, "Example Wire");
        assert!(articles[1].sentiment.is_none());
    }

    #[tokio::test]
    async fn test_blank_title_is_replaced() {
        let mut raw = titled("   ");
        raw.summary = Some(String::new());
        let agg = aggregator(vec![raw], SentimentScorer::neutral());
        let articles = agg.fetch("MSFT", 8).await.unwrap();
        assert_eq!(articles[0].title, "Financial News for MSFT #1");
        assert_eq!(articles[0].summary, MISSING_SUMMARY);
    }

    #[tokio::test]
    async fn test_fetch_caps_and_keeps_order() {
        let raw: Vec<RawArticle> = (0..12).map(|i| titled(&format!("story {}", i))).collect();
        let agg = aggregator(raw, SentimentScorer::neutral());
        let articles = agg.fetch("TSLA", 8).await.unwrap();

        assert_eq!(articles.len(), 8);
        for (i, article) in articles.iter().enumerate() {
            assert_eq!(article.title, format!("story {}", i));
        }
    }

    #[tokio::test]
    async fn test_overall_sentiment_is_mean() {
        let agg = aggregator(
            vec![titled("shares up"), titled("shares down")],
            SentimentScorer::new(Arc::new(KeywordClassifier)),
        );
        let report = agg.collect("NVDA", 8).await.unwrap();

        assert_eq!(report.articles[0].sentiment, Some(0.8));
        assert_eq!(report.articles[1].sentiment, Some(-0.6));
        assert!((report.overall_sentiment - 0.1).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_no_articles_is_neutral() {
        let agg = aggregator(vec![], SentimentScorer::new(Arc::new(KeywordClassifier)));
        let report = agg.collect("IBM", 8).await.unwrap();
        assert!(report.articles.is_empty());
        assert_eq!(report.overall_sentiment, 0.0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_surfaced() {
        let agg = NewsAggregator::new(
            Arc::new(FakeProvider {
                articles: vec![],
                fail: true,
            }),
            SentimentScorer::neutral(),
        );
        assert!(matches!(
            agg.collect("IBM", 8).await,
            Err(ForecastError::Provider(_))
        ));
    }
}
