#[cfg(test)]
mod tests {
    use super::super::*;
    use async_trait::async_trait;
    use chart_renderer::ChartConfig;
    use chrono::{Duration, NaiveDate};
    use forecast_core::{
        ClassProbabilities, CompanyProfile, ForecastError, MarketDataProvider, PriceRecord, RawArticle,
        SentimentClassifier,
    };
    use sentiment_scorer::{NewsAggregator, SentimentScorer};
    use std::sync::Arc;

    struct FakeProvider {
        closes: Vec<f64>,
        news: Option<Vec<RawArticle>>,
        profile: Option<CompanyProfile>,
    }

    impl FakeProvider {
        fn with_closes(closes: Vec<f64>) -> Self {
            Self {
                closes,
                news: Some(vec![]),
                profile: Some(CompanyProfile {
                    name: "Acme Corp".to_string(),
                    sector: "Widgets".to_string(),
                }),
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for FakeProvider {
        async fn daily_history(
            &self,
            _ticker: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Vec<PriceRecord>, ForecastError> {
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            Ok(self
                .closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PriceRecord {
                    date: start + Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 5_000.0 + i as f64,
                })
                .collect())
        }

        async fn recent_news(&self, _ticker: &str, limit: usize) -> Result<Vec<RawArticle>, ForecastError> {
            match &self.news {
                Some(articles) => Ok(articles.iter().take(limit).cloned().collect()),
                None => Err(ForecastError::Provider("news endpoint returned 500".to_string())),
            }
        }

        async fn company_profile(&self, _ticker: &str) -> Result<CompanyProfile, ForecastError> {
            self.profile
                .clone()
                .ok_or_else(|| ForecastError::DataUnavailable("no ticker details".to_string()))
        }

        fn homepage_url(&self, ticker: &str) -> String {
            format!("https://example.test/{}", ticker)
        }

        fn display_name(&self) -> &'static str {
            "Fake"
        }
    }

    struct BullishClassifier;

    #[async_trait]
    impl SentimentClassifier for BullishClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassProbabilities, ForecastError> {
            ClassProbabilities::normalized(0.1, 0.3, 0.6)
        }

        fn backend_name(&self) -> &'static str {
            "bullish"
        }
    }

    struct BearishClassifier;

    #[async_trait]
    impl SentimentClassifier for BearishClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassProbabilities, ForecastError> {
            ClassProbabilities::normalized(0.7, 0.2, 0.1)
        }

        fn backend_name(&self) -> &'static str {
            "bearish"
        }
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn pipeline_with(provider: FakeProvider, scorer: SentimentScorer) -> ForecastPipeline {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(provider);
        let news = NewsAggregator::new(provider.clone(), scorer);
        ForecastPipeline::new(
            provider,
            news,
            PipelineConfig {
                epochs: 3,
                seed: Some(7),
                chart: ChartConfig {
                    width: 240,
                    height: 160,
                    window: 100,
                },
                ..PipelineConfig::default()
            },
        )
    }

    fn pipeline(provider: FakeProvider) -> ForecastPipeline {
        pipeline_with(provider, SentimentScorer::neutral())
    }

    #[tokio::test]
    async fn test_forecast_end_to_end() {
        let p = pipeline(FakeProvider::with_closes(rising(10)));
        let outcome = p.run("acme", ForecastOverrides::default()).await.unwrap();

        assert_eq!(outcome.ticker, "ACME");
        assert_eq!(outcome.company_name, "Acme Corp");
        assert_eq!(outcome.last_price, 109.0);
        assert_eq!(outcome.last_date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(outcome.predicted_date, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert!(outcome.predicted_price.is_finite());
        assert!((outcome.change - (outcome.predicted_price - 109.0)).abs() < 1e-9);
        assert_eq!(outcome.news_sentiment, 0.0);
        assert_eq!(outcome.epochs, 3);
        assert_eq!(outcome.seed, 7);
        assert_eq!(outcome.data_points, 10);
        assert!(outcome.training.final_loss.is_some());
        assert!(outcome.chart.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_overrides_take_precedence() {
        let p = pipeline(FakeProvider::with_closes(rising(12)));
        let overrides = ForecastOverrides {
            epochs: Some(2),
            seed: Some(1234),
        };
        let outcome = p.run("ACME", overrides).await.unwrap();
        assert_eq!(outcome.epochs, 2);
        assert_eq!(outcome.seed, 1234);
    }

    #[tokio::test]
    async fn test_same_seed_reproduces_forecast() {
        let p = pipeline(FakeProvider::with_closes(vec![10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0]));
        let a = p.run("ACME", ForecastOverrides::default()).await.unwrap();
        let b = p.run("ACME", ForecastOverrides::default()).await.unwrap();
        assert_eq!(a.predicted_price, b.predicted_price);
    }

    #[tokio::test]
    async fn test_news_sentiment_feeds_forecast() {
        let mut provider = FakeProvider::with_closes(rising(10));
        provider.news = Some(vec![RawArticle::default(), RawArticle::default()]);
        let p = pipeline_with(provider, SentimentScorer::new(Arc::new(BullishClassifier)));

        let outcome = p.run("ACME", ForecastOverrides::default()).await.unwrap();
        assert_eq!(outcome.news_articles, 2);
        assert!((outcome.news_sentiment - 0.5).abs() < 1e-12);
        assert_eq!(p.sentiment_backend(), "bullish");

        let mut provider = FakeProvider::with_closes(rising(10));
        provider.news = Some(vec![RawArticle::default(), RawArticle::default()]);
        let bearish = pipeline_with(provider, SentimentScorer::new(Arc::new(BearishClassifier)))
            .run("ACME", ForecastOverrides::default())
            .await
            .unwrap();
        assert!((bearish.news_sentiment + 0.6).abs() < 1e-12);
        assert_eq!(bearish.seed, outcome.seed);
        assert_ne!(bearish.predicted_price, outcome.predicted_price);
    }

    #[tokio::test]
    async fn test_news_failure_degrades_to_neutral() {
        let mut provider = FakeProvider::with_closes(rising(10));
        provider.news = None;
        let p = pipeline_with(provider, SentimentScorer::new(Arc::new(BullishClassifier)));

        let outcome = p.run("ACME", ForecastOverrides::default()).await.unwrap();
        assert_eq!(outcome.news_articles, 0);
        assert_eq!(outcome.news_sentiment, 0.0);
    }

    #[tokio::test]
    async fn test_profile_failure_uses_fallback() {
        let mut provider = FakeProvider::with_closes(rising(10));
        provider.profile = None;
        let outcome = pipeline(provider).run("XYZ", ForecastOverrides::default()).await.unwrap();
        assert_eq!(outcome.company_name, "XYZ");
        assert_eq!(outcome.sector, "Unknown");
    }

    #[tokio::test]
    async fn test_empty_history_is_data_unavailable() {
        let p = pipeline(FakeProvider::with_closes(vec![]));
        assert!(matches!(
            p.run("ACME", ForecastOverrides::default()).await,
            Err(ForecastError::DataUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_single_record_is_insufficient() {
        let p = pipeline(FakeProvider::with_closes(vec![100.0]));
        assert!(matches!(
            p.run("ACME", ForecastOverrides::default()).await,
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let p = pipeline(FakeProvider::with_closes(rising(10)));
        assert!(matches!(
            p.run("   ", ForecastOverrides::default()).await,
            Err(ForecastError::InvalidData(_))
        ));
        let zero_epochs = ForecastOverrides {
            epochs: Some(0),
            seed: None,
        };
        assert!(matches!(p.run("ACME", zero_epochs).await, Err(ForecastError::InvalidData(_))));
        assert!(normalize_ticker("brk.b").is_ok());
        assert!(normalize_ticker("AA PL").is_err());
    }

    #[tokio::test]
    async fn test_slot_is_last_writer_wins() {
        let slot = LatestResultSlot::new();
        assert_eq!(slot.snapshot().await.status, ForecastStatus::Idle);
        assert!(slot.latest_chart().await.is_none());

        let good = pipeline(FakeProvider::with_closes(rising(10)));
        good.run_recorded("AAA", ForecastOverrides::default(), &slot).await.unwrap();
        good.run_recorded("BBB", ForecastOverrides::default(), &slot).await.unwrap();

        let snapshot = slot.snapshot().await;
        assert_eq!(snapshot.status, ForecastStatus::Success);
        assert_eq!(snapshot.ticker.as_deref(), Some("BBB"));
        assert!(snapshot.timestamp.is_some());
        assert!(slot.latest_chart().await.is_some());

        let bad = pipeline(FakeProvider::with_closes(vec![1.0]));
        assert!(bad.run_recorded("CCC", ForecastOverrides::default(), &slot).await.is_err());

        let snapshot = slot.snapshot().await;
        assert_eq!(snapshot.status, ForecastStatus::Error);
        assert_eq!(snapshot.ticker.as_deref(), Some("CCC"));
        assert!(snapshot.error.is_some());
        assert!(slot.latest_chart().await.is_none());
    }

    #[tokio::test]
    async fn test_news_summary() {
        let mut provider = FakeProvider::with_closes(rising(3));
        provider.news = Some(vec![RawArticle {
            title: Some("Acme beats".to_string()),
            ..RawArticle::default()
        }]);
        let p = pipeline_with(provider, SentimentScorer::new(Arc::new(BullishClassifier)));

        let summary = p.news("acme").await.unwrap();
        assert_eq!(summary.ticker, "ACME");
        assert_eq!(summary.company_name, "Acme Corp");
        assert_eq!(summary.news.len(), 1);
        assert_eq!(summary.news[0].summary, "Financial news summary not available");
        assert!((summary.overall_sentiment - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_news_endpoint_surfaces_provider_error() {
        let mut provider = FakeProvider::with_closes(rising(3));
        provider.news = None;
        assert!(matches!(
            pipeline(provider).news("ACME").await,
            Err(ForecastError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_outcome_serializes() {
        let outcome = pipeline(FakeProvider::with_closes(rising(6)))
            .run("ACME", ForecastOverrides::default())
            .await
            .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["ticker"], "ACME");
        assert_eq!(json["predicted_date"], "2024-01-07");
        assert!(json["training"]["final_loss"].is_number());
    }
}
