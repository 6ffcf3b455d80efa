pub mod finbert;
pub mod lexicon;
pub mod news;
pub mod scorer;

pub use finbert::FinbertClassifier;
pub use lexicon::LexiconClassifier;
pub use news::{NewsAggregator, NewsReport, DEFAULT_MAX_ARTICLES};
pub use scorer::{clean_text, SentimentScorer, MAX_TEXT_CHARS};

use forecast_core::{ForecastError, SentimentClassifier};
use std::sync::Arc;
use std::time::Duration;

/// Which classifier backs the scorer.
#[derive(Debug, Clone, PartialEq)]
pub enum SentimentBackend {
    /// FinBERT inference service reachable over HTTP.
    Finbert { url: String, timeout: Duration },
    /// Offline financial word lists.
    Lexicon,
    /// No classifier; every text scores neutral.
    Disabled,
}

impl SentimentBackend {
    pub fn from_name(name: &str, finbert_url: &str) -> Result<Self, ForecastError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "finbert" => Ok(SentimentBackend::Finbert {
                url: finbert_url.to_string(),
                timeout: Duration::from_secs(10),
            }),
            "lexicon" => Ok(SentimentBackend::Lexicon),
            "none" | "disabled" => Ok(SentimentBackend::Disabled),
            other => Err(ForecastError::InvalidData(format!(
                "unknown sentiment backend '{}', expected finbert, lexicon or none",
                other
            ))),
        }
    }
}

/// Load the configured classifier once.
///
/// Returns `SentimentUnavailable` if the backend cannot be brought up; callers are
/// expected to fall back to [`SentimentScorer::neutral`].
pub async fn load_classifier(
    backend: &SentimentBackend,
) -> Result<Option<Arc<dyn SentimentClassifier>>, ForecastError> {
    match backend {
        SentimentBackend::Finbert { url, timeout } => {
            let classifier = FinbertClassifier::connect(url.clone(), *timeout).await?;
            Ok(Some(Arc::new(classifier)))
        }
        SentimentBackend::Lexicon => Ok(Some(Arc::new(LexiconClassifier::new()))),
        SentimentBackend::Disabled => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_name() {
        assert_eq!(
            SentimentBackend::from_name("Lexicon", "http://x").unwrap(),
            SentimentBackend::Lexicon
        );
        assert_eq!(
            SentimentBackend::from_name("none", "http://x").unwrap(),
            SentimentBackend::Disabled
        );
        assert!(matches!(
            SentimentBackend::from_name("finbert", "http://x").unwrap(),
            SentimentBackend::Finbert { .. }
        ));
        assert!(SentimentBackend::from_name("gpt", "http://x").is_err());
    }

    #[tokio::test]
    async fn test_load_disabled_backend_has_no_classifier() {
        let classifier = load_classifier(&SentimentBackend::Disabled).await.unwrap();
        assert!(classifier.is_none());
    }
}
