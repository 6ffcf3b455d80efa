use forecast_core::SentimentClassifier;
use std::sync::Arc;

/// FinBERT context limit, applied in characters before tokenisation.
pub const MAX_TEXT_CHARS: usize = 512;

/// Replace punctuation and symbols with spaces and cap the length.
///
/// Word characters (alphanumerics and `_`) and whitespace survive.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .take(MAX_TEXT_CHARS)
        .collect()
}

/// Maps free text to a net tone in [-1, 1].
///
/// Scoring never fails: a missing classifier, a transport error or malformed
/// classifier output all degrade to `0.0`.
#[derive(Clone)]
pub struct SentimentScorer {
    classifier: Option<Arc<dyn SentimentClassifier>>,
}

impl SentimentScorer {
    pub fn new(classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self {
            classifier: Some(classifier),
        }
    }

    /// Scorer with no model behind it; every text is neutral.
    pub fn neutral() -> Self {
        Self { classifier: None }
    }

    pub fn from_option(classifier: Option<Arc<dyn SentimentClassifier>>) -> Self {
        Self { classifier }
    }

    pub fn is_available(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.classifier
            .as_ref()
            .map(|c| c.backend_name())
            .unwrap_or("neutral")
    }

    pub async fn score(&self, text: &str) -> f64 {
        let classifier = match &self.classifier {
            Some(c) => c,
            None => return 0.0,
        };

        let cleaned = clean_text(text);
        if cleaned.trim().is_empty() {
            return 0.0;
        }

        match classifier.classify(&cleaned).await {
            Ok(probabilities) => {
                let score = probabilities.net_score();
                if score.is_finite() {
                    score
                } else {
                    tracing::warn!("Sentiment classifier produced a non-finite score, using neutral");
                    0.0
                }
            }
            Err(e) => {
                tracing::warn!("Sentiment analysis error ({}): {}", classifier.backend_name(), e);
                0.0
            }
        }
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::neutral()
    }
}
