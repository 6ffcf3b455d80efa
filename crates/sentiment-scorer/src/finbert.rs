use async_trait::async_trait;
use forecast_core::{ClassProbabilities, ForecastError, SentimentClassifier};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentPrediction {
    pub label: String,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResponse {
    pub predictions: Vec<SentimentPrediction>,
    #[serde(default)]
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
struct SentimentRequest<'a> {
    texts: Vec<&'a str>,
    symbol: Option<String>,
    use_cache: bool,
}

/// HTTP client for a FinBERT (ProsusAI/finbert) inference service.
#[derive(Clone)]
pub struct FinbertClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl FinbertClassifier {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ForecastError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForecastError::SentimentUnavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the client and make sure the service answers before handing it out.
    pub async fn connect(base_url: String, timeout: Duration) -> Result<Self, ForecastError> {
        let classifier = Self::new(base_url, timeout)?;
        tracing::info!("Loading FinBERT sentiment model from {}", classifier.base_url);
        if !classifier.health().await? {
            return Err(ForecastError::SentimentUnavailable(format!(
                "FinBERT service at {} reported unhealthy",
                classifier.base_url
            )));
        }
        tracing::info!("FinBERT model ready");
        Ok(classifier)
    }

    /// Predict sentiment for text(s)
    pub async fn predict(&self, texts: &[&str]) -> Result<SentimentResponse, ForecastError> {
        let request = SentimentRequest {
            texts: texts.to_vec(),
            symbol: None,
            use_cache: true,
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ForecastError::SentimentUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ForecastError::SentimentUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        response
            .json::<SentimentResponse>()
            .await
            .map_err(|e| ForecastError::SentimentUnavailable(format!("Invalid response: {e}")))
    }

    /// Check service health
    pub async fn health(&self) -> Result<bool, ForecastError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| ForecastError::SentimentUnavailable(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

fn first_prediction(response: SentimentResponse) -> Result<ClassProbabilities, ForecastError> {
    let prediction = response.predictions.into_iter().next().ok_or_else(|| {
        ForecastError::SentimentUnavailable("FinBERT returned no predictions".to_string())
    })?;
    ClassProbabilities::normalized(prediction.negative, prediction.neutral, prediction.positive)
}

#[async_trait]
impl SentimentClassifier for FinbertClassifier {
    async fn classify(&self, text: &str) -> Result<ClassProbabilities, ForecastError> {
        let response = self.predict(&[text]).await?;
        first_prediction(response)
    }

    fn backend_name(&self) -> &'static str {
        "finbert"
    }
}
