use anyhow::{Context, Result};
use chart_renderer::ChartConfig;
use forecast_orchestrator::{PipelineConfig, MAX_EPOCHS};
use sentiment_scorer::SentimentBackend;
use std::net::SocketAddr;
use std::str::FromStr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_FINBERT_URL: &str = "http://localhost:8001";

/// Server settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub polygon_api_key: String,
    /// Requests per minute; 5 matches the Polygon free tier.
    pub polygon_rate_limit: usize,
    pub bind_addr: SocketAddr,
    pub sentiment_backend: SentimentBackend,
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let polygon_api_key = lookup("POLYGON_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("POLYGON_API_KEY must be set")?;

        let backend_name = lookup("SENTIMENT_BACKEND").unwrap_or_else(|| "finbert".to_string());
        let finbert_url = lookup("ML_SENTIMENT_URL").unwrap_or_else(|| DEFAULT_FINBERT_URL.to_string());
        let sentiment_backend = SentimentBackend::from_name(&backend_name, &finbert_url)
            .map_err(anyhow::Error::new)
            .context("Invalid SENTIMENT_BACKEND")?;

        let defaults = PipelineConfig::default();
        let seed = match lookup("FORECAST_SEED").filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(raw.trim().parse::<u64>().context("Invalid FORECAST_SEED")?),
            None => None,
        };

        let pipeline = PipelineConfig {
            history_days: parse_or(&lookup, "FORECAST_HISTORY_DAYS", defaults.history_days)?,
            epochs: parse_or(&lookup, "FORECAST_EPOCHS", defaults.epochs)?,
            max_articles: parse_or(&lookup, "FORECAST_MAX_ARTICLES", defaults.max_articles)?,
            seed,
            chart: ChartConfig {
                window: parse_or(&lookup, "CHART_WINDOW", defaults.chart.window)?,
                ..defaults.chart
            },
        };
        if pipeline.history_days <= 0 {
            anyhow::bail!("FORECAST_HISTORY_DAYS must be positive");
        }
        if pipeline.epochs == 0 || pipeline.epochs > MAX_EPOCHS {
            anyhow::bail!("FORECAST_EPOCHS must be between 1 and {}", MAX_EPOCHS);
        }

        Ok(Self {
            polygon_api_key,
            polygon_rate_limit: parse_or(&lookup, "POLYGON_RATE_LIMIT", 5)?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR.parse::<SocketAddr>()?)?,
            sentiment_backend,
            pipeline,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", key, raw)),
        _ => Ok(default),
    }
}
