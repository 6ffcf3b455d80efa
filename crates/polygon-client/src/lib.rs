use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use forecast_core::{CompanyProfile, ForecastError, MarketDataProvider, PriceRecord, RawArticle};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";
const HOMEPAGE_URL: &str = "https://polygon.io";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            let oldest = match ts.front() {
                Some(&oldest) if ts.len() >= self.max_requests => oldest,
                _ => {
                    ts.push_back(now);
                    return;
                }
            };

            // Wait until the oldest request falls out of the window
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    /// `requests_per_minute` of 5 matches the Polygon free tier.
    pub fn with_rate_limit(api_key: String, requests_per_minute: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::new(requests_per_minute, Duration::from_secs(60)),
        }
    }

    /// Point the client at another host (mock servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a rate-limited request. Failures are returned as-is; there is no retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ForecastError> {
        self.rate_limiter.acquire().await;
        let response = builder
            .send()
            .await
            .map_err(|e| ForecastError::Provider(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Polygon rate limit hit");
            return Err(ForecastError::Provider("Rate limited by Polygon".to_string()));
        }

        Ok(response)
    }

    async fn error_for_status(response: reqwest::Response, what: &str) -> ForecastError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            ForecastError::DataUnavailable(format!("{} not found", what))
        } else {
            ForecastError::Provider(format!("{} HTTP {}: {}", what, status, body))
        }
    }

    /// Daily aggregates (bars) for a symbol, oldest first.
    pub async fn get_daily_aggregates(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceRecord>, ForecastError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, &format!("{} aggregates", symbol)).await);
        }

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| ForecastError::Provider(e.to_string()))?;

        let records = aggregates_to_records(agg_response.results);
        if records.is_empty() {
            return Err(ForecastError::DataUnavailable(format!(
                "No price data found for ticker {}",
                symbol
            )));
        }
        Ok(records)
    }

    /// Recent news for a symbol, newest first as Polygon returns it.
    pub async fn get_news(&self, symbol: &str, limit: usize) -> Result<Vec<RawArticle>, ForecastError> {
        let url = format!("{}/v2/reference/news", self.base_url);

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.clone()),
                ("ticker", symbol.to_string()),
                ("limit", limit.to_string()),
                ("order", "desc".to_string()),
                ("sort", "published_utc".to_string()),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, &format!("{} news", symbol)).await);
        }

        let news_response: NewsResponse = response
            .json()
            .await
            .map_err(|e| ForecastError::Provider(e.to_string()))?;

        Ok(parse_news_results(news_response.results))
    }

    /// Get ticker details
    pub async fn get_ticker_details(&self, symbol: &str) -> Result<TickerDetails, ForecastError> {
        let url = format!("{}/v3/reference/tickers/{}", self.base_url, symbol);

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, &format!("{} ticker details", symbol)).await);
        }

        let details_response: TickerDetailsResponse = response
            .json()
            .await
            .map_err(|e| ForecastError::Provider(e.to_string()))?;

        Ok(details_response.results)
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn daily_history(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceRecord>, ForecastError> {
        self.get_daily_aggregates(ticker, from, to).await
    }

    async fn recent_news(&self, ticker: &str, limit: usize) -> Result<Vec<RawArticle>, ForecastError> {
        self.get_news(ticker, limit).await
    }

    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, ForecastError> {
        let details = self.get_ticker_details(ticker).await?;
        Ok(CompanyProfile {
            name: details.name,
            sector: details.sic_description.unwrap_or_else(|| "Unknown".to_string()),
        })
    }

    fn homepage_url(&self, ticker: &str) -> String {
        format!("{}/quote/{}", HOMEPAGE_URL, ticker)
    }

    fn display_name(&self) -> &'static str {
        "Polygon.io"
    }
}

fn aggregates_to_records(results: Vec<AggregateResult>) -> Vec<PriceRecord> {
    results
        .into_iter()
        .filter_map(|r| {
            let date = DateTime::from_timestamp_millis(r.t)?.date_naive();
            Some(PriceRecord {
                date,
                open: r.o,
                high: r.h,
                low: r.l,
                close: r.c,
                volume: r.v,
            })
        })
        .collect()
}

/// Read each news field on its own so a mistyped field only loses that field.
fn parse_news_results(results: Vec<serde_json::Value>) -> Vec<RawArticle> {
    results
        .iter()
        .map(|item| RawArticle {
            title: text_field(item, "title"),
            summary: text_field(item, "description"),
            url: text_field(item, "article_url"),
            published_at: text_field(item, "published_utc").and_then(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| tracing::warn!("Unparseable news timestamp '{}': {}", s, e))
                    .ok()
            }),
            source: item
                .get("publisher")
                .and_then(|p| text_field(p, "name")),
        })
        .collect()
}

/// Non-blank string at `key`; anything else (missing, wrong type, blank) is `None`.
fn text_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    v: f64, // volume
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: TickerDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerDetails {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub sic_description: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub homepage_url: Option<String>,
}
