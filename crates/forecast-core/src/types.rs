use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ForecastError;

/// One daily OHLCV session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceRecord {
    fn validate(&self) -> Result<(), ForecastError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ForecastError::InvalidData(format!(
                    "{} on {} must be a non-negative finite number, got {}",
                    name, self.date, value
                )));
            }
        }
        Ok(())
    }
}

/// Ordered daily history for a single ticker.
///
/// Dates are strictly increasing, so there are never duplicate sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: String,
    records: Vec<PriceRecord>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, records: Vec<PriceRecord>) -> Result<Self, ForecastError> {
        let ticker = ticker.into();
        for record in &records {
            record.validate()?;
        }
        if let Some(pair) = records.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(ForecastError::InvalidData(format!(
                "{} history is not strictly increasing: {} followed by {}",
                ticker, pair[0].date, pair[1].date
            )));
        }
        Ok(Self { ticker, records })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&PriceRecord> {
        self.records.last()
    }

    /// Next session's close for row `i`; `None` for the final record.
    pub fn tomorrow_close(&self, i: usize) -> Option<f64> {
        self.records.get(i + 1).map(|r| r.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.close).collect()
    }
}

/// News item exactly as the provider handed it over. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

/// News article after default substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    /// `None` until the article has been scored.
    pub sentiment: Option<f64>,
}

impl NewsArticle {
    /// Text fed to the sentiment classifier.
    pub fn scoring_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}

/// Company name and sector shown next to a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub sector: String,
}

impl CompanyProfile {
    pub fn fallback(ticker: &str) -> Self {
        Self {
            name: ticker.to_string(),
            sector: "Unknown".to_string(),
        }
    }
}

/// Output of a three-class (negative / neutral / positive) text classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl ClassProbabilities {
    /// Validate and renormalise raw classifier output so the three values sum to 1.
    pub fn normalized(negative: f64, neutral: f64, positive: f64) -> Result<Self, ForecastError> {
        let values = [negative, neutral, positive];
        if values.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ForecastError::SentimentUnavailable(format!(
                "classifier returned invalid probabilities {:?}",
                values
            )));
        }
        let total: f64 = values.iter().sum();
        if total <= 0.0 {
            return Err(ForecastError::SentimentUnavailable(
                "classifier probabilities sum to zero".to_string(),
            ));
        }
        Ok(Self {
            negative: negative / total,
            neutral: neutral / total,
            positive: positive / total,
        })
    }

    /// Net tone in [-1, 1]: `p(positive) - p(negative)`.
    pub fn net_score(&self) -> f64 {
        (self.positive - self.negative).clamp(-1.0, 1.0)
    }

    pub fn label(&self) -> &'static str {
        if self.positive >= self.neutral && self.positive > self.negative {
            "positive"
        } else if self.negative >= self.neutral && self.negative > self.positive {
            "negative"
        } else {
            "neutral"
        }
    }
}
