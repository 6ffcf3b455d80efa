pub mod features;
pub mod network;
pub mod optimizer;
pub mod reconstruct;
pub mod trainer;

pub use features::{ColumnBounds, FeatureBuilder, FeatureColumn, FeatureSet, ScalingTransform, FEATURE_COUNT};
pub use reconstruct::InferenceReconstructor;
pub use trainer::{Forecaster, ForecasterConfig, TrainedModel, TrainingHistory, DEFAULT_EPOCHS};

use forecast_core::{ForecastResult, PriceSeries};
use serde::{Deserialize, Serialize};

/// Next-session close predicted from a series and its sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointForecast {
    pub predicted_price: f64,
    pub normalized_prediction: f64,
    pub data_points: usize,
    pub seed: u64,
    pub history: TrainingHistory,
}

/// Build features, train a fresh model, and predict the session after the last record.
///
/// CPU bound; async callers should run it on a blocking thread.
pub fn forecast_next_close(
    series: &PriceSeries,
    sentiment: f64,
    epochs: usize,
    config: ForecasterConfig,
) -> ForecastResult<PointForecast> {
    let features = FeatureBuilder::build(series, sentiment)?;
    let forecaster = Forecaster::new(config);
    let model = forecaster.train(&features.matrix, &features.targets, epochs)?;
    let normalized = forecaster.predict(&model, &features.last_row)?;
    let predicted_price = InferenceReconstructor::reconstruct(normalized, &features.transform)?;

    Ok(PointForecast {
        predicted_price,
        normalized_prediction: normalized,
        data_points: series.len(),
        seed: model.seed(),
        history: model.history().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use forecast_core::{ForecastError, PriceRecord};

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let records = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceRecord {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1_000_000.0,
            })
            .collect();
        PriceSeries::new("SPY", records).unwrap()
    }

    fn seeded(seed: u64) -> ForecasterConfig {
        ForecasterConfig {
            seed: Some(seed),
            ..ForecasterConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_rising_closes() {
        let closes: Vec<f64> = (100..110).map(|c| c as f64).collect();
        let forecast = forecast_next_close(&series(&closes), 0.0, 20, seeded(17)).unwrap();

        assert!(forecast.predicted_price.is_finite());
        assert_eq!(forecast.data_points, 10);
        assert_eq!(forecast.seed, 17);
        assert_eq!(forecast.history.loss.len(), 20);
    }

    #[test]
    fn test_same_seed_same_forecast() {
        let closes = [50.0, 51.5, 49.0, 53.0, 55.5, 54.0, 56.0, 58.5];
        let a = forecast_next_close(&series(&closes), 0.25, 10, seeded(99)).unwrap();
        let b = forecast_next_close(&series(&closes), 0.25, 10, seeded(99)).unwrap();
        assert_eq!(a.predicted_price, b.predicted_price);
    }

    #[test]
    fn test_sentiment_moves_forecast() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.2).collect();
        let bullish = forecast_next_close(&series(&closes), 0.9, 50, seeded(7)).unwrap();
        let bearish = forecast_next_close(&series(&closes), -0.9, 50, seeded(7)).unwrap();
        assert!(bullish.predicted_price.is_finite() && bearish.predicted_price.is_finite());
        assert_ne!(bullish.predicted_price, bearish.predicted_price);
    }

    #[test]
    fn test_single_record_is_insufficient() {
        let result = forecast_next_close(&series(&[100.0]), 0.0, 5, seeded(1));
        assert!(matches!(result, Err(ForecastError::InsufficientData { .. })));
    }
}
