use forecast_core::{ForecastError, ForecastResult};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::network::{mse, Mlp};
use crate::optimizer::DEFAULT_LEARNING_RATE;

pub const DEFAULT_EPOCHS: usize = 50;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_VALIDATION_SPLIT: f64 = 0.2;
pub const DEFAULT_DROPOUT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct ForecasterConfig {
    pub hidden_layers: Vec<usize>,
    pub dropout: f64,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Fraction of trailing rows held out for validation loss.
    pub validation_split: f64,
    /// `None` draws a fresh seed per training run.
    pub seed: Option<u64>,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            dropout: DEFAULT_DROPOUT,
            learning_rate: DEFAULT_LEARNING_RATE,
            batch_size: DEFAULT_BATCH_SIZE,
            validation_split: DEFAULT_VALIDATION_SPLIT,
            seed: None,
        }
    }
}

/// Per-epoch losses on normalised targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub loss: Vec<f64>,
    /// Empty when there were too few rows to hold any out.
    pub val_loss: Vec<f64>,
}

impl TrainingHistory {
    pub fn final_loss(&self) -> Option<f64> {
        self.loss.last().copied()
    }

    pub fn final_val_loss(&self) -> Option<f64> {
        self.val_loss.last().copied()
    }
}

/// A fitted network. Lives for one request only.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    network: Mlp,
    history: TrainingHistory,
    seed: u64,
}

impl TrainedModel {
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Seed that reproduces this model.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn input_size(&self) -> usize {
        self.network.input_size()
    }

    /// Normalised prediction for one feature row.
    pub fn predict(&self, row: &[f64]) -> ForecastResult<f64> {
        if row.len() != self.input_size() {
            return Err(ForecastError::Training(format!(
                "expected a row of {} features, got {}",
                self.input_size(),
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Training("prediction input contains non-finite values".to_string()));
        }

        let input = DMatrix::from_row_slice(1, row.len(), row);
        let output = self.network.predict_batch(&input);
        let value = output[(0, 0)];
        if !value.is_finite() {
            return Err(ForecastError::Training("model produced a non-finite prediction".to_string()));
        }
        Ok(value)
    }
}

/// Index where the trailing validation rows start. Equal to `rows` when nothing is held out.
pub fn validation_split_index(rows: usize, validation_split: f64) -> usize {
    let split_at = (rows as f64 * (1.0 - validation_split)).floor() as usize;
    if split_at == 0 {
        rows
    } else {
        split_at.min(rows)
    }
}

pub struct Forecaster {
    config: ForecasterConfig,
}

impl Forecaster {
    pub fn new(config: ForecasterConfig) -> Self {
        Self { config }
    }

    pub fn with_seed(seed: Option<u64>) -> Self {
        Self::new(ForecasterConfig {
            seed,
            ..ForecasterConfig::default()
        })
    }

    pub fn config(&self) -> &ForecasterConfig {
        &self.config
    }

    /// Fit a fresh network on `x` against `y` for a fixed number of epochs.
    pub fn train(&self, x: &DMatrix<f64>, y: &DVector<f64>, epochs: usize) -> ForecastResult<TrainedModel> {
        if x.nrows() == 0 || x.ncols() == 0 || y.is_empty() {
            return Err(ForecastError::Training("training set is empty".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(ForecastError::Training(format!(
                "feature rows ({}) and targets ({}) differ in length",
                x.nrows(),
                y.len()
            )));
        }
        if epochs == 0 {
            return Err(ForecastError::Training("epochs must be at least 1".to_string()));
        }
        if self.config.batch_size == 0 {
            return Err(ForecastError::Training("batch size must be at least 1".to_string()));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ForecastError::Training("training data contains non-finite values".to_string()));
        }

        let seed = self.config.seed.unwrap_or_else(rand::random::<u64>);
        if self.config.seed.is_none() {
            tracing::info!("No seed supplied, drew seed {}", seed);
        }
        let mut rng = StdRng::seed_from_u64(seed);

        let mut sizes = Vec::with_capacity(self.config.hidden_layers.len() + 2);
        sizes.push(x.ncols());
        sizes.extend_from_slice(&self.config.hidden_layers);
        sizes.push(1);
        let mut network = Mlp::new(&sizes, self.config.dropout, &mut rng);
        let mut optimizers = network.optimizers(self.config.learning_rate);

        let rows = x.nrows();
        let split_at = validation_split_index(rows, self.config.validation_split);
        let validation = if split_at < rows {
            let val_x = x.rows(split_at, rows - split_at).into_owned();
            let val_y = DMatrix::from_column_slice(rows - split_at, 1, &y.as_slice()[split_at..]);
            Some((val_x, val_y))
        } else {
            None
        };

        tracing::info!(
            "Training forecaster: {} rows ({} train, {} validation), {} epochs, seed {}",
            rows,
            split_at,
            rows - split_at,
            epochs,
            seed
        );

        let mut history = TrainingHistory::default();
        let mut indices: Vec<usize> = (0..split_at).collect();

        for epoch in 0..epochs {
            indices.shuffle(&mut rng);
            let mut weighted_loss = 0.0;

            for batch in indices.chunks(self.config.batch_size) {
                let batch_x = DMatrix::from_fn(batch.len(), x.ncols(), |r, c| x[(batch[r], c)]);
                let batch_y = DMatrix::from_fn(batch.len(), 1, |r, _| y[batch[r]]);

                let (output, caches) = network.forward_train(&batch_x, &mut rng);
                let diff = &output - &batch_y;
                weighted_loss += diff.norm_squared();

                let grad_output = diff * (2.0 / batch.len() as f64);
                let gradients = network.backward(&caches, &grad_output);
                network.apply_gradients(&gradients, &mut optimizers);
            }

            let loss = weighted_loss / split_at as f64;
            if !loss.is_finite() {
                return Err(ForecastError::Training(format!(
                    "loss became non-finite at epoch {}",
                    epoch + 1
                )));
            }
            history.loss.push(loss);

            if let Some((val_x, val_y)) = &validation {
                let val_loss = mse(&network.predict_batch(val_x), val_y);
                history.val_loss.push(val_loss);
                tracing::debug!("epoch {}/{}: loss {:.6}, val_loss {:.6}", epoch + 1, epochs, loss, val_loss);
            } else {
                tracing::debug!("epoch {}/{}: loss {:.6}", epoch + 1, epochs, loss);
            }
        }

        tracing::info!(
            "Training complete: final loss {:.6}, final val_loss {}",
            history.final_loss().unwrap_or_default(),
            history
                .final_val_loss()
                .map(|v| format!("{:.6}", v))
                .unwrap_or_else(|| "n/a".to_string())
        );

        Ok(TrainedModel {
            network,
            history,
            seed,
        })
    }

    pub fn predict(&self, model: &TrainedModel, row: &[f64]) -> ForecastResult<f64> {
        model.predict(row)
    }
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new(ForecasterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dataset(rows: usize) -> (DMatrix<f64>, DVector<f64>) {
        let x = DMatrix::from_fn(rows, 6, |r, c| ((r + c) % rows) as f64 / rows as f64);
        let y = DVector::from_fn(rows, |r, _| x.row(r).sum() / 6.0);
        (x, y)
    }

    #[test]
    fn test_split_index() {
        assert_eq!(validation_split_index(10, 0.2), 8);
        assert_eq!(validation_split_index(9, 0.2), 7);
        assert_eq!(validation_split_index(2, 0.2), 1);
        assert_eq!(validation_split_index(1, 0.2), 1);
        assert_eq!(validation_split_index(5, 0.0), 5);
    }

    #[test]
    fn test_same_seed_same_prediction() {
        let (x, y) = linear_dataset(40);
        let forecaster = Forecaster::with_seed(Some(42));
        let a = forecaster.train(&x, &y, 5).unwrap();
        let b = forecaster.train(&x, &y, 5).unwrap();

        let row = [0.5; 6];
        assert_eq!(a.predict(&row).unwrap(), b.predict(&row).unwrap());
        assert_eq!(a.history(), b.history());
        assert_eq!(a.seed(), 42);
    }

    #[test]
    fn test_unseeded_run_reports_its_seed() {
        let (x, y) = linear_dataset(12);
        let first = Forecaster::with_seed(None).train(&x, &y, 2).unwrap();
        let replay = Forecaster::with_seed(Some(first.seed())).train(&x, &y, 2).unwrap();

        let row = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        assert_eq!(first.predict(&row).unwrap(), replay.predict(&row).unwrap());
    }

    #[test]
    fn test_history_lengths() {
        let (x, y) = linear_dataset(20);
        let model = Forecaster::with_seed(Some(1)).train(&x, &y, 7).unwrap();
        assert_eq!(model.history().loss.len(), 7);
        assert_eq!(model.history().val_loss.len(), 7);
    }

    #[test]
    fn test_single_row_trains_without_validation() {
        let x = DMatrix::from_element(1, 6, 0.5);
        let y = DVector::from_element(1, 0.5);
        let model = Forecaster::with_seed(Some(3)).train(&x, &y, 3).unwrap();
        assert_eq!(model.history().loss.len(), 3);
        assert!(model.history().val_loss.is_empty());
    }

    #[test]
    fn test_loss_decreases_on_learnable_target() {
        let (x, y) = linear_dataset(64);
        let model = Forecaster::with_seed(Some(9)).train(&x, &y, 60).unwrap();
        let loss = &model.history().loss;
        assert!(loss[loss.len() - 1] < loss[0]);
    }

    #[test]
    fn test_training_errors() {
        let forecaster = Forecaster::with_seed(Some(0));
        let (x, y) = linear_dataset(10);

        let empty_x = DMatrix::<f64>::zeros(0, 6);
        let empty_y = DVector::<f64>::zeros(0);
        assert!(matches!(forecaster.train(&empty_x, &empty_y, 5), Err(ForecastError::Training(_))));

        let short_y = DVector::from_element(9, 0.5);
        assert!(matches!(forecaster.train(&x, &short_y, 5), Err(ForecastError::Training(_))));

        assert!(matches!(forecaster.train(&x, &y, 0), Err(ForecastError::Training(_))));

        let mut bad_x = x.clone();
        bad_x[(3, 2)] = f64::NAN;
        assert!(matches!(forecaster.train(&bad_x, &y, 5), Err(ForecastError::Training(_))));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let (x, y) = linear_dataset(10);
        let forecaster = Forecaster::with_seed(Some(4));
        let model = forecaster.train(&x, &y, 1).unwrap();
        assert!(matches!(forecaster.predict(&model, &[0.1; 5]), Err(ForecastError::Training(_))));
        assert!(matches!(
            forecaster.predict(&model, &[f64::INFINITY; 6]),
            Err(ForecastError::Training(_))
        ));
    }
}
