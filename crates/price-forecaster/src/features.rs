use forecast_core::{stats, ForecastError, ForecastResult, PriceRecord, PriceSeries};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 6;

/// Usable (labelled) rows needed before a model can be fitted.
pub const MIN_TRAINING_ROWS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureColumn {
    Open,
    High,
    Low,
    Close,
    Volume,
    Sentiment,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; FEATURE_COUNT] = [
        FeatureColumn::Open,
        FeatureColumn::High,
        FeatureColumn::Low,
        FeatureColumn::Close,
        FeatureColumn::Volume,
        FeatureColumn::Sentiment,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureColumn::Open => "open",
            FeatureColumn::High => "high",
            FeatureColumn::Low => "low",
            FeatureColumn::Close => "close",
            FeatureColumn::Volume => "volume",
            FeatureColumn::Sentiment => "sentiment",
        }
    }
}

/// Min-max bounds of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnBounds {
    pub min: f64,
    pub max: f64,
}

impl ColumnBounds {
    /// `None` for an empty column.
    pub fn fit(values: &[f64]) -> Option<Self> {
        stats::min_max(values).map(|(min, max)| Self { min, max })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        self.range() <= 0.0
    }

    /// Constant columns map to 0.0.
    pub fn apply(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            (value - self.min) / self.range()
        }
    }

    /// Constant columns map back to `min`.
    pub fn invert(&self, normalized: f64) -> f64 {
        if self.is_degenerate() {
            self.min
        } else {
            self.min + normalized * self.range()
        }
    }
}

/// Per-column bounds fitted on one request's data, kept so the prediction can
/// be mapped back to a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingTransform {
    features: [ColumnBounds; FEATURE_COUNT],
    target: ColumnBounds,
}

impl ScalingTransform {
    pub fn new(features: [ColumnBounds; FEATURE_COUNT], target: ColumnBounds) -> Self {
        Self { features, target }
    }

    pub fn feature_bounds(&self, column: FeatureColumn) -> ColumnBounds {
        self.features[column.index()]
    }

    pub fn target_bounds(&self) -> ColumnBounds {
        self.target
    }

    pub fn apply_row(&self, row: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in row.iter().enumerate() {
            out[i] = self.features[i].apply(*value);
        }
        out
    }

    pub fn apply_target(&self, price: f64) -> f64 {
        self.target.apply(price)
    }

    pub fn invert_target(&self, normalized: f64) -> f64 {
        self.target.invert(normalized)
    }
}

/// Normalised training data for one request.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// `(n - 1) x FEATURE_COUNT`, columns in [`FeatureColumn::ALL`] order.
    pub matrix: DMatrix<f64>,
    /// Normalised next-session close, row-aligned with `matrix`.
    pub targets: DVector<f64>,
    /// Next-session close before normalisation.
    pub raw_targets: Vec<f64>,
    pub transform: ScalingTransform,
    /// Final session normalised with the fitted transform, except the sentiment
    /// cell which holds the current sentiment as-is. The inference input.
    pub last_row: Vec<f64>,
}

impl FeatureSet {
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }
}

fn raw_row(record: &PriceRecord, sentiment: f64) -> [f64; FEATURE_COUNT] {
    [
        record.open,
        record.high,
        record.low,
        record.close,
        record.volume,
        sentiment,
    ]
}

/// Turns a price series and a sentiment scalar into a supervised dataset.
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Pair every session with the following session's close and normalise.
    ///
    /// The final session has no label; it only contributes `last_row`.
    pub fn build(series: &PriceSeries, sentiment: f64) -> ForecastResult<FeatureSet> {
        if !sentiment.is_finite() {
            return Err(ForecastError::InvalidData(format!(
                "sentiment must be finite, got {}",
                sentiment
            )));
        }

        let records = series.records();
        let usable = records.len().saturating_sub(1);
        if usable < MIN_TRAINING_ROWS {
            return Err(ForecastError::InsufficientData {
                required: MIN_TRAINING_ROWS,
                available: usable,
            });
        }

        let raw_rows: Vec<[f64; FEATURE_COUNT]> =
            records[..usable].iter().map(|r| raw_row(r, sentiment)).collect();
        let raw_targets: Vec<f64> = (0..usable).filter_map(|i| series.tomorrow_close(i)).collect();

        let mut features = [ColumnBounds { min: 0.0, max: 0.0 }; FEATURE_COUNT];
        for column in FeatureColumn::ALL {
            let idx = column.index();
            let column_values: Vec<f64> = raw_rows.iter().map(|row| row[idx]).collect();
            features[idx] = ColumnBounds::fit(&column_values).ok_or(
                ForecastError::InsufficientData {
                    required: MIN_TRAINING_ROWS,
                    available: 0,
                },
            )?;
        }
        let target = ColumnBounds::fit(&raw_targets).ok_or(ForecastError::InsufficientData {
            required: MIN_TRAINING_ROWS,
            available: 0,
        })?;
        let transform = ScalingTransform::new(features, target);

        let normalized: Vec<[f64; FEATURE_COUNT]> = raw_rows.iter().map(|row| transform.apply_row(row)).collect();
        let matrix = DMatrix::from_fn(usable, FEATURE_COUNT, |r, c| normalized[r][c]);
        let targets = DVector::from_iterator(usable, raw_targets.iter().map(|t| transform.apply_target(*t)));

        // The sentiment cell carries the raw scalar; its fitted column is constant.
        let last_row = match records.last() {
            Some(last) => {
                let mut row = transform.apply_row(&raw_row(last, sentiment));
                row[FeatureColumn::Sentiment.index()] = sentiment;
                row.to_vec()
            }
            None => {
                return Err(ForecastError::InsufficientData {
                    required: MIN_TRAINING_ROWS,
                    available: 0,
                })
            }
        };

        Ok(FeatureSet {
            matrix,
            targets,
            raw_targets,
            transform,
            last_row,
        })
    }
}
