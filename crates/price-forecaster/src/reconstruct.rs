use forecast_core::{ForecastError, ForecastResult};

use crate::features::ScalingTransform;

/// Maps normalised model output back into price units.
pub struct InferenceReconstructor;

impl InferenceReconstructor {
    /// `min + v * (max - min)` on the target column; a constant target yields `min`.
    pub fn reconstruct(normalized: f64, transform: &ScalingTransform) -> ForecastResult<f64> {
        let price = transform.invert_target(normalized);
        if !price.is_finite() {
            return Err(ForecastError::Training(format!(
                "reconstructed price is not finite (normalised value {})",
                normalized
            )));
        }
        Ok(price)
    }
}
