use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use forecast_orchestrator::{ForecastOutcome, ForecastOverrides};
use serde::Deserialize;

use crate::request_id::RequestId;
use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    pub ticker: String,
    #[serde(default)]
    pub epochs: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub epochs: Option<usize>,
    pub seed: Option<u64>,
}

pub fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/api/forecast", post(post_forecast))
        .route("/api/forecast/:ticker", get(get_forecast))
}

async fn post_forecast(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ApiResponse<ForecastOutcome>>, AppError> {
    let overrides = ForecastOverrides {
        epochs: request.epochs,
        seed: request.seed,
    };
    run_forecast(&state, &request_id, &request.ticker, overrides).await
}

async fn get_forecast(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(ticker): Path<String>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<ApiResponse<ForecastOutcome>>, AppError> {
    let overrides = ForecastOverrides {
        epochs: query.epochs,
        seed: query.seed,
    };
    run_forecast(&state, &request_id, &ticker, overrides).await
}

async fn run_forecast(
    state: &AppState,
    request_id: &RequestId,
    ticker: &str,
    overrides: ForecastOverrides,
) -> Result<Json<ApiResponse<ForecastOutcome>>, AppError> {
    tracing::info!("[{}] Forecast requested for {}", request_id, ticker);
    let outcome = state
        .pipeline
        .run_recorded(ticker, overrides, &state.latest)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
