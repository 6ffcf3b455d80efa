use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use forecast_orchestrator::ForecastStatus;
use serde::Serialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub sentiment_backend: &'static str,
    pub latest_status: ForecastStatus,
    pub latest_ticker: Option<String>,
    pub latest_error: Option<String>,
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub uptime_seconds: i64,
}

pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chart/latest", get(latest_chart))
        .route("/api/status", get(status))
        .route("/health", get(health))
}

async fn latest_chart(State(state): State<AppState>) -> Result<Json<ApiResponse<ChartResponse>>, AppError> {
    let image = state.latest.latest_chart().await.ok_or_else(|| {
        AppError::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!("No chart available"))
    })?;
    Ok(Json(ApiResponse::success(ChartResponse { image })))
}

async fn status(State(state): State<AppState>) -> Json<ApiResponse<StatusResponse>> {
    let latest = state.latest.snapshot().await;
    Json(ApiResponse::success(StatusResponse {
        status: "online",
        sentiment_backend: state.pipeline.sentiment_backend(),
        latest_status: latest.status,
        latest_ticker: latest.ticker,
        latest_error: latest.error,
        latest_timestamp: latest.timestamp,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
    }))
}

async fn health() -> &'static str {
    "OK"
}
