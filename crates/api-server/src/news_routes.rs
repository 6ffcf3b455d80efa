use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use forecast_orchestrator::NewsSummary;
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct NewsRequest {
    pub ticker: String,
}

pub fn news_routes() -> Router<AppState> {
    Router::new()
        .route("/api/news", post(post_news))
        .route("/api/news/:ticker", get(get_news))
}

async fn post_news(
    State(state): State<AppState>,
    Json(request): Json<NewsRequest>,
) -> Result<Json<ApiResponse<NewsSummary>>, AppError> {
    let summary = state.pipeline.news(&request.ticker).await?;
    Ok(Json(ApiResponse::success(summary)))
}

async fn get_news(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<ApiResponse<NewsSummary>>, AppError> {
    let summary = state.pipeline.news(&ticker).await?;
    Ok(Json(ApiResponse::success(summary)))
}
