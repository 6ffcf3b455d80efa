pub mod config;
mod forecast_routes;
mod news_routes;
mod request_id;
mod status_routes;


use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::{DateTime, Utc};
use forecast_core::{ForecastError, MarketDataProvider};
use forecast_orchestrator::{ForecastPipeline, LatestResultSlot};
use polygon_client::PolygonClient;
use sentiment_scorer::{load_classifier, NewsAggregator, SentimentScorer};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::ServerConfig;

use forecast_routes::forecast_routes;
use news_routes::news_routes;
use request_id::{request_id_middleware, request_span};
use status_routes::status_routes;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ForecastPipeline>,
    pub latest: Arc<LatestResultSlot>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: ForecastPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            latest: Arc::new(LatestResultSlot::new()),
            started_at: Utc::now(),
        }
    }
}

/// JSON envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error carrying the HTTP status to answer with.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<ForecastError> for AppError {
    fn from(error: ForecastError) -> Self {
        let status = match &error {
            ForecastError::DataUnavailable(_) => StatusCode::NOT_FOUND,
            ForecastError::InsufficientData { .. } | ForecastError::InvalidData(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ForecastError::Provider(_) => StatusCode::BAD_GATEWAY,
            ForecastError::SentimentUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ForecastError::Training(_) | ForecastError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::with_status(status, anyhow::Error::new(error))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed ({}): {:#}", self.status, self.error);
        } else {
            tracing::warn!("Request rejected ({}): {:#}", self.status, self.error);
        }
        let body = ApiResponse::<()>::error(self.error.to_string());
        (self.status, Json(body)).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(forecast_routes())
        .merge(news_routes())
        .merge(status_routes())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `RUST_LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Bring up the classifier once; a backend that fails to load degrades to neutral scoring.
async fn build_scorer(config: &ServerConfig) -> SentimentScorer {
    match load_classifier(&config.sentiment_backend).await {
        Ok(classifier) => {
            let scorer = SentimentScorer::from_option(classifier);
            tracing::info!("Sentiment backend: {}", scorer.backend_name());
            scorer
        }
        Err(e) => {
            tracing::warn!("Could not load sentiment model, news will score neutral: {}", e);
            SentimentScorer::neutral()
        }
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        "Starting forecast server (history {} days, {} epochs, {} articles max)",
        config.pipeline.history_days,
        config.pipeline.epochs,
        config.pipeline.max_articles
    );

    let provider: Arc<dyn MarketDataProvider> = Arc::new(PolygonClient::with_rate_limit(
        config.polygon_api_key.clone(),
        config.polygon_rate_limit,
    ));
    let scorer = build_scorer(&config).await;
    let news = NewsAggregator::new(provider.clone(), scorer);
    let pipeline = ForecastPipeline::new(provider, news, config.pipeline.clone());

    let app = build_router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
