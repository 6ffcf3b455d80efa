use thiserror::Error;

/// Failure taxonomy shared by every stage of the forecast pipeline.
///
/// `SentimentUnavailable` is the only recoverable variant: the scorer absorbs it
/// and degrades to a neutral score. Everything else aborts the request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Insufficient data: need at least {required} usable rows, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Sentiment model unavailable: {0}")]
    SentimentUnavailable(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl ForecastError {
    /// Whether the pipeline is allowed to swallow this error and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ForecastError::SentimentUnavailable(_))
    }
}

pub type ForecastResult<T> = Result<T, ForecastError>;
