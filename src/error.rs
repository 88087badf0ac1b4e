use crate::ai::AiError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Request-level failures. Row-level ingestion rejections are not errors; they
/// are reported in the batch summary instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("malformed export: {0}")]
    Export(String),
    #[error("{0}")]
    NotFound(String),
    #[error("text generation failed: {0}")]
    Generation(String),
    #[error("model output did not match the expected shape: {0}")]
    Parse(String),
    #[error("storage error: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Export(_) => "export",
            Self::NotFound(_) => "not_found",
            Self::Generation(_) => "generation_failure",
            Self::Parse(_) => "parse_failure",
            Self::Storage(_) => "storage",
        }
    }
}

// Database and config code is anyhow-based; anything reaching a flow that way
// is a datastore failure.
impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Storage(value)
    }
}

impl From<AiError> for AppError {
    fn from(value: AiError) -> Self {
        match value {
            error @ AiError::Generation { .. } => Self::Generation(error.to_string()),
            error @ AiError::Parse { .. } => Self::Parse(error.to_string()),
        }
    }
}
