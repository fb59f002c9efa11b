use axum::http::StatusCode;
use thiserror::Error;

/// Failures surfaced to callers of the translation service.
///
/// Library internals use `anyhow`; this enum is the boundary type that the
/// HTTP layer and the queue need to tell transient upstream trouble apart
/// from bad input.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("translator not found: {0}")]
    UnknownTranslator(String),

    #[error("API quota exceeded: {0}")]
    Quota(String),

    #[error("invalid API key configuration: {0}")]
    Auth(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::UnknownTranslator(_) => StatusCode::NOT_FOUND,
            ServiceError::Quota(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Auth(_)
            | ServiceError::Upstream(_)
            | ServiceError::Timeout(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to HTTP clients. Upstream details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::InvalidRequest(message) => message.clone(),
            ServiceError::UnknownTranslator(id) => format!("Translator not found: {}", id),
            ServiceError::Quota(_) => "API quota exceeded. Please try again later.".to_string(),
            ServiceError::Auth(_) => "Invalid API key configuration".to_string(),
            ServiceError::Timeout(_) => "Translation timed out. Please try again.".to_string(),
            ServiceError::Upstream(_) | ServiceError::Internal(_) => {
                "Translation failed. Please try again.".to_string()
            }
        }
    }

    /// Worth another attempt from the queue. Rate limits are already retried
    /// inside the provider.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Upstream(_) | ServiceError::Timeout(_))
    }

    /// Classify an upstream failure message.
    pub fn from_upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("quota")
            || lower.contains("resource_exhausted")
            || lower.contains("rate limit")
            || lower.contains("too many requests")
        {
            return ServiceError::Quota(message);
        }
        if lower.contains("api key")
            || lower.contains("api_key_invalid")
            || lower.contains("permission_denied")
            || lower.contains("unauthenticated")
        {
            return ServiceError::Auth(message);
        }
        ServiceError::Upstream(message)
    }
}
