//! Error types for the Helix domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for Helix operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// How the retry layer must treat a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend rejected the request itself. Retrying the same request
    /// against the same backend cannot succeed.
    Permanent,
    /// Timeouts, overload, server faults and connectivity problems.
    Retryable,
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Content rejected by provider: {0}")]
    ContentRejected(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Classify this failure for the retry layer.
    ///
    /// Depends only on the variant (and, for `ApiError`, the status code),
    /// never on message text.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest(_)
            | Self::ContentRejected(_)
            | Self::AuthenticationFailed(_)
            | Self::ModelNotFound(_) => FailureKind::Permanent,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => {
                FailureKind::Retryable
            }
            Self::ApiError { status_code, .. } => match status_code {
                408 | 429 => FailureKind::Retryable,
                400..=499 => FailureKind::Permanent,
                _ => FailureKind::Retryable,
            },
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind() == FailureKind::Permanent
    }

    /// Map an HTTP error status and body to the matching variant.
    pub fn from_status(status_code: u16, body: String) -> Self {
        match status_code {
            400 | 413 | 422 => Self::InvalidRequest(body),
            401 | 403 => Self::AuthenticationFailed(body),
            404 => Self::ModelNotFound(body),
            408 => Self::Timeout(body),
            429 => Self::RateLimited {
                retry_after_secs: 5,
            },
            _ => Self::ApiError {
                status_code,
                message: body,
            },
        }
    }
}
