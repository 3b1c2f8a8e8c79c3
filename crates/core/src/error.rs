//! Error types for the Replyline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is the umbrella
//! type a pipeline run terminates with.

use thiserror::Error;

/// The top-level error type for all Replyline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Model call errors ---
    #[error("Transport error: {0}")]
    Transport(ProviderError),

    #[error("Model error: {0}")]
    Model(ProviderError),

    // --- Stage outcomes ---
    #[error("Unsafe content detected at {stage}: {}", .categories.join(", "))]
    UnsafeContent {
        stage: String,
        categories: Vec<String>,
    },

    #[error("Could not interpret {stage} reply: {reason}")]
    Parse { stage: String, reason: String },

    // --- Review errors ---
    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    // --- Run bookkeeping ---
    #[error("Invalid pipeline transition: {0}")]
    InvalidTransition(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a parse error for the named stage.
    pub fn parse(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly label, used in run records and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "configuration_error",
            Self::Transport(_) => "transport_error",
            Self::Model(_) => "model_error",
            Self::UnsafeContent { .. } => "unsafe_content",
            Self::Parse { .. } => "parse_error",
            Self::Review(_) => "review_error",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Network failures and timeouts are transport errors; everything the
/// endpoint itself reported is a model error.
impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        if err.is_transport() {
            Self::Transport(err)
        } else {
            Self::Model(err)
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Empty response from model: {0}")]
    EmptyResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether the failure happened before the endpoint produced an answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }

    /// Whether a retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::RateLimited { .. } => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_)
            | Self::ModelNotFound(_)
            | Self::EmptyResponse(_)
            | Self::NotConfigured(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Another run is already awaiting review: {pending_run}")]
    Busy { pending_run: String },

    #[error("No pending review matches token {0}")]
    UnknownToken(String),

    #[error("Review channel closed before a decision arrived")]
    Closed,

    #[error("Review timed out after {0}s")]
    TimedOut(u64),
}
