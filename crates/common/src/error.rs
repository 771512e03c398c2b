use thiserror::Error;

/// Top-level error taxonomy for the ingestion pipeline.
#[derive(Debug, Error)]
pub enum BlogPipeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("domain mismatch: url does not belong to publisher's domain")]
    DomainMismatch,

    #[error("url not whitelisted for this publisher")]
    NotWhitelisted,

    #[error("usage limit exceeded")]
    UsageLimitExceeded,

    #[error("daily blog limit exceeded")]
    DailyLimitExceeded,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("domain already registered: {0}")]
    DomainTaken(String),

    #[error("job cannot be cancelled in its current state")]
    CannotCancel,

    #[error("postgres error: {0}")]
    Postgres(String),

    #[error("mongodb error: {0}")]
    Mongo(String),

    #[error("upstream error (transient): {0}")]
    TransientUpstream(String),

    #[error("upstream error (permanent): {0}")]
    PermanentUpstream(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BlogPipeError {
    /// Errors that should never be exposed to an end user in detail —
    /// `TransientUpstream`/`PermanentUpstream` are internal-only classifications.
    pub fn is_internal_classification(&self) -> bool {
        matches!(
            self,
            Self::TransientUpstream(_) | Self::PermanentUpstream(_)
        )
    }

    /// Maps this error to the response-envelope HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Auth(_) => 401,
            Self::DomainMismatch | Self::NotWhitelisted | Self::UsageLimitExceeded => 403,
            Self::DailyLimitExceeded => 429,
            Self::NotFound(_) => 404,
            Self::DomainTaken(_) => 409,
            Self::CannotCancel => 400,
            Self::Postgres(_)
            | Self::Mongo(_)
            | Self::TransientUpstream(_)
            | Self::PermanentUpstream(_)
            | Self::Integrity(_)
            | Self::Config(_)
            | Self::Serialization(_)
            | Self::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, BlogPipeError>;
