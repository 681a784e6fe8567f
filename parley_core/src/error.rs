use thiserror::Error;

/// Failure reported by a remote collaborator.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The handle can no longer be used and has to be rebuilt.
    #[error("client handle is unusable: {0}")]
    Unusable(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("unsupported input: {0}")]
    Unsupported(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether another attempt has a chance of succeeding.
    ///
    /// Server-side failures, rate limiting, connection problems and broken
    /// handles are transient; everything else is not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Transport(_) | Self::Unusable(_) => true,
            Self::InvalidResponse(_) | Self::Unsupported(_) | Self::Cancelled => false,
        }
    }

    #[must_use]
    pub const fn is_unusable(&self) -> bool {
        matches!(self, Self::Unusable(_))
    }
}
