use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ClientError {
    /// Transport failures, throttling and server errors are worth another attempt;
    /// a rejected or unknown reservation is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            ClientError::Parse(_) | ClientError::NotFound(_) | ClientError::InvalidHeader(_) => {
                false
            }
        }
    }
}

/// Why a single ready-check probe produced no ready data.
///
/// None of these fail a race on their own; they are logged and the probe yields nothing.
#[derive(Debug, Clone, Error)]
pub enum ProbeFailure {
    /// The remote answered with a well-formed refusal, typically "too early to check in".
    #[error("not ready ({status}): {message}")]
    NotReady { status: u16, message: String },

    #[error("transport: {0}")]
    Transport(String),

    /// A success status whose body lacked the check-in action.
    #[error("malformed ready data: {0}")]
    Malformed(String),
}
