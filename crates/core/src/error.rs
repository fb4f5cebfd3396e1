use thiserror::Error;

/// Message shown when the backend fails without explaining why.
pub const FALLBACK_MESSAGE: &str = "Unexpected error";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never reached the backend, or its response could not be read.
    #[error("network error: {0}")]
    Network(String),

    #[error("http error: status {status}")]
    Http { status: u16, message: Option<String> },

    /// A well-formed response carrying `ok: false`.
    #[error("backend reported failure: {}", .message.as_deref().unwrap_or(FALLBACK_MESSAGE))]
    Logical { message: Option<String> },
}

impl ApiError {
    /// The single human-readable message every action renders, whatever the failure kind.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(message) => message.clone(),
            Self::Http {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Http {
                status,
                message: None,
            } => format!("{FALLBACK_MESSAGE} (HTTP {status})"),
            Self::Logical { message } => message
                .clone()
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
        }
    }

    /// True when the backend answered at all, even if it answered with a failure.
    pub fn service_reachable(&self) -> bool {
        !matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(value.to_string())
    }
}

impl From<url::ParseError> for ApiError {
    fn from(value: url::ParseError) -> Self {
        Self::Network(format!("invalid backend url: {value}"))
    }
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}
