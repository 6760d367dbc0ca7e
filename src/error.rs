use thiserror::Error;

/// Errors raised by the detection engines and their collaborators
#[derive(Debug, Error)]
pub enum IdsError {
    /// A triggered detection point or rule has nothing configured to respond with
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to load configuration from {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    #[error("client application '{client}' is not authorized to {action}")]
    NotAuthorized { client: String, action: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl IdsError {
    pub fn configuration(message: impl Into<String>) -> Self {
        IdsError::Configuration(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, IdsError::Configuration(_) | IdsError::ConfigLoad { .. })
    }
}

pub type Result<T> = std::result::Result<T, IdsError>;
