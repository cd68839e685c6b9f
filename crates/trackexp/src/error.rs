use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("{status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid base_url: {0}")]
    InvalidUrl(String),
    #[error("credential store error: {0}")]
    Credentials(#[from] CredentialError),
    /// The background task running the request panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl ClientError {
    /// HTTP status code, only for server rejections.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("failed to encrypt credentials")]
    Encrypt,
    #[error("failed to decrypt credentials")]
    Decrypt,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("logging setup failed: {0}")]
    Logging(String),
}
