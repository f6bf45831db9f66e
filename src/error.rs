/// Error types shared by sources, hoster extractors and the HTTP layer

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Operation not supported by this source: {0}")]
    Unsupported(&'static str),

    #[error("Source is not configured: {0}")]
    NotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

impl SourceError {
    pub fn parse(msg: impl Into<String>) -> Self {
        SourceError::Parse(msg.into())
    }
}
