use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timed out after {timeout_secs}s waiting for the body of {url}")]
    RenderTimeout { url: String, timeout_secs: u64 },

    #[error("Rendered session error: {0}")]
    Render(String),

    #[error("Could not start rendered session: {0}")]
    DriverInit(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
