use behavior_client::CollectorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid page URL: {0}")]
    InvalidPage(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Collector(#[from] CollectorError),
}
