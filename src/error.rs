/// Failure to obtain items from a single feed source.
///
/// These never escape the aggregator: a failing source contributes zero
/// items and the error is only logged.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    Status(reqwest::StatusCode),

    #[error("Conversion service returned status '{0}'")]
    Service(String),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Feed parse error: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

/// Failure of the key/value store backing the news cache.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
