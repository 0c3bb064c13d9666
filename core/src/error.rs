use std::path::PathBuf;
use thiserror::Error;

/// Failures of the backing store behind [`crate::persist::IndexStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The index directory does not exist; inference mode never creates one.
    #[error("index store not found at {0}")]
    Missing(PathBuf),
    /// A required table or the header is absent, or the header version differs.
    #[error("index store schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Raised by test doubles to simulate a write failure.
    #[error("injected failure: {0}")]
    Injected(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("codec is in inference mode and cannot be persisted")]
    ReadOnlyCodec,
    /// The index was never finalized, so postings carry no IDF values.
    #[error("index is not finalized (missing IDF values)")]
    NotFinalized,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid range for {field}: min {min} max {max} (need 1 <= min <= max)")]
    InvalidRange { field: &'static str, min: usize, max: usize },
    #[error("suggestion_top_n must be at least 1")]
    InvalidTopN,
}
