use thiserror::Error;

use crate::store::StoreError;

/// Application-level errors for the CLI layer. Engine errors stay in
/// [`StoreError`]; this enum wraps them together with the file and config
/// failures the binary can hit.
#[derive(Debug, Error)]
pub enum RetrylabError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
