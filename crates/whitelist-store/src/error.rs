use std::path::PathBuf;

/// Errors that can occur while reading or mutating the whitelist record.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create whitelist directory: {0}")]
    CreateDir(std::io::Error),

    #[error("failed to read whitelist record: {0}")]
    Read(std::io::Error),

    #[error("failed to write whitelist record: {0}")]
    Write(std::io::Error),

    #[error("whitelist record {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize whitelist record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("whitelist lock poisoned by a panicked caller")]
    Poisoned,
}

impl StoreError {
    /// Whether this error means the record exists but cannot be trusted.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}
