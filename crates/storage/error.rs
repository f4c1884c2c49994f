use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to decode value stored under {key}: {reason}")]
    DecodeError { key: String, reason: String },
    #[error("Failed to lock store for reading")]
    ReadLock,
    #[error("Failed to lock store for writing")]
    WriteLock,
}
