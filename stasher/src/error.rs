//! Error types for the Stasher DHT core

use thiserror::Error;

/// Stasher error taxonomy (spec.md §7)
#[derive(Error, Debug)]
pub enum StasherError {
    #[error("value too large: {len} bytes exceeds max_value_len {max}")]
    ValueTooLarge { len: usize, max: usize },

    #[error("bad identifier: {0}")]
    BadIdentifier(String),

    #[error("bad destination: {0}")]
    BadDestination(String),

    #[error("bad peer: {0}")]
    BadPeer(String),

    #[error("bencode decode error: {0}")]
    Decode(#[from] crate::codec::CodecError),

    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Stasher operations
pub type StasherResult<T> = Result<T, StasherError>;
