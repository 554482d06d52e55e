use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("mixballot: failed to decrypt onion layer")]
    DecryptionError,

    #[error("mixballot: invalid mix batch: {0}")]
    BatchValidationError(&'static str),

    #[error("mixballot: post-quantum KEM failure: {0}")]
    KemError(&'static str),

    #[error("mixballot: shard bookkeeping mismatch: {0}")]
    ShardSizeMismatchError(String),

    #[error("mixballot: invalid public key - wrong length")]
    InvalidPublicKey,

    #[error("mixballot: invalid hexadecimal: {0}")]
    BadHex(#[from] hex::FromHexError),

    #[error("mixballot: JSON error deserializing payload: {0}")]
    JSONDeserialization(#[from] serde_json::Error),

    #[error("mixballot: invalid rpc payload: {0}")]
    InvalidRpcPayload(&'static str),
}
