//! Error types for the entity store.

use crate::types::ObjectId;
use thiserror::Error;

/// Main error type for persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record store not initialized")]
    NotInitialized,

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown attribute '{attribute}' on entity {entity}")]
    UnknownAttribute { entity: String, attribute: String },

    #[error("Invalid predicate for entity {entity}: {reason}")]
    InvalidPredicate { entity: String, reason: String },

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Validation failed for {entity}.{attribute}: {reason}")]
    Validation {
        entity: String,
        attribute: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Store is locked by another process")]
    Locked,
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
