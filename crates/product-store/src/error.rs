use thiserror::Error;

use crate::{Sku, Version};

/// Errors that can occur when interacting with the product store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the version the change was based on.
    #[error("Concurrency conflict for product {sku}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        sku: Sku,
        expected: Version,
        actual: Version,
    },

    /// A new product was saved but another writer created it first.
    #[error("Product already exists: {0}")]
    AlreadyExists(Sku),

    /// The change set itself is malformed.
    #[error("Invalid change set: {0}")]
    InvalidChangeSet(String),
}

impl StoreError {
    /// Returns true if the error means another writer got there first and
    /// the whole operation can be retried against a fresh read.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::AlreadyExists(_)
        )
    }
}

/// Result type for product store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
