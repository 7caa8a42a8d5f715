//! Service error types.

use common::{BatchReference, Sku};
use domain::AllocationError;
use product_store::StoreError;
use projections::ProjectionError;
use thiserror::Error;

/// Errors that can occur while handling commands and events.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No batch of this SKU was ever registered.
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    /// No product owns a batch with this reference.
    #[error("Unknown batch {0}")]
    UnknownBatch(BatchReference),

    /// Domain rule violation.
    #[error("Domain error: {0}")]
    Domain(#[from] AllocationError),

    /// Product store error, including concurrency conflicts.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Read model update failed.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Notification could not be delivered.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Event could not be published.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A command was dispatched without a registered handler.
    #[error("No handler registered for command {0}")]
    NoCommandHandler(&'static str),

    /// A second handler was registered for a command.
    #[error("Handler already registered for command {0}")]
    DuplicateCommandHandler(&'static str),

    /// A handler was offered a message of another kind.
    #[error("Handler for {expected} received {actual}")]
    UnroutableMessage {
        expected: &'static str,
        actual: &'static str,
    },
}

impl ServiceError {
    /// Returns true for errors caused by the request itself. These are
    /// reported to the caller and never retried.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidSku(_) | ServiceError::UnknownBatch(_) | ServiceError::Domain(_)
        )
    }

    /// Returns true if another writer changed the product first.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, ServiceError::Store(e) if e.is_conflict())
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use common::Version;

    use super::*;

    #[test]
    fn invalid_input_classification() {
        assert!(ServiceError::InvalidSku(Sku::new("NOPE")).is_invalid_input());
        assert!(ServiceError::UnknownBatch(BatchReference::new("b9")).is_invalid_input());
        assert!(
            ServiceError::from(AllocationError::BatchNotFound(BatchReference::new("b9")))
                .is_invalid_input()
        );
        assert!(!ServiceError::Notification("down".into()).is_invalid_input());
    }

    #[test]
    fn conflict_classification() {
        let conflict = ServiceError::from(StoreError::ConcurrencyConflict {
            sku: Sku::new("LAMP"),
            expected: Version::new(1),
            actual: Version::new(2),
        });
        assert!(conflict.is_concurrency_conflict());
        assert!(!conflict.is_invalid_input());

        let exists = ServiceError::from(StoreError::AlreadyExists(Sku::new("LAMP")));
        assert!(exists.is_concurrency_conflict());

        let invalid = ServiceError::from(StoreError::InvalidChangeSet("dup".into()));
        assert!(!invalid.is_concurrency_conflict());
    }

    #[test]
    fn invalid_sku_message() {
        assert_eq!(
            ServiceError::InvalidSku(Sku::new("LAMP")).to_string(),
            "Invalid sku LAMP"
        );
    }
}
