use std::collections::HashSet;

use async_trait::async_trait;
use domain::{Aggregate, Product};

use crate::{BatchReference, Result, Sku, StoreError, Version};

/// The version a change expects to find in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The product must not exist yet.
    New,

    /// The stored product must be at exactly this version.
    Exactly(Version),
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectedVersion::New => write!(f, "new"),
            ExpectedVersion::Exactly(v) => write!(f, "{v}"),
        }
    }
}

/// One product to persist, together with the version it was read at.
#[derive(Debug, Clone)]
pub struct ProductChange {
    pub product: Product,
    pub expected_version: ExpectedVersion,
}

impl ProductChange {
    /// A change to a product that did not exist when it was read.
    pub fn created(product: Product) -> Self {
        Self {
            product,
            expected_version: ExpectedVersion::New,
        }
    }

    /// A change to a product that was read at `version`.
    pub fn updated(product: Product, version: Version) -> Self {
        Self {
            product,
            expected_version: ExpectedVersion::Exactly(version),
        }
    }

    pub fn sku(&self) -> &Sku {
        self.product.sku()
    }
}

/// Storage contract for product aggregates.
///
/// All implementations must be thread-safe (Send + Sync). Reads hand out
/// copies; nothing a caller does to a returned product reaches the store
/// until it is passed back through [`save_all`](Self::save_all).
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Retrieves the product for a SKU.
    ///
    /// Returns None if no batch of that SKU was ever registered.
    async fn get(&self, sku: &Sku) -> Result<Option<Product>>;

    /// Retrieves the product owning the batch with this reference.
    async fn get_by_batch_reference(&self, reference: &BatchReference)
    -> Result<Option<Product>>;

    /// Persists a set of products atomically: either all are written or none.
    ///
    /// Every change is checked against its expected version first and the
    /// call fails with `ConcurrencyConflict` (or `AlreadyExists` for a new
    /// product) on the first mismatch.
    async fn save_all(&self, changes: Vec<ProductChange>) -> Result<()>;
}

/// Validates a change set before saving.
pub fn validate_changes(changes: &[ProductChange]) -> Result<()> {
    let mut seen = HashSet::with_capacity(changes.len());
    for change in changes {
        if !seen.insert(change.sku()) {
            return Err(StoreError::InvalidChangeSet(format!(
                "product {} appears more than once",
                change.sku()
            )));
        }

        if let ExpectedVersion::Exactly(expected) = change.expected_version
            && change.product.version() < expected
        {
            return Err(StoreError::InvalidChangeSet(format!(
                "product {} is at version {} but was read at {}",
                change.sku(),
                change.product.version(),
                expected
            )));
        }
    }

    Ok(())
}
