use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{Aggregate, Product};
use tokio::sync::RwLock;

use crate::{
    BatchReference, Result, Sku, StoreError, Version,
    store::{ExpectedVersion, ProductChange, ProductRepository, validate_changes},
};

/// In-memory product repository.
///
/// Products are stored as owned copies behind one lock, so a `save_all`
/// either sees and replaces every product it touches or none of them.
/// Cloning the repository shares the underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<RwLock<HashMap<Sku, Product>>>,
}

impl InMemoryProductRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns the stored version of a product.
    pub async fn version_of(&self, sku: &Sku) -> Option<Version> {
        self.products.read().await.get(sku).map(Product::version)
    }

    /// Clears all products.
    pub async fn clear(&self) {
        self.products.write().await.clear();
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get(&self, sku: &Sku) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(sku).cloned())
    }

    async fn get_by_batch_reference(
        &self,
        reference: &BatchReference,
    ) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.values().find(|p| p.has_batch(reference)).cloned())
    }

    async fn save_all(&self, changes: Vec<ProductChange>) -> Result<()> {
        validate_changes(&changes)?;

        let mut products = self.products.write().await;

        // Check every expectation before writing anything.
        for change in &changes {
            let stored = products.get(change.sku()).map(Product::version);
            match (change.expected_version, stored) {
                (ExpectedVersion::New, None) => {}
                (ExpectedVersion::New, Some(_)) => {
                    metrics::counter!("product_store_conflicts_total").increment(1);
                    return Err(StoreError::AlreadyExists(change.sku().clone()));
                }
                (ExpectedVersion::Exactly(expected), actual) => {
                    let actual = actual.unwrap_or(Version::initial());
                    if actual != expected {
                        metrics::counter!("product_store_conflicts_total").increment(1);
                        return Err(StoreError::ConcurrencyConflict {
                            sku: change.sku().clone(),
                            expected,
                            actual,
                        });
                    }
                }
            }
        }

        for change in changes {
            tracing::debug!(
                sku = %change.sku(),
                expected = %change.expected_version,
                version = %change.product.version(),
                "saving product"
            );
            products.insert(change.sku().clone(), change.product);
        }

        Ok(())
    }
}
