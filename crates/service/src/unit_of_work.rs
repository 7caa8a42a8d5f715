//! Transactional boundary around product aggregates.
//!
//! A [`UnitOfWork`] hands out [`Transaction`]s. A transaction loads private
//! copies of products from the repository, lets a handler mutate them and
//! writes them back in one atomic `save_all` on [`Transaction::commit`].
//! Events raised by the products are moved into the unit of work's outbox
//! only after a successful save, from where the message bus drains them with
//! [`EventSource::collect_new_events`].

use std::sync::Arc;

use async_trait::async_trait;
use common::{BatchReference, Sku, Version};
use domain::{Aggregate, AllocationEvent, Product};
use product_store::{ProductChange, ProductRepository, StoreError};
use tokio::sync::Mutex;

/// Source of events committed since the last collection.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Returns every event committed since the previous call, in emission
    /// order, and clears the outbox.
    async fn collect_new_events(&self) -> Vec<AllocationEvent>;

    /// Drops committed events nobody will process. Returns how many were
    /// dropped.
    async fn discard_new_events(&self) -> usize;
}

/// Scoped access to the product repository.
pub struct UnitOfWork<R: ProductRepository> {
    repository: Arc<R>,
    outbox: Mutex<Vec<AllocationEvent>>,
}

impl<R: ProductRepository> UnitOfWork<R> {
    /// Creates a unit of work over a shared repository.
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Starts a new transaction.
    pub fn begin(&self) -> Transaction<'_, R> {
        Transaction {
            uow: self,
            seen: Vec::new(),
            events: Vec::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl<R: ProductRepository + 'static> EventSource for UnitOfWork<R> {
    async fn collect_new_events(&self) -> Vec<AllocationEvent> {
        std::mem::take(&mut *self.outbox.lock().await)
    }

    async fn discard_new_events(&self) -> usize {
        let mut outbox = self.outbox.lock().await;
        let dropped = outbox.len();
        outbox.clear();
        dropped
    }
}

struct Tracked {
    product: Product,
    /// Version at load time; `None` for products added in this transaction.
    loaded_version: Option<Version>,
}

/// One unit of work in progress.
///
/// Products obtained from a transaction are private copies tracked in an
/// identity map, so looking the same product up twice yields the same
/// instance. Dropping the transaction without calling
/// [`commit`](Self::commit) discards every change and every event.
///
/// Only one product can be borrowed from a transaction at a time, so the
/// events it raised are swept into a transaction-wide log whenever the
/// transaction is touched again. That log keeps emission order across
/// products.
pub struct Transaction<'a, R: ProductRepository> {
    uow: &'a UnitOfWork<R>,
    seen: Vec<Tracked>,
    events: Vec<AllocationEvent>,
    finished: bool,
}

impl<R: ProductRepository> Transaction<'_, R> {
    /// Returns the product for a SKU, or None if it does not exist.
    pub async fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, StoreError> {
        match self.load(sku).await? {
            Some(i) => Ok(Some(&mut self.seen[i].product)),
            None => Ok(None),
        }
    }

    /// Returns the product owning a batch, or None if no product does.
    ///
    /// Fails with a conflict if this transaction already holds the owning
    /// product from before the batch was added to it.
    pub async fn get_by_batch_reference(
        &mut self,
        reference: &BatchReference,
    ) -> Result<Option<&mut Product>, StoreError> {
        self.sweep_events();
        if let Some(i) = self
            .seen
            .iter()
            .position(|t| t.product.has_batch(reference))
        {
            return Ok(Some(&mut self.seen[i].product));
        }

        let Some(product) = self.uow.repository.get_by_batch_reference(reference).await? else {
            return Ok(None);
        };

        // A tracked copy of this product is stale: it lacks the batch.
        if let Some(i) = self.position(product.sku()) {
            let sku = product.sku().clone();
            return Err(match self.seen[i].loaded_version {
                Some(expected) => StoreError::ConcurrencyConflict {
                    sku,
                    expected,
                    actual: product.version(),
                },
                None => StoreError::AlreadyExists(sku),
            });
        }

        let version = product.version();
        let i = self.track(product, Some(version));
        Ok(Some(&mut self.seen[i].product))
    }

    /// Registers a product that does not exist in the repository yet.
    pub fn add(&mut self, product: Product) -> Result<&mut Product, StoreError> {
        self.sweep_events();
        if self.position(product.sku()).is_some() {
            return Err(StoreError::AlreadyExists(product.sku().clone()));
        }
        let i = self.track(product, None);
        Ok(&mut self.seen[i].product)
    }

    /// Returns the product for a SKU, creating it with `create` if it does
    /// not exist.
    pub async fn get_or_add(
        &mut self,
        sku: &Sku,
        create: impl FnOnce() -> Product + Send,
    ) -> Result<&mut Product, StoreError> {
        let i = match self.load(sku).await? {
            Some(i) => i,
            None => self.track(create(), None),
        };
        Ok(&mut self.seen[i].product)
    }

    /// Persists every changed product atomically, then moves their events
    /// into the unit of work's outbox.
    ///
    /// Products whose version did not move are not written, but their
    /// events (an out-of-stock notice, for instance) are still released.
    pub async fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.sweep_events();
        let seen = std::mem::take(&mut self.seen);
        let events = std::mem::take(&mut self.events);

        let mut changes = Vec::new();
        for Tracked {
            product,
            loaded_version,
        } in seen
        {
            match loaded_version {
                None => changes.push(ProductChange::created(product)),
                Some(version) if product.version() != version => {
                    changes.push(ProductChange::updated(product, version));
                }
                Some(_) => {}
            }
        }

        let saved = changes.len();
        if !changes.is_empty()
            && let Err(e) = self.uow.repository.save_all(changes).await
        {
            tracing::warn!(error = %e, "commit failed, changes discarded");
            return Err(e);
        }

        tracing::debug!(products = saved, events = events.len(), "committed");
        self.uow.outbox.lock().await.extend(events);
        Ok(())
    }

    /// Discards every change made through this transaction.
    pub fn rollback(self) {}

    async fn load(&mut self, sku: &Sku) -> Result<Option<usize>, StoreError> {
        self.sweep_events();
        if let Some(i) = self.position(sku) {
            return Ok(Some(i));
        }
        let Some(product) = self.uow.repository.get(sku).await? else {
            return Ok(None);
        };
        let version = product.version();
        Ok(Some(self.track(product, Some(version))))
    }

    fn sweep_events(&mut self) {
        for tracked in &mut self.seen {
            self.events.extend(tracked.product.take_pending_events());
        }
    }

    fn position(&self, sku: &Sku) -> Option<usize> {
        self.seen.iter().position(|t| t.product.sku() == sku)
    }

    fn track(&mut self, product: Product, loaded_version: Option<Version>) -> usize {
        self.seen.push(Tracked {
            product,
            loaded_version,
        });
        self.seen.len() - 1
    }
}

impl<R: ProductRepository> Drop for Transaction<'_, R> {
    fn drop(&mut self) {
        if !self.finished && !self.seen.is_empty() {
            tracing::debug!(products = self.seen.len(), "rolling back uncommitted changes");
        }
    }
}
