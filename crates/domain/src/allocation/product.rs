//! Product aggregate implementation.

use common::{BatchReference, Sku, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    AllocationError, AllocationEvent, Batch, OrderLine,
    events::{Allocated, Deallocated, OutOfStock},
};

/// Product aggregate root.
///
/// Owns every batch of one SKU and decides which batch an order line goes
/// to. Events raised by an operation are buffered on the product until the
/// unit of work that loaded it commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// SKU of every batch in this product.
    sku: Sku,

    /// Batches in registration order.
    batches: Vec<Batch>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    /// Events not yet drained by a unit of work.
    #[serde(skip)]
    events: Vec<AllocationEvent>,
}

impl Aggregate for Product {
    type Key = Sku;
    type Event = AllocationEvent;
    type Error = AllocationError;

    fn key(&self) -> &Sku {
        &self.sku
    }

    fn version(&self) -> Version {
        self.version
    }

    fn pending_events(&self) -> &[AllocationEvent] {
        &self.events
    }

    fn take_pending_events(&mut self) -> Vec<AllocationEvent> {
        std::mem::take(&mut self.events)
    }
}

// Query methods
impl Product {
    /// Creates an empty product at the initial version.
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self {
            sku: sku.into(),
            batches: Vec::new(),
            version: Version::initial(),
            events: Vec::new(),
        }
    }

    /// Returns the SKU.
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Returns all batches in registration order.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Returns a batch by reference.
    pub fn batch(&self, reference: &BatchReference) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    /// Returns true if one of this product's batches has the reference.
    pub fn has_batch(&self, reference: &BatchReference) -> bool {
        self.batch(reference).is_some()
    }

    /// Returns the sum of available quantity across batches.
    pub fn available_quantity(&self) -> i64 {
        self.batches.iter().map(Batch::available_quantity).sum()
    }
}

// Command methods (mutate state and buffer events)
impl Product {
    /// Registers a new batch of this product.
    pub fn add_batch(&mut self, batch: Batch) -> Result<(), AllocationError> {
        if batch.sku() != &self.sku {
            return Err(AllocationError::SkuMismatch {
                expected: self.sku.clone(),
                actual: batch.sku().clone(),
            });
        }

        if self.has_batch(batch.reference()) {
            return Err(AllocationError::DuplicateBatch(batch.reference().clone()));
        }

        self.batches.push(batch);
        self.version = self.version.next();
        Ok(())
    }

    /// Allocates the line to the batch with the earliest eta that can hold it.
    ///
    /// Returns `Ok(None)` and raises `OutOfStock` when no batch has room; that
    /// is a business outcome, not an error. A line that is already allocated
    /// returns its current batch without raising anything.
    pub fn allocate(&mut self, line: OrderLine) -> Result<Option<BatchReference>, AllocationError> {
        if line.sku != self.sku {
            return Err(AllocationError::SkuMismatch {
                expected: self.sku.clone(),
                actual: line.sku,
            });
        }

        if let Some(existing) = self.batches.iter().find(|b| b.contains(&line)) {
            return Ok(Some(existing.reference().clone()));
        }

        // min_by keeps the first of equal elements, so ties go to the
        // batch registered first.
        let chosen = self
            .batches
            .iter()
            .enumerate()
            .filter(|(_, batch)| batch.can_allocate(&line))
            .min_by(|(_, a), (_, b)| a.cmp_by_eta(b))
            .map(|(index, _)| index);

        let Some(index) = chosen else {
            tracing::debug!(sku = %self.sku, order_id = %line.order_id, quantity = line.quantity, "no batch can take line");
            self.events.push(
                OutOfStock {
                    sku: self.sku.clone(),
                }
                .into(),
            );
            return Ok(None);
        };

        let batch = &mut self.batches[index];
        let reference = batch.reference().clone();
        self.events.push(
            Allocated {
                order_id: line.order_id.clone(),
                sku: line.sku.clone(),
                quantity: line.quantity,
                batch_reference: reference.clone(),
            }
            .into(),
        );
        batch.allocate(line);
        self.version = self.version.next();

        Ok(Some(reference))
    }

    /// Changes the purchased quantity of a batch.
    ///
    /// If the batch now holds more than it has, lines are evicted most
    /// recently allocated first until it fits, raising one `Deallocated`
    /// per evicted line.
    pub fn change_batch_quantity(
        &mut self,
        reference: &BatchReference,
        quantity: u32,
    ) -> Result<(), AllocationError> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.reference() == reference)
            .ok_or_else(|| AllocationError::BatchNotFound(reference.clone()))?;

        batch.set_purchased_quantity(quantity);
        while batch.available_quantity() < 0 {
            let Some(line) = batch.deallocate_one() else {
                break;
            };
            tracing::debug!(batch = %reference, order_id = %line.order_id, quantity = line.quantity, "evicted line");
            self.events.push(
                Deallocated {
                    order_id: line.order_id,
                    sku: line.sku,
                    quantity: line.quantity,
                }
                .into(),
            );
        }

        self.version = self.version.next();
        Ok(())
    }
}
