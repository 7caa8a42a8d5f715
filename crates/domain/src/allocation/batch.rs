//! Stock batch entity.

use std::cmp::Ordering;

use chrono::NaiveDate;
use common::{BatchReference, Sku};
use serde::{Deserialize, Serialize};

use super::OrderLine;

/// A discrete purchased or incoming quantity of one SKU.
///
/// Batches are only mutated through their owning [`Product`](super::Product).
/// Allocations are kept in the order they were made so that evictions are
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    reference: BatchReference,
    sku: Sku,
    purchased_quantity: u32,
    eta: Option<NaiveDate>,
    allocations: Vec<OrderLine>,
}

impl Batch {
    /// Creates a batch with no allocations.
    ///
    /// A batch without `eta` is already in the warehouse.
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: Vec::new(),
        }
    }

    pub fn reference(&self) -> &BatchReference {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    /// Returns the allocated lines, oldest first.
    pub fn allocations(&self) -> &[OrderLine] {
        &self.allocations
    }

    /// Returns the total quantity of all allocated lines.
    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|l| i64::from(l.quantity)).sum()
    }

    /// Returns purchased minus allocated quantity.
    ///
    /// Negative only transiently, after the purchased quantity was reduced
    /// below what is already allocated.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - self.allocated_quantity()
    }

    /// Returns true if the line is allocated to this batch.
    pub fn contains(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    /// Returns true if the line has this batch's SKU and fits in what is left.
    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= i64::from(line.quantity)
    }

    /// Allocates the line if it fits. Allocating a line twice is a no-op.
    pub(crate) fn allocate(&mut self, line: OrderLine) {
        if self.can_allocate(&line) && !self.contains(&line) {
            self.allocations.push(line);
        }
    }

    /// Removes the line if present.
    pub fn deallocate(&mut self, line: &OrderLine) {
        self.allocations.retain(|l| l != line);
    }

    /// Removes and returns the most recently allocated line.
    pub(crate) fn deallocate_one(&mut self) -> Option<OrderLine> {
        self.allocations.pop()
    }

    pub(crate) fn set_purchased_quantity(&mut self, quantity: u32) {
        self.purchased_quantity = quantity;
    }

    /// Delivery-priority ordering: earliest eta first, batches already in
    /// stock (no eta) before any shipment.
    pub fn cmp_by_eta(&self, other: &Self) -> Ordering {
        self.eta.cmp(&other.eta)
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl std::hash::Hash for Batch {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}
