//! Allocation domain events.

use common::{BatchReference, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events raised by the product aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AllocationEvent {
    /// An order line was bound to a batch.
    Allocated(Allocated),

    /// An order line was released from a batch and needs a new home.
    Deallocated(Deallocated),

    /// No batch of the product could take an order line.
    OutOfStock(OutOfStock),
}

impl DomainEvent for AllocationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AllocationEvent::Allocated(_) => Allocated::EVENT_TYPE,
            AllocationEvent::Deallocated(_) => Deallocated::EVENT_TYPE,
            AllocationEvent::OutOfStock(_) => OutOfStock::EVENT_TYPE,
        }
    }
}

impl AllocationEvent {
    /// Returns the SKU the event is about.
    pub fn sku(&self) -> &Sku {
        match self {
            AllocationEvent::Allocated(e) => &e.sku,
            AllocationEvent::Deallocated(e) => &e.sku,
            AllocationEvent::OutOfStock(e) => &e.sku,
        }
    }
}

/// Data for the Allocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocated {
    /// Order the allocated line belongs to.
    pub order_id: OrderId,

    /// SKU of the line.
    pub sku: Sku,

    /// Allocated quantity.
    pub quantity: u32,

    /// Batch the line was allocated to.
    pub batch_reference: BatchReference,
}

impl Allocated {
    pub const EVENT_TYPE: &'static str = "Allocated";
}

/// Data for the Deallocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deallocated {
    /// Order the released line belongs to.
    pub order_id: OrderId,

    /// SKU of the line.
    pub sku: Sku,

    /// Released quantity.
    pub quantity: u32,
}

impl Deallocated {
    pub const EVENT_TYPE: &'static str = "Deallocated";
}

/// Data for the OutOfStock event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    /// SKU that ran out.
    pub sku: Sku,
}

impl OutOfStock {
    pub const EVENT_TYPE: &'static str = "OutOfStock";
}

impl From<Allocated> for AllocationEvent {
    fn from(event: Allocated) -> Self {
        AllocationEvent::Allocated(event)
    }
}

impl From<Deallocated> for AllocationEvent {
    fn from(event: Deallocated) -> Self {
        AllocationEvent::Deallocated(event)
    }
}

impl From<OutOfStock> for AllocationEvent {
    fn from(event: OutOfStock) -> Self {
        AllocationEvent::OutOfStock(event)
    }
}
