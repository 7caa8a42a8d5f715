//! Domain layer for the allocation system.
//!
//! This crate provides the allocation model:
//! - [`Product`] aggregate owning every [`Batch`] of one SKU
//! - [`OrderLine`] value object
//! - [`AllocationEvent`] facts buffered on the product until commit
//! - [`Command`]s accepted by the service layer

pub mod aggregate;
pub mod allocation;

pub use common::{BatchReference, OrderId, Sku, Version};

pub use aggregate::{Aggregate, DomainEvent};
pub use allocation::{
    Allocate, Allocated, AllocationError, AllocationEvent, Batch, ChangeBatchQuantity, Command,
    CreateBatch, Deallocated, OrderLine, OutOfStock, Product,
};
