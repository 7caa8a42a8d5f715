//! Product aggregate, batches, order lines and their events.

mod batch;
mod commands;
mod events;
mod product;
mod value_objects;

pub use batch::Batch;
pub use commands::{Allocate, ChangeBatchQuantity, Command, CreateBatch};
pub use events::{Allocated, AllocationEvent, Deallocated, OutOfStock};
pub use product::Product;
pub use value_objects::OrderLine;

use common::{BatchReference, Sku};
use thiserror::Error;

/// Errors that can occur during allocation operations.
///
/// Running out of stock is not among them: it is reported as an
/// [`OutOfStock`] event.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// A line or batch was handed to a product of another SKU.
    #[error("SKU mismatch: product is {expected}, got {actual}")]
    SkuMismatch { expected: Sku, actual: Sku },

    /// No batch with this reference exists on the product.
    #[error("Batch not found: {0}")]
    BatchNotFound(BatchReference),

    /// A batch with this reference is already registered.
    #[error("Batch already exists: {0}")]
    DuplicateBatch(BatchReference),
}
