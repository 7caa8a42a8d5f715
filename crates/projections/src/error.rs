//! Projection error types.

use common::{BatchReference, OrderId, Sku};
use thiserror::Error;

/// Errors that can occur while applying events to a read model.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An order line was reported allocated while the view still holds it
    /// in another batch.
    #[error(
        "Allocation of {order_id}/{sku}/{quantity} to {incoming} conflicts with existing row for {existing}"
    )]
    ConflictingAllocation {
        order_id: OrderId,
        sku: Sku,
        quantity: u32,
        existing: BatchReference,
        incoming: BatchReference,
    },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
