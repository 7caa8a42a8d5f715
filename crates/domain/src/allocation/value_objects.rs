//! Value objects for the allocation domain.

use common::{OrderId, Sku};
use serde::{Deserialize, Serialize};

/// A customer's request for a quantity of one SKU under one order.
///
/// Order lines have no identity of their own: two lines with the same
/// order, SKU and quantity are the same line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    /// The order this line belongs to.
    pub order_id: OrderId,

    /// The requested SKU.
    pub sku: Sku,

    /// The requested quantity.
    pub quantity: u32,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }
}
