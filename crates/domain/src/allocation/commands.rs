//! Allocation commands.

use chrono::NaiveDate;
use common::{BatchReference, OrderId, Sku};
use serde::{Deserialize, Serialize};

use super::{Deallocated, OrderLine};

/// Command to register a new stock batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    /// Reference of the new batch.
    pub reference: BatchReference,

    /// SKU the batch holds.
    pub sku: Sku,

    /// Purchased quantity.
    pub quantity: u32,

    /// Expected arrival; `None` means already in the warehouse.
    pub eta: Option<NaiveDate>,
}

impl CreateBatch {
    /// Creates a new CreateBatch command.
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            quantity,
            eta,
        }
    }
}

/// Command to allocate an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocate {
    /// The order the line belongs to.
    pub order_id: OrderId,

    /// Requested SKU.
    pub sku: Sku,

    /// Requested quantity.
    pub quantity: u32,
}

impl Allocate {
    /// Creates a new Allocate command.
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }

    /// Returns the order line this command asks to allocate.
    pub fn line(&self) -> OrderLine {
        OrderLine {
            order_id: self.order_id.clone(),
            sku: self.sku.clone(),
            quantity: self.quantity,
        }
    }
}

impl From<&Deallocated> for Allocate {
    fn from(event: &Deallocated) -> Self {
        Self {
            order_id: event.order_id.clone(),
            sku: event.sku.clone(),
            quantity: event.quantity,
        }
    }
}

/// Command to change the purchased quantity of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatchQuantity {
    /// The batch to change.
    pub reference: BatchReference,

    /// New purchased quantity.
    pub quantity: u32,
}

impl ChangeBatchQuantity {
    /// Creates a new ChangeBatchQuantity command.
    pub fn new(reference: impl Into<BatchReference>, quantity: u32) -> Self {
        Self {
            reference: reference.into(),
            quantity,
        }
    }
}

/// Every command the allocation service accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    CreateBatch(CreateBatch),
    Allocate(Allocate),
    ChangeBatchQuantity(ChangeBatchQuantity),
}

impl Command {
    /// Returns the command type name.
    pub fn command_type(&self) -> &'static str {
        match self {
            Command::CreateBatch(_) => "CreateBatch",
            Command::Allocate(_) => "Allocate",
            Command::ChangeBatchQuantity(_) => "ChangeBatchQuantity",
        }
    }
}

impl From<CreateBatch> for Command {
    fn from(cmd: CreateBatch) -> Self {
        Command::CreateBatch(cmd)
    }
}

impl From<Allocate> for Command {
    fn from(cmd: Allocate) -> Self {
        Command::Allocate(cmd)
    }
}

impl From<ChangeBatchQuantity> for Command {
    fn from(cmd: ChangeBatchQuantity) -> Self {
        Command::ChangeBatchQuantity(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_builds_order_line() {
        let cmd = Allocate::new("o1", "LAMP", 3);
        assert_eq!(cmd.line(), OrderLine::new("o1", "LAMP", 3));
    }

    #[test]
    fn allocate_from_deallocated_keeps_the_line() {
        let event = Deallocated {
            order_id: "o7".into(),
            sku: "LAMP".into(),
            quantity: 2,
        };
        assert_eq!(Allocate::from(&event), Allocate::new("o7", "LAMP", 2));
    }

    #[test]
    fn command_type_names() {
        let cmd: Command = CreateBatch::new("b1", "LAMP", 10, None).into();
        assert_eq!(cmd.command_type(), "CreateBatch");
        let cmd: Command = ChangeBatchQuantity::new("b1", 5).into();
        assert_eq!(cmd.command_type(), "ChangeBatchQuantity");
    }
}
