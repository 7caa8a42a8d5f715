//! Command and event handlers.
//!
//! Each handler owns exactly the collaborators it needs, handed over at
//! construction, and runs its work inside its own transaction.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    Allocate, Allocated, AllocationError, AllocationEvent, Batch, ChangeBatchQuantity,
    CreateBatch, Deallocated, OutOfStock, Product,
};
use product_store::ProductRepository;
use projections::{AllocationsView, Projection};

use crate::adapters::{Notifications, Publisher};
use crate::error::{Result, ServiceError};
use crate::registry::{CommandHandler, CommandOutcome, EventHandler};
use crate::unit_of_work::UnitOfWork;

/// Registers a new batch, creating its product on first sight of the SKU.
pub struct AddBatchHandler<R: ProductRepository> {
    uow: Arc<UnitOfWork<R>>,
}

impl<R: ProductRepository> AddBatchHandler<R> {
    pub fn new(uow: Arc<UnitOfWork<R>>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<R: ProductRepository + 'static> CommandHandler for AddBatchHandler<R> {
    type Command = CreateBatch;

    #[tracing::instrument(skip_all, fields(reference = %command.reference, sku = %command.sku))]
    async fn handle(&self, command: &CreateBatch) -> Result<CommandOutcome> {
        let mut tx = self.uow.begin();

        // References are unique across products, not just within one.
        if tx
            .get_by_batch_reference(&command.reference)
            .await?
            .is_some()
        {
            return Err(AllocationError::DuplicateBatch(command.reference.clone()).into());
        }

        let product = tx
            .get_or_add(&command.sku, || Product::new(command.sku.clone()))
            .await?;
        product.add_batch(Batch::new(
            command.reference.clone(),
            command.sku.clone(),
            command.quantity,
            command.eta,
        ))?;
        tx.commit().await?;

        tracing::info!(quantity = command.quantity, eta = ?command.eta, "batch added");
        Ok(CommandOutcome::Completed)
    }
}

/// Allocates an order line to the preferred batch of its product.
pub struct AllocateHandler<R: ProductRepository> {
    uow: Arc<UnitOfWork<R>>,
}

impl<R: ProductRepository> AllocateHandler<R> {
    pub fn new(uow: Arc<UnitOfWork<R>>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<R: ProductRepository + 'static> CommandHandler for AllocateHandler<R> {
    type Command = Allocate;

    #[tracing::instrument(skip_all, fields(order_id = %command.order_id, sku = %command.sku))]
    async fn handle(&self, command: &Allocate) -> Result<CommandOutcome> {
        allocate(&self.uow, command).await
    }
}

/// Gives a deallocated line a new home.
pub struct ReallocateHandler<R: ProductRepository> {
    uow: Arc<UnitOfWork<R>>,
}

impl<R: ProductRepository> ReallocateHandler<R> {
    pub fn new(uow: Arc<UnitOfWork<R>>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<R: ProductRepository + 'static> EventHandler for ReallocateHandler<R> {
    type Event = Deallocated;

    fn name(&self) -> &'static str {
        "reallocate"
    }

    #[tracing::instrument(skip_all, fields(order_id = %event.order_id, sku = %event.sku))]
    async fn handle(&self, event: &Deallocated) -> Result<()> {
        allocate(&self.uow, &Allocate::from(event)).await?;
        Ok(())
    }
}

async fn allocate<R: ProductRepository>(
    uow: &UnitOfWork<R>,
    command: &Allocate,
) -> Result<CommandOutcome> {
    let line = command.line();
    let mut tx = uow.begin();
    let product = tx
        .get(&line.sku)
        .await?
        .ok_or_else(|| ServiceError::InvalidSku(line.sku.clone()))?;

    let allocated = product.allocate(line)?;
    tx.commit().await?;

    match allocated {
        Some(reference) => {
            tracing::info!(batch = %reference, quantity = command.quantity, "line allocated");
            Ok(CommandOutcome::Allocated(reference))
        }
        None => {
            tracing::warn!(quantity = command.quantity, "out of stock");
            metrics::counter!("allocation_out_of_stock_total").increment(1);
            Ok(CommandOutcome::NotAllocated)
        }
    }
}

/// Changes the purchased quantity of a batch, evicting lines that no
/// longer fit.
pub struct ChangeBatchQuantityHandler<R: ProductRepository> {
    uow: Arc<UnitOfWork<R>>,
}

impl<R: ProductRepository> ChangeBatchQuantityHandler<R> {
    pub fn new(uow: Arc<UnitOfWork<R>>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl<R: ProductRepository + 'static> CommandHandler for ChangeBatchQuantityHandler<R> {
    type Command = ChangeBatchQuantity;

    #[tracing::instrument(skip_all, fields(reference = %command.reference))]
    async fn handle(&self, command: &ChangeBatchQuantity) -> Result<CommandOutcome> {
        let mut tx = self.uow.begin();
        let product = tx
            .get_by_batch_reference(&command.reference)
            .await?
            .ok_or_else(|| ServiceError::UnknownBatch(command.reference.clone()))?;

        product.change_batch_quantity(&command.reference, command.quantity)?;
        tx.commit().await?;

        tracing::info!(quantity = command.quantity, "batch quantity changed");
        Ok(CommandOutcome::Completed)
    }
}

/// Tells the stock team a SKU ran out.
pub struct OutOfStockNotificationHandler<N: Notifications> {
    notifications: Arc<N>,
    destination: String,
}

impl<N: Notifications> OutOfStockNotificationHandler<N> {
    pub fn new(notifications: Arc<N>, destination: impl Into<String>) -> Self {
        Self {
            notifications,
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl<N: Notifications + 'static> EventHandler for OutOfStockNotificationHandler<N> {
    type Event = OutOfStock;

    fn name(&self) -> &'static str {
        "send_out_of_stock_notification"
    }

    async fn handle(&self, event: &OutOfStock) -> Result<()> {
        self.notifications
            .send(&self.destination, &format!("Out of stock for {}", event.sku))
            .await
    }
}

/// Publishes allocations for other systems.
pub struct PublishAllocatedHandler<P: Publisher> {
    publisher: Arc<P>,
    topic: String,
}

impl<P: Publisher> PublishAllocatedHandler<P> {
    pub fn new(publisher: Arc<P>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl<P: Publisher + 'static> EventHandler for PublishAllocatedHandler<P> {
    type Event = Allocated;

    fn name(&self) -> &'static str {
        "publish_allocated_event"
    }

    async fn handle(&self, event: &Allocated) -> Result<()> {
        self.publisher
            .publish(&self.topic, &AllocationEvent::from(event.clone()))
            .await
    }
}

/// Adds allocated lines to the allocations view.
pub struct AddAllocationToReadModel {
    view: AllocationsView,
}

impl AddAllocationToReadModel {
    pub fn new(view: AllocationsView) -> Self {
        Self { view }
    }
}

#[async_trait]
impl EventHandler for AddAllocationToReadModel {
    type Event = Allocated;

    fn name(&self) -> &'static str {
        "add_allocation_to_read_model"
    }

    async fn handle(&self, event: &Allocated) -> Result<()> {
        Ok(self
            .view
            .handle(&AllocationEvent::from(event.clone()))
            .await?)
    }
}

/// Removes deallocated lines from the allocations view.
pub struct RemoveAllocationFromReadModel {
    view: AllocationsView,
}

impl RemoveAllocationFromReadModel {
    pub fn new(view: AllocationsView) -> Self {
        Self { view }
    }
}

#[async_trait]
impl EventHandler for RemoveAllocationFromReadModel {
    type Event = Deallocated;

    fn name(&self) -> &'static str {
        "remove_allocation_from_read_model"
    }

    async fn handle(&self, event: &Deallocated) -> Result<()> {
        Ok(self
            .view
            .handle(&AllocationEvent::from(event.clone()))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use common::{BatchReference, Sku};
    use domain::Aggregate;
    use product_store::InMemoryProductRepository;

    use super::*;
    use crate::adapters::{InMemoryNotifications, InMemoryPublisher};
    use crate::unit_of_work::EventSource;

    fn uow() -> Arc<UnitOfWork<InMemoryProductRepository>> {
        Arc::new(UnitOfWork::new(Arc::new(InMemoryProductRepository::new())))
    }

    #[tokio::test]
    async fn add_batch_creates_product() {
        let uow = uow();
        let handler = AddBatchHandler::new(Arc::clone(&uow));

        let outcome = handler
            .handle(&CreateBatch::new("b1", "LAMP", 100, None))
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Completed);
        let product = uow.repository().get(&Sku::new("LAMP")).await.unwrap().unwrap();
        assert_eq!(product.batches().len(), 1);
        assert_eq!(product.version().as_i64(), 1);
    }

    #[tokio::test]
    async fn add_batch_appends_to_existing_product() {
        let uow = uow();
        let handler = AddBatchHandler::new(Arc::clone(&uow));
        handler
            .handle(&CreateBatch::new("b1", "LAMP", 100, None))
            .await
            .unwrap();
        handler
            .handle(&CreateBatch::new("b2", "LAMP", 50, None))
            .await
            .unwrap();

        let product = uow.repository().get(&Sku::new("LAMP")).await.unwrap().unwrap();
        assert_eq!(product.batches().len(), 2);
        assert_eq!(product.available_quantity(), 150);
    }

    #[tokio::test]
    async fn add_batch_rejects_reference_used_by_another_product() {
        let uow = uow();
        let handler = AddBatchHandler::new(Arc::clone(&uow));
        handler
            .handle(&CreateBatch::new("b1", "LAMP", 100, None))
            .await
            .unwrap();

        let result = handler
            .handle(&CreateBatch::new("b1", "CHAIR", 10, None))
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Domain(AllocationError::DuplicateBatch(_)))
        ));
        assert!(uow.repository().get(&Sku::new("CHAIR")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn allocate_returns_batch_reference() {
        let uow = uow();
        AddBatchHandler::new(Arc::clone(&uow))
            .handle(&CreateBatch::new("b1", "LAMP", 100, None))
            .await
            .unwrap();

        let outcome = AllocateHandler::new(Arc::clone(&uow))
            .handle(&Allocate::new("o1", "LAMP", 10))
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Allocated(BatchReference::new("b1")));
    }

    #[tokio::test]
    async fn allocate_unknown_sku_is_invalid() {
        let uow = uow();
        let result = AllocateHandler::new(Arc::clone(&uow))
            .handle(&Allocate::new("o1", "NONEXISTENT", 10))
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidSku(_))));
        assert!(uow.collect_new_events().await.is_empty());
    }

    #[tokio::test]
    async fn allocate_out_of_stock_releases_event() {
        let uow = uow();
        AddBatchHandler::new(Arc::clone(&uow))
            .handle(&CreateBatch::new("b1", "LAMP", 5, None))
            .await
            .unwrap();
        uow.collect_new_events().await;

        let outcome = AllocateHandler::new(Arc::clone(&uow))
            .handle(&Allocate::new("o1", "LAMP", 10))
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::NotAllocated);
        let events = uow.collect_new_events().await;
        assert!(matches!(events[..], [AllocationEvent::OutOfStock(_)]));
    }

    #[tokio::test]
    async fn change_quantity_of_unknown_batch_fails() {
        let uow = uow();
        let result = ChangeBatchQuantityHandler::new(uow)
            .handle(&ChangeBatchQuantity::new("b9", 10))
            .await;

        assert!(matches!(result, Err(ServiceError::UnknownBatch(_))));
    }

    #[tokio::test]
    async fn out_of_stock_notification_message() {
        let notifications = Arc::new(InMemoryNotifications::new());
        let handler = OutOfStockNotificationHandler::new(Arc::clone(&notifications), "stock@made.com");

        handler
            .handle(&OutOfStock { sku: "LAMP".into() })
            .await
            .unwrap();

        assert_eq!(
            notifications.sent_to("stock@made.com").await,
            vec!["Out of stock for LAMP".to_string()]
        );
    }

    #[tokio::test]
    async fn publish_allocated_uses_topic() {
        let publisher = Arc::new(InMemoryPublisher::new());
        let handler = PublishAllocatedHandler::new(Arc::clone(&publisher), "line_allocated");

        handler
            .handle(&Allocated {
                order_id: "o1".into(),
                sku: "LAMP".into(),
                quantity: 1,
                batch_reference: "b1".into(),
            })
            .await
            .unwrap();

        assert_eq!(publisher.messages_on("line_allocated").await.len(), 1);
    }
}
