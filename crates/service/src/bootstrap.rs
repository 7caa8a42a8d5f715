//! Wiring of collaborators, handlers and the message bus.

use std::sync::Arc;

use product_store::{InMemoryProductRepository, ProductRepository};
use projections::AllocationsView;

use crate::adapters::{InMemoryNotifications, InMemoryPublisher, Notifications, Publisher};
use crate::config::Config;
use crate::error::Result;
use crate::handlers::{
    AddAllocationToReadModel, AddBatchHandler, AllocateHandler, ChangeBatchQuantityHandler,
    OutOfStockNotificationHandler, PublishAllocatedHandler, ReallocateHandler,
    RemoveAllocationFromReadModel,
};
use crate::messagebus::{MessageBus, RetryPolicy};
use crate::registry::HandlerRegistry;
use crate::unit_of_work::UnitOfWork;

/// Builds a message bus with every handler registered.
///
/// Each bus gets its own unit of work; buses built over the same repository
/// can serve concurrent callers and are kept consistent by the repository's
/// version checks.
pub fn bootstrap<R, N, P>(
    config: &Config,
    repository: Arc<R>,
    notifications: Arc<N>,
    publisher: Arc<P>,
    view: AllocationsView,
) -> Result<MessageBus>
where
    R: ProductRepository + 'static,
    N: Notifications + 'static,
    P: Publisher + 'static,
{
    let uow = Arc::new(UnitOfWork::new(repository));

    let mut registry = HandlerRegistry::new();
    registry
        .on_command(AddBatchHandler::new(Arc::clone(&uow)))?
        .on_command(AllocateHandler::new(Arc::clone(&uow)))?
        .on_command(ChangeBatchQuantityHandler::new(Arc::clone(&uow)))?;
    registry
        .on_event(PublishAllocatedHandler::new(
            publisher,
            config.publish_topic.clone(),
        ))
        .on_event(AddAllocationToReadModel::new(view.clone()))
        .on_event(RemoveAllocationFromReadModel::new(view))
        .on_event(ReallocateHandler::new(Arc::clone(&uow)))
        .on_event(OutOfStockNotificationHandler::new(
            notifications,
            config.stock_alert_address.clone(),
        ));

    tracing::debug!(?registry, "handlers registered");
    Ok(MessageBus::new(
        registry,
        uow,
        RetryPolicy::new(config.max_attempts),
    ))
}

/// In-memory collaborators for a single-process deployment.
///
/// Clones share state, so every bus built from the same collaborators sees
/// the same products, messages and read model.
#[derive(Clone, Default)]
pub struct InMemoryCollaborators {
    pub repository: Arc<InMemoryProductRepository>,
    pub notifications: Arc<InMemoryNotifications>,
    pub publisher: Arc<InMemoryPublisher>,
    pub view: AllocationsView,
}

impl InMemoryCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a new bus over these collaborators.
    pub fn bus(&self, config: &Config) -> Result<MessageBus> {
        bootstrap(
            config,
            Arc::clone(&self.repository),
            Arc::clone(&self.notifications),
            Arc::clone(&self.publisher),
            self.view.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use domain::{Allocated, Deallocated, OutOfStock};

    use super::*;

    #[test]
    fn registers_every_handler_in_order() {
        let bus = InMemoryCollaborators::new().bus(&Config::default()).unwrap();
        let registry = bus.registry();

        for command in ["CreateBatch", "Allocate", "ChangeBatchQuantity"] {
            assert!(registry.has_command_handler(command), "{command}");
        }
        assert_eq!(
            registry.event_handler_names(Allocated::EVENT_TYPE),
            vec!["publish_allocated_event", "add_allocation_to_read_model"]
        );
        assert_eq!(
            registry.event_handler_names(Deallocated::EVENT_TYPE),
            vec!["remove_allocation_from_read_model", "reallocate"]
        );
        assert_eq!(
            registry.event_handler_names(OutOfStock::EVENT_TYPE),
            vec!["send_out_of_stock_notification"]
        );
    }

    #[test]
    fn retry_policy_follows_config() {
        let config = Config {
            max_attempts: 7,
            ..Config::default()
        };
        let bus = InMemoryCollaborators::new().bus(&config).unwrap();
        assert_eq!(bus.retry_policy(), RetryPolicy::new(7));
    }
}
