//! Handler traits and the registry the message bus dispatches through.

use std::collections::HashMap;

use async_trait::async_trait;
use common::BatchReference;
use domain::{
    Allocate, Allocated, AllocationEvent, ChangeBatchQuantity, Command, CreateBatch, Deallocated,
    DomainEvent, OutOfStock,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// What a command achieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    /// The command was applied.
    Completed,

    /// The order line was allocated to this batch.
    Allocated(BatchReference),

    /// No batch could take the order line; an `OutOfStock` event was raised.
    NotAllocated,
}

/// A command type that can be routed to a handler.
pub trait CommandKind: Send + Sync + 'static {
    const NAME: &'static str;

    /// Borrows the concrete command out of the envelope, if it is one.
    fn extract(command: &Command) -> Option<&Self>;
}

/// An event type that can be routed to handlers.
pub trait EventKind: Send + Sync + 'static {
    const NAME: &'static str;

    /// Borrows the concrete event out of the envelope, if it is one.
    fn extract(event: &AllocationEvent) -> Option<&Self>;
}

macro_rules! route {
    ($kind:ident, $envelope:ty, $variant:path, $ty:ty, $name:expr) => {
        impl $kind for $ty {
            const NAME: &'static str = $name;

            fn extract(message: &$envelope) -> Option<&Self> {
                match message {
                    $variant(inner) => Some(inner),
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}

route!(CommandKind, Command, Command::CreateBatch, CreateBatch, "CreateBatch");
route!(CommandKind, Command, Command::Allocate, Allocate, "Allocate");
route!(
    CommandKind,
    Command,
    Command::ChangeBatchQuantity,
    ChangeBatchQuantity,
    "ChangeBatchQuantity"
);
route!(
    EventKind,
    AllocationEvent,
    AllocationEvent::Allocated,
    Allocated,
    Allocated::EVENT_TYPE
);
route!(
    EventKind,
    AllocationEvent,
    AllocationEvent::Deallocated,
    Deallocated,
    Deallocated::EVENT_TYPE
);
route!(
    EventKind,
    AllocationEvent,
    AllocationEvent::OutOfStock,
    OutOfStock,
    OutOfStock::EVENT_TYPE
);

/// Handles one kind of command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    type Command: CommandKind;

    async fn handle(&self, command: &Self::Command) -> Result<CommandOutcome>;
}

/// Handles one kind of event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    type Event: EventKind;

    /// Name used when recording a failure of this handler.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &Self::Event) -> Result<()>;
}

/// Command handler with its concrete command type erased.
#[async_trait]
pub(crate) trait DynCommandHandler: Send + Sync {
    async fn handle_command(&self, command: &Command) -> Result<CommandOutcome>;
}

#[async_trait]
impl<H: CommandHandler> DynCommandHandler for H {
    async fn handle_command(&self, command: &Command) -> Result<CommandOutcome> {
        let concrete =
            H::Command::extract(command).ok_or(ServiceError::UnroutableMessage {
                expected: H::Command::NAME,
                actual: command.command_type(),
            })?;
        self.handle(concrete).await
    }
}

/// Event handler with its concrete event type erased.
#[async_trait]
pub(crate) trait DynEventHandler: Send + Sync {
    fn handler_name(&self) -> &'static str;

    async fn handle_event(&self, event: &AllocationEvent) -> Result<()>;
}

#[async_trait]
impl<H: EventHandler> DynEventHandler for H {
    fn handler_name(&self) -> &'static str {
        self.name()
    }

    async fn handle_event(&self, event: &AllocationEvent) -> Result<()> {
        let concrete = H::Event::extract(event).ok_or(ServiceError::UnroutableMessage {
            expected: H::Event::NAME,
            actual: event.event_type(),
        })?;
        self.handle(concrete).await
    }
}

/// Maps message types to their handlers.
///
/// A command has exactly one handler. An event has any number, invoked in
/// registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    commands: HashMap<&'static str, Box<dyn DynCommandHandler>>,
    events: HashMap<&'static str, Vec<Box<dyn DynEventHandler>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for a command type.
    pub fn on_command<H>(&mut self, handler: H) -> Result<&mut Self>
    where
        H: CommandHandler + 'static,
    {
        let name = H::Command::NAME;
        if self.commands.contains_key(name) {
            return Err(ServiceError::DuplicateCommandHandler(name));
        }
        self.commands.insert(name, Box::new(handler));
        Ok(self)
    }

    /// Appends a handler for an event type.
    pub fn on_event<H>(&mut self, handler: H) -> &mut Self
    where
        H: EventHandler + 'static,
    {
        self.events
            .entry(H::Event::NAME)
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Returns true if a handler is registered for the command type.
    pub fn has_command_handler(&self, command_type: &str) -> bool {
        self.commands.contains_key(command_type)
    }

    /// Returns the handler names registered for an event type, in order.
    pub fn event_handler_names(&self, event_type: &str) -> Vec<&'static str> {
        self.event_handlers(event_type)
            .iter()
            .map(|h| h.handler_name())
            .collect()
    }

    pub(crate) fn command_handler(&self, command_type: &str) -> Option<&dyn DynCommandHandler> {
        self.commands.get(command_type).map(|h| h.as_ref())
    }

    pub(crate) fn event_handlers(&self, event_type: &str) -> &[Box<dyn DynEventHandler>] {
        self.events
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut commands: Vec<_> = self.commands.keys().collect();
        commands.sort();
        let mut events: Vec<_> = self
            .events
            .iter()
            .map(|(name, handlers)| (*name, handlers.len()))
            .collect();
        events.sort();
        f.debug_struct("HandlerRegistry")
            .field("commands", &commands)
            .field("events", &events)
            .finish()
    }
}
