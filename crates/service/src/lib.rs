//! Service layer of the stock allocation system.
//!
//! - [`UnitOfWork`] and [`Transaction`]: atomic access to product aggregates
//! - [`MessageBus`]: runs a command and every event it cascades into
//! - [`handlers`]: the use cases, bound to their collaborators at construction
//! - [`adapters`]: notification and publishing contracts
//! - [`bootstrap()`]: wires all of the above together

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod messagebus;
pub mod registry;
pub mod telemetry;
pub mod unit_of_work;

pub use adapters::{
    InMemoryNotifications, InMemoryPublisher, Notifications, PublishedMessage, Publisher,
    SentNotification,
};
pub use bootstrap::{InMemoryCollaborators, bootstrap};
pub use config::{Config, LogFormat};
pub use error::{Result, ServiceError};
pub use messagebus::{
    DEFAULT_FAILURE_CAPACITY, HandlerFailure, Message, MessageBus, RetryPolicy,
};
pub use registry::{
    CommandHandler, CommandKind, CommandOutcome, EventHandler, EventKind, HandlerRegistry,
};
pub use telemetry::init_tracing;
pub use unit_of_work::{EventSource, Transaction, UnitOfWork};
