//! Collaborator contracts for side effects and their in-memory implementations.

pub mod notifications;
pub mod publisher;

pub use notifications::{InMemoryNotifications, Notifications, SentNotification};
pub use publisher::{InMemoryPublisher, PublishedMessage, Publisher};
