//! Core aggregate and domain event traits.

use common::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is used for handler routing and for publishing.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates whose state is stored directly and whose events are
/// buffered until the surrounding unit of work commits.
///
/// An aggregate is a consistency boundary: all mutation of the entities it
/// contains goes through its root. Every state-changing operation bumps the
/// version, which the store compares on save to detect lost updates.
pub trait Aggregate: Send + Sync + Sized {
    /// The key the aggregate is stored under.
    type Key: Clone + Eq + std::fmt::Display + Send + Sync;

    /// The type of events this aggregate produces.
    type Event: DomainEvent;

    /// The type of errors this aggregate can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate's key.
    fn key(&self) -> &Self::Key;

    /// Returns the current version of the aggregate.
    fn version(&self) -> Version;

    /// Returns the events raised since the buffer was last drained.
    fn pending_events(&self) -> &[Self::Event];

    /// Drains the pending events, leaving the buffer empty.
    ///
    /// Must be called exactly once per successful save; a second call
    /// without new mutations returns nothing.
    fn take_pending_events(&mut self) -> Vec<Self::Event>;

    /// Returns true if events are waiting to be drained.
    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}
