//! Core projection trait and position tracking.

use async_trait::async_trait;
use domain::AllocationEvent;

use crate::Result;

/// Tracks how many events a projection has applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Number of events applied by this projection.
    pub events_processed: u64,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self {
            events_processed: 0,
        }
    }

    /// Advances the position by one event.
    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// A projection that applies allocation events to a read model.
///
/// Every event is offered to the projection, including the ones it has no
/// interest in; those only advance its position.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Applies a single event to the read model.
    async fn handle(&self, event: &AllocationEvent) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
