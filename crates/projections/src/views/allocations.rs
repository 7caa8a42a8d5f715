//! Allocations read model: which batch holds each order line.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BatchReference, OrderId, Sku};
use domain::{AllocationEvent, DomainEvent, OrderLine};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::{ProjectionError, Result};

/// One allocated line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub sku: Sku,
    pub quantity: u32,
    pub batch_reference: BatchReference,
}

struct AllocationsState {
    rows: HashMap<OrderLine, BatchReference>,
    position: ProjectionPosition,
}

/// Read model mapping each allocated order line to the batch it sits in.
///
/// Rows are keyed by the whole line, so an order holding two lines of one
/// SKU with different quantities keeps a row for each. A row appears on
/// `Allocated` and disappears on the `Deallocated` of the same line.
/// Cloning the view shares the underlying rows.
#[derive(Clone)]
pub struct AllocationsView {
    state: Arc<RwLock<AllocationsState>>,
}

impl AllocationsView {
    /// Creates a new empty view.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AllocationsState {
                rows: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Returns the allocated lines of an order, ordered by SKU then quantity.
    pub async fn allocations_for(&self, order_id: &OrderId) -> Vec<AllocationRow> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .rows
            .iter()
            .filter(|(line, _)| &line.order_id == order_id)
            .map(|(line, batch_reference)| AllocationRow {
                sku: line.sku.clone(),
                quantity: line.quantity,
                batch_reference: batch_reference.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.sku.cmp(&b.sku).then(a.quantity.cmp(&b.quantity)));
        rows
    }

    /// Returns the batch currently holding an order line.
    pub async fn batch_for(&self, line: &OrderLine) -> Option<BatchReference> {
        self.state.read().await.rows.get(line).cloned()
    }
}

impl Default for AllocationsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for AllocationsView {
    fn name(&self) -> &'static str {
        "AllocationsView"
    }

    async fn handle(&self, event: &AllocationEvent) -> Result<()> {
        let mut state = self.state.write().await;

        match event {
            AllocationEvent::Allocated(data) => {
                let line = OrderLine::new(data.order_id.clone(), data.sku.clone(), data.quantity);
                match state.rows.get(&line) {
                    Some(existing) if *existing != data.batch_reference => {
                        return Err(ProjectionError::ConflictingAllocation {
                            order_id: line.order_id,
                            sku: line.sku,
                            quantity: line.quantity,
                            existing: existing.clone(),
                            incoming: data.batch_reference.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        state.rows.insert(line, data.batch_reference.clone());
                    }
                }
            }
            AllocationEvent::Deallocated(data) => {
                let line = OrderLine::new(data.order_id.clone(), data.sku.clone(), data.quantity);
                if state.rows.remove(&line).is_none() {
                    tracing::debug!(
                        order_id = %data.order_id,
                        sku = %data.sku,
                        quantity = data.quantity,
                        "deallocated line had no row"
                    );
                }
            }
            AllocationEvent::OutOfStock(_) => {}
        }

        state.position = state.position.advance();
        metrics::counter!("projections_events_processed", "event_type" => event.event_type())
            .increment(1);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.rows.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for AllocationsView {
    fn name(&self) -> &'static str {
        "AllocationsView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.rows.len()).unwrap_or(0)
    }
}
