//! Read models for the query side of the allocation service.
//!
//! - [`Projection`] trait for applying allocation events to a read model
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`AllocationsView`]: which batch each order line ended up in

pub mod error;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{AllocationRow, AllocationsView};
