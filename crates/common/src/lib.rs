//! Identifiers and the optimistic-concurrency token shared by every crate.

pub mod types;
pub mod version;

pub use types::{BatchReference, OrderId, Sku};
pub use version::Version;
