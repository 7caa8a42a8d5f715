//! Persistence of product aggregates.
//!
//! - [`ProductRepository`]: storage contract with optimistic concurrency
//! - [`ProductChange`] and [`ExpectedVersion`]: what a commit asks the store to write
//! - [`InMemoryProductRepository`]: shared in-process implementation

pub mod error;
pub mod memory;
pub mod store;

pub use common::{BatchReference, Sku, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryProductRepository;
pub use store::{ExpectedVersion, ProductChange, ProductRepository};
