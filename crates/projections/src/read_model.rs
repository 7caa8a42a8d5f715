//! Read model trait for query-side views.

/// A read model providing query access to denormalized data.
///
/// Read models are updated by projections and never consulted by the
/// allocation domain itself.
pub trait ReadModel: Send + Sync {
    /// Returns the name of this read model.
    fn name(&self) -> &'static str;

    /// Returns the number of rows in this read model.
    fn count(&self) -> usize;
}
