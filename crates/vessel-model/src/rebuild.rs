use crate::error::ModelResult;

/// Copy-with-modification for builder-constructed values.
///
/// Each value type exposes a flat builder. `with_changes` reconstructs the
/// builder from an existing value, lets the caller adjust it, and builds a
/// fresh value, re-running all validation.
pub trait Rebuild: Sized {
    type Builder;

    /// A builder pre-filled with every field of `self`.
    fn to_builder(&self) -> Self::Builder;

    /// Build a value from a builder.
    fn from_builder(builder: &Self::Builder) -> ModelResult<Self>;

    /// Return a modified copy of `self`.
    fn with_changes(&self, change: impl FnOnce(&mut Self::Builder)) -> ModelResult<Self> {
        let mut builder = self.to_builder();
        change(&mut builder);
        Self::from_builder(&builder)
    }
}
