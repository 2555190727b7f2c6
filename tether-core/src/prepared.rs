use crate::{Result, Value};
use std::fmt::Display;

/// A parameterized, backend-prepared statement handle.
///
/// # Binding Semantics
/// * `bind` appends a value (driver chooses actual placeholder numbering).
/// * `bind_index` sets the parameter at `index` (from 0).
///
/// Values arrive already converted to the variant of their column, drivers only translate
/// them to the native representation.
pub trait Prepared: Send + Sync + Display {
    /// Append a parameter value.
    fn bind(&mut self, value: Value) -> Result<&mut Self>;
    /// Bind a value at a specific index.
    fn bind_index(&mut self, value: Value, index: u64) -> Result<&mut Self>;
}
