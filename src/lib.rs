//! Metadata-driven object/row mapping.
//!
//! Declare a persistent type once with `#[derive(Mapped)]`, then insert, select, update and
//! delete it through a [`Connection`] built on any driver.
pub use tether_core::*;
pub use tether_macros::*;
