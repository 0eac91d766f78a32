//! Host-side data model
//!
//! Positions, ranges and selections as the editing host sees them, plus an
//! in-memory workspace that implements the [`Host`](crate::host::Host) trait.

pub mod document;
pub mod position;
pub mod selection;
pub mod workspace;

pub use position::{HostPosition, HostRange};
pub use selection::Selection;
