//! Spatial indexing and query utilities.

pub mod index;
pub mod queries;

pub use index::StopNode;
pub use queries::{bounds_around, haversine_distance};
