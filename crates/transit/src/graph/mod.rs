//! The mutable transit graph and its narrative cache.

pub mod narrative;
pub mod store;

pub use narrative::NarrativeStore;
pub use store::TransitGraphStore;
