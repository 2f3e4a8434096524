//! Derived block indices over the static and dynamic graphs.

pub mod dynamic;
pub mod engine;
pub mod indices;

pub use dynamic::{BlockInstance, DynamicBlockIndexEngine, DynamicGraph, LayeredGraph};
pub use engine::{BlockIndexEngine, BlockIndices};
pub use indices::{BlockStopTimeIndex, BlockStopTimeRef, BlockTripIndex};
