//! # headway-transit
//!
//! In-memory transit graph with realtime-safe mutation and derived block
//! indices.
//!
//! ## Features
//!
//! - **Copy-on-write graph**: readers never see a half-applied mutation
//! - **Block snapshots**: block configurations are rebuilt from their trips on every change
//! - **Lazy indices**: per-stop, per-block, per-agency and per-route-collection indices rebuilt on version change
//! - **Dynamic blocks**: runtime trips indexed alongside the static schedule
//! - **Id resolution**: bare feed ids tried across candidate agencies
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use headway_transit::prelude::*;
//!
//! let graph = Arc::new(TransitGraphStore::new());
//! graph.add_agency(AgencyEntry::new("1", "America/New_York"));
//! graph.add_stop_entry(StopEntry::new(AgencyAndId::new("1", "stopA"), 40.70, -74.00), None);
//! graph.add_stop_entry(StopEntry::new(AgencyAndId::new("1", "stopB"), 40.71, -74.00), None);
//!
//! let trip = TripEntry::new(
//!     AgencyAndId::new("1", "tripA"),
//!     AgencyAndId::new("1", "routeA"),
//!     None,
//!     AgencyAndId::new("1", "weekday"),
//!     vec![
//!         StopTimeEntry::new(AgencyAndId::new("1", "stopA"), 1, 28800, 28800, 0.0),
//!         StopTimeEntry::new(AgencyAndId::new("1", "stopB"), 2, 29100, 29100, 1100.0),
//!     ],
//! );
//! graph.add_trip_entry(trip, None).unwrap();
//!
//! let engine = BlockIndexEngine::new(graph.clone());
//! assert_eq!(engine.stop_time_indices_for_stop(&AgencyAndId::new("1", "stopB")).len(), 1);
//!
//! graph.delete_stop_time(&AgencyAndId::new("1", "tripA"), &AgencyAndId::new("1", "stopB"));
//! assert!(engine.stop_time_indices_for_stop(&AgencyAndId::new("1", "stopB")).is_empty());
//! ```

pub mod blocks;
pub mod graph;
pub mod identifiers;
pub mod models;
pub mod resolver;
pub mod spatial;
pub mod sync;

// Re-exports for convenience
pub mod prelude {
    pub use crate::blocks::{
        BlockIndexEngine, BlockInstance, BlockStopTimeIndex, BlockTripIndex,
        DynamicBlockIndexEngine, DynamicGraph, LayeredGraph,
    };
    pub use crate::graph::{NarrativeStore, TransitGraphStore};
    pub use crate::identifiers::*;
    pub use crate::models::*;
    pub use crate::resolver::{EntityIdResolver, EntityKind};
}

pub use prelude::*;
