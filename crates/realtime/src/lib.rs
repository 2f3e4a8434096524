//! # headway-realtime
//!
//! Realtime ingestion on top of `headway-transit`: GTFS-Sometimes schedule
//! patching, vehicle status tracking, feed flag registries and the
//! fixed-delay scheduler that drives feed adapters.
//!
//! Everything is an explicit state object; wire them together once at
//! startup and share them behind `Arc`s.

pub mod config;
pub mod engine;
pub mod logging;
pub mod registries;
pub mod revenue;
pub mod scheduler;
pub mod sometimes;
pub mod vehicles;

pub mod prelude {
    pub use crate::config::{ConfigError, EngineConfig};
    pub use crate::engine::RealtimeEngine;
    pub use crate::logging::setup_logging;
    pub use crate::registries::{
        CancelledTrip, CancelledTripRegistry, KneelingVehicleRegistry, StrollerVehicleRegistry,
    };
    pub use crate::revenue::RevenueSearchIndex;
    pub use crate::scheduler::FeedScheduler;
    pub use crate::sometimes::{
        PatchReport, ScheduleChangePatcher, ServiceChange, ServiceChangeFeed, SystemTimeService,
        TimeService,
    };
    pub use crate::vehicles::{
        BlockLocationIndex, TrackerError, VehicleLocationHistory, VehicleLocationRecord,
        VehicleOccupancyCache, VehicleOccupancyRecord, VehicleStatus, VehicleStatusTracker,
    };
}
