//! Vehicle location and occupancy tracking.

pub mod block_location;
pub mod history;
pub mod occupancy;
pub mod records;
pub mod tracker;

pub use block_location::{BlockLocation, BlockLocationIndex, BlockVehicleLocationListener};
pub use history::{VehicleLocationHistory, VehicleLocationRecordCache};
pub use occupancy::VehicleOccupancyCache;
pub use records::{OccupancyStatus, VehicleLocationRecord, VehicleOccupancyRecord, VehicleStatus};
pub use tracker::{TrackerError, VehicleStatusTracker};
