//! Transit data models, types, and traits.

pub mod block;
pub mod calendar;
pub mod entities;
pub mod narrative;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use block::{BlockConfiguration, BlockEntry, BlockStopTimeEntry, BlockTripEntry};
pub use calendar::{CalendarData, CalendarException, CalendarService, ServiceCalendar, WeekdayFlags};
pub use entities::{AgencyEntry, RouteCollectionEntry, RouteEntry, ShapePoints, StopEntry, TripEntry};
pub use narrative::{RouteCollectionNarrative, StopNarrative, TripNarrative};
pub use traits::TransitGraph;
pub use types::{ServiceIds, StopTimeEntry, TransitError};
