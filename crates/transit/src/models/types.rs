//! Core data types and errors for the transit graph.

use crate::identifiers::AgencyAndId;

// ============================================================================
// Stop Times
// ============================================================================

/// A scheduled visit of a trip to a stop.
///
/// Times are seconds since midnight of the service day and may exceed 24
/// hours for trips running past midnight.
#[derive(Clone, Debug, PartialEq)]
pub struct StopTimeEntry {
    pub stop_id: AgencyAndId,
    /// Position within the trip, contiguous from 0.
    pub sequence: usize,
    /// Sequence number from the source schedule. Absent for stop-times
    /// inserted at runtime.
    pub gtfs_sequence: Option<u32>,
    pub arrival_time: i32,
    pub departure_time: i32,
    /// Metres travelled along the trip's shape.
    pub distance_along_trip: f64,
}

impl StopTimeEntry {
    pub fn new(
        stop_id: AgencyAndId,
        gtfs_sequence: u32,
        arrival_time: i32,
        departure_time: i32,
        distance_along_trip: f64,
    ) -> Self {
        Self {
            stop_id,
            sequence: 0,
            gtfs_sequence: Some(gtfs_sequence),
            arrival_time,
            departure_time,
            distance_along_trip,
        }
    }

    /// Time spent dwelling at the stop.
    pub fn slack_time(&self) -> i32 {
        self.departure_time - self.arrival_time
    }
}

/// Service ids under which a block configuration is active, kept sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceIds(Vec<AgencyAndId>);

impl ServiceIds {
    pub fn new(mut ids: Vec<AgencyAndId>) -> Self {
        ids.sort();
        ids.dedup();
        Self(ids)
    }

    pub fn single(id: AgencyAndId) -> Self {
        Self(vec![id])
    }

    pub fn contains(&self, id: &AgencyAndId) -> bool {
        self.0.binary_search(id).is_ok()
    }

    pub fn ids(&self) -> &[AgencyAndId] {
        &self.0
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Agency not found: {0}")]
    AgencyNotFound(String),

    #[error("Stop not found: {0}")]
    StopNotFound(AgencyAndId),

    #[error("Trip not found: {0}")]
    TripNotFound(AgencyAndId),

    #[error("Invalid id: {0:?}")]
    InvalidId(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;
