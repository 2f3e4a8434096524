use chrono::NaiveDate;
use headway_transit::AgencyAndId;
use serde::Deserialize;

/// A vehicle position report as handed over by a feed adapter.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VehicleLocationRecord {
    pub vehicle_id: Option<AgencyAndId>,
    pub trip_id: Option<AgencyAndId>,
    pub block_id: Option<AgencyAndId>,
    pub service_date: Option<NaiveDate>,
    /// Milliseconds since the epoch. Zero is rejected.
    pub time_of_record: i64,
    pub current_location_lat: Option<f64>,
    pub current_location_lon: Option<f64>,
    pub distance_along_block: Option<f64>,
    /// Seconds late (positive) or early (negative).
    pub schedule_deviation: Option<f64>,
    pub phase: Option<String>,
    pub status: Option<String>,
}

impl VehicleLocationRecord {
    pub fn new(vehicle_id: AgencyAndId, time_of_record: i64) -> Self {
        Self {
            vehicle_id: Some(vehicle_id),
            time_of_record,
            ..Self::default()
        }
    }

    pub fn with_trip(mut self, trip_id: AgencyAndId) -> Self {
        self.trip_id = Some(trip_id);
        self
    }

    pub fn with_block(mut self, block_id: AgencyAndId) -> Self {
        self.block_id = Some(block_id);
        self
    }

    pub fn with_service_date(mut self, service_date: NaiveDate) -> Self {
        self.service_date = Some(service_date);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupancyStatus {
    Empty,
    ManySeatsAvailable,
    FewSeatsAvailable,
    StandingRoomOnly,
    CrushedStandingRoomOnly,
    Full,
    NotAcceptingPassengers,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VehicleOccupancyRecord {
    pub vehicle_id: AgencyAndId,
    #[serde(default)]
    pub route_id: Option<AgencyAndId>,
    #[serde(default)]
    pub direction_id: Option<String>,
    pub status: OccupancyStatus,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
}

/// Everything known about one vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleStatus {
    pub record: VehicleLocationRecord,
    /// Recent records, oldest first.
    pub all_records: Vec<VehicleLocationRecord>,
    pub occupancy: Option<VehicleOccupancyRecord>,
}
