//! Latest-known state of every vehicle.
//!
//! The raw record is stored as-is; records that can be tied to a block are
//! forwarded to the block-level listener, and vehicles that cannot are
//! actively detached from whatever block they were on.

use std::sync::Arc;

use dashmap::DashMap;
use headway_transit::{AgencyAndId, TransitGraph};
use thiserror::Error;
use tracing::debug;

use crate::vehicles::block_location::BlockVehicleLocationListener;
use crate::vehicles::history::VehicleLocationRecordCache;
use crate::vehicles::occupancy::VehicleOccupancyCache;
use crate::vehicles::records::{VehicleLocationRecord, VehicleOccupancyRecord, VehicleStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("vehicle location record has no record time")]
    MissingRecordTime,
}

pub struct VehicleStatusTracker {
    graph: Arc<dyn TransitGraph>,
    records: DashMap<AgencyAndId, VehicleLocationRecord>,
    block_locations: Arc<dyn BlockVehicleLocationListener>,
    history: Arc<dyn VehicleLocationRecordCache>,
    occupancy: Arc<VehicleOccupancyCache>,
}

impl VehicleStatusTracker {
    pub fn new(
        graph: Arc<dyn TransitGraph>,
        block_locations: Arc<dyn BlockVehicleLocationListener>,
        history: Arc<dyn VehicleLocationRecordCache>,
        occupancy: Arc<VehicleOccupancyCache>,
    ) -> Self {
        Self {
            graph,
            records: DashMap::new(),
            block_locations,
            history,
            occupancy,
        }
    }

    pub fn handle_vehicle_location_record(&self, record: VehicleLocationRecord) -> Result<(), TrackerError> {
        if record.time_of_record == 0 {
            return Err(TrackerError::MissingRecordTime);
        }

        if let Some(vehicle_id) = &record.vehicle_id {
            self.records.insert(vehicle_id.clone(), record.clone());
        }

        let mut forwarded = record;
        if forwarded.block_id.is_none() {
            if let Some((trip_id, block_id)) = forwarded.trip_id.as_ref().and_then(|t| self.resolve_block(t)) {
                forwarded.trip_id = Some(trip_id);
                forwarded.block_id = Some(block_id);
            }
        }

        if forwarded.block_id.is_some() && forwarded.service_date.is_some() {
            self.block_locations.handle_vehicle_location_record(&forwarded);
        } else if let Some(vehicle_id) = &forwarded.vehicle_id {
            debug!("vehicle {vehicle_id} has no block assignment");
            self.block_locations.reset_vehicle_location(vehicle_id);
        }
        Ok(())
    }

    /// Handles every record; the first failure is returned after the rest
    /// have been processed.
    pub fn handle_vehicle_location_records(
        &self,
        records: impl IntoIterator<Item = VehicleLocationRecord>,
    ) -> Result<(), TrackerError> {
        let mut result = Ok(());
        for record in records {
            if let Err(e) = self.handle_vehicle_location_record(record) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// First agency under which the bare trip id exists wins.
    fn resolve_block(&self, trip_id: &AgencyAndId) -> Option<(AgencyAndId, AgencyAndId)> {
        self.graph.agency_ids().iter().find_map(|agency_id| {
            let candidate = trip_id.with_agency(&**agency_id);
            self.graph
                .trip_for_id(&candidate)
                .map(|trip| (candidate, trip.block_id.clone()))
        })
    }

    pub fn reset_vehicle_location(&self, vehicle_id: &AgencyAndId) {
        self.records.remove(vehicle_id);
        self.block_locations.reset_vehicle_location(vehicle_id);
    }

    pub fn handle_vehicle_occupancy_record(&self, record: VehicleOccupancyRecord) {
        self.occupancy.add_record(record);
    }

    pub fn handle_vehicle_occupancy_records(&self, records: impl IntoIterator<Item = VehicleOccupancyRecord>) {
        for record in records {
            self.occupancy.add_record(record);
        }
    }

    pub fn reset_vehicle_occupancy(&self, vehicle_id: &AgencyAndId) {
        self.occupancy.clear_record_for_vehicle(vehicle_id);
    }

    pub fn vehicle_status_for_id(&self, vehicle_id: &AgencyAndId) -> Option<VehicleStatus> {
        let record = self.records.get(vehicle_id)?.value().clone();
        Some(VehicleStatus {
            record,
            all_records: self.history.records_for_vehicle(vehicle_id),
            occupancy: self.occupancy.last_record_for_vehicle(vehicle_id),
        })
    }

    /// Current record and occupancy of every vehicle, without history.
    pub fn all_vehicle_statuses(&self) -> Vec<VehicleStatus> {
        let mut statuses: Vec<_> = self
            .records
            .iter()
            .map(|entry| VehicleStatus {
                record: entry.value().clone(),
                all_records: Vec::new(),
                occupancy: self.occupancy.last_record_for_vehicle(entry.key()),
            })
            .collect();
        statuses.sort_by(|a, b| a.record.vehicle_id.cmp(&b.record.vehicle_id));
        statuses
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use headway_transit::{AgencyEntry, StopEntry, StopTimeEntry, TransitGraphStore, TripEntry};

    use super::*;
    use crate::vehicles::block_location::BlockLocationIndex;
    use crate::vehicles::history::VehicleLocationHistory;
    use crate::vehicles::records::OccupancyStatus;

    struct Fixture {
        tracker: VehicleStatusTracker,
        locations: Arc<BlockLocationIndex>,
    }

    fn service_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn add_trip(graph: &TransitGraphStore, agency: &str, trip: &str, block: &str) {
        let id = |s: &str| AgencyAndId::new(agency, s);
        graph.add_stop_entry(StopEntry::new(id("stopA"), 40.7, -74.0), None);
        graph
            .add_trip_entry(
                TripEntry::new(
                    id(trip),
                    id("routeA"),
                    Some(id(block)),
                    id("weekday"),
                    vec![StopTimeEntry::new(id("stopA"), 1, 3600, 3600, 0.0)],
                ),
                None,
            )
            .unwrap();
    }

    fn fixture() -> Fixture {
        let graph = Arc::new(TransitGraphStore::new());
        graph.add_agency(AgencyEntry::new("1", "America/New_York"));
        graph.add_agency(AgencyEntry::new("2", "America/New_York"));
        add_trip(&graph, "1", "trip1", "block1");
        // Same bare trip id under both agencies
        add_trip(&graph, "1", "shared", "blockOne");
        add_trip(&graph, "2", "shared", "blockTwo");

        let history = Arc::new(VehicleLocationHistory::new(5));
        let locations = Arc::new(BlockLocationIndex::new(history.clone()));
        let tracker = VehicleStatusTracker::new(
            graph,
            locations.clone(),
            history,
            Arc::new(VehicleOccupancyCache::default()),
        );
        Fixture { tracker, locations }
    }

    fn bus() -> AgencyAndId {
        AgencyAndId::new("1", "bus1")
    }

    #[test]
    fn test_missing_record_time() {
        let fixture = fixture();
        let record = VehicleLocationRecord::new(bus(), 0);
        assert_eq!(
            fixture.tracker.handle_vehicle_location_record(record),
            Err(TrackerError::MissingRecordTime)
        );
        assert!(fixture.tracker.vehicle_status_for_id(&bus()).is_none());
    }

    #[test]
    fn test_trip_resolves_to_block() {
        let fixture = fixture();
        let record = VehicleLocationRecord::new(bus(), 1000)
            .with_trip(AgencyAndId::new("feed", "trip1"))
            .with_service_date(service_date());
        fixture.tracker.handle_vehicle_location_record(record).unwrap();

        let location = fixture.locations.location_for_vehicle(&bus()).unwrap();
        assert_eq!(location.block_id, AgencyAndId::new("1", "block1"));
        assert_eq!(location.record.trip_id, Some(AgencyAndId::new("1", "trip1")));

        // The stored record is the one that came in
        let status = fixture.tracker.vehicle_status_for_id(&bus()).unwrap();
        assert_eq!(status.record.trip_id, Some(AgencyAndId::new("feed", "trip1")));
        assert_eq!(status.all_records.len(), 1);
    }

    #[test]
    fn test_first_agency_wins() {
        let fixture = fixture();
        let record = VehicleLocationRecord::new(bus(), 1000)
            .with_trip(AgencyAndId::new("2", "shared"))
            .with_service_date(service_date());
        fixture.tracker.handle_vehicle_location_record(record).unwrap();

        let location = fixture.locations.location_for_vehicle(&bus()).unwrap();
        assert_eq!(location.block_id, AgencyAndId::new("1", "blockOne"));
    }

    #[test]
    fn test_lost_assignment_resets_block_location() {
        let fixture = fixture();
        let assigned = VehicleLocationRecord::new(bus(), 1000)
            .with_block(AgencyAndId::new("1", "block1"))
            .with_service_date(service_date());
        fixture.tracker.handle_vehicle_location_record(assigned).unwrap();
        assert!(fixture.locations.location_for_vehicle(&bus()).is_some());

        let lost = VehicleLocationRecord::new(bus(), 2000)
            .with_trip(AgencyAndId::new("1", "unknownTrip"))
            .with_service_date(service_date());
        fixture.tracker.handle_vehicle_location_record(lost.clone()).unwrap();

        assert!(fixture.locations.location_for_vehicle(&bus()).is_none());
        let status = fixture.tracker.vehicle_status_for_id(&bus()).unwrap();
        assert_eq!(status.record, lost);
        assert!(status.all_records.is_empty());
    }

    #[test]
    fn test_missing_service_date_is_not_forwarded() {
        let fixture = fixture();
        let record = VehicleLocationRecord::new(bus(), 1000).with_block(AgencyAndId::new("1", "block1"));
        fixture.tracker.handle_vehicle_location_record(record).unwrap();
        assert!(fixture.locations.location_for_vehicle(&bus()).is_none());
        assert!(fixture.tracker.vehicle_status_for_id(&bus()).is_some());
    }

    #[test]
    fn test_batch_reports_first_error() {
        let fixture = fixture();
        let other = AgencyAndId::new("1", "bus2");
        let result = fixture.tracker.handle_vehicle_location_records([
            VehicleLocationRecord::new(bus(), 0),
            VehicleLocationRecord::new(other.clone(), 1000),
        ]);
        assert_eq!(result, Err(TrackerError::MissingRecordTime));
        assert!(fixture.tracker.vehicle_status_for_id(&other).is_some());
    }

    #[test]
    fn test_reset_and_statuses() {
        let fixture = fixture();
        let other = AgencyAndId::new("1", "bus2");
        fixture
            .tracker
            .handle_vehicle_location_record(VehicleLocationRecord::new(bus(), 1000))
            .unwrap();
        fixture
            .tracker
            .handle_vehicle_location_record(VehicleLocationRecord::new(other.clone(), 1000))
            .unwrap();
        fixture.tracker.handle_vehicle_occupancy_records([VehicleOccupancyRecord {
            vehicle_id: bus(),
            route_id: None,
            direction_id: None,
            status: OccupancyStatus::FewSeatsAvailable,
            timestamp: 1000,
        }]);

        let statuses = fixture.tracker.all_vehicle_statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(
            statuses[0].occupancy.as_ref().map(|o| o.status),
            Some(OccupancyStatus::FewSeatsAvailable)
        );
        assert!(statuses[1].occupancy.is_none());

        fixture.tracker.reset_vehicle_occupancy(&bus());
        fixture.tracker.reset_vehicle_location(&other);
        let statuses = fixture.tracker.all_vehicle_statuses();
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].occupancy.is_none());
    }
}
