use dashmap::DashMap;
use headway_transit::AgencyAndId;

use crate::vehicles::records::VehicleOccupancyRecord;

/// Last occupancy report per vehicle.
#[derive(Debug, Default)]
pub struct VehicleOccupancyCache {
    records: DashMap<AgencyAndId, VehicleOccupancyRecord>,
}

impl VehicleOccupancyCache {
    /// Keeps the newer of the stored and incoming record.
    pub fn add_record(&self, record: VehicleOccupancyRecord) {
        self.records
            .entry(record.vehicle_id.clone())
            .and_modify(|current| {
                if record.timestamp >= current.timestamp {
                    *current = record.clone();
                }
            })
            .or_insert_with(|| record.clone());
    }

    pub fn last_record_for_vehicle(&self, vehicle_id: &AgencyAndId) -> Option<VehicleOccupancyRecord> {
        self.records.get(vehicle_id).map(|r| r.value().clone())
    }

    pub fn clear_record_for_vehicle(&self, vehicle_id: &AgencyAndId) {
        self.records.remove(vehicle_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicles::records::OccupancyStatus;

    fn record(status: OccupancyStatus, timestamp: i64) -> VehicleOccupancyRecord {
        VehicleOccupancyRecord {
            vehicle_id: AgencyAndId::new("1", "bus1"),
            route_id: None,
            direction_id: None,
            status,
            timestamp,
        }
    }

    #[test]
    fn test_keeps_newest_record() {
        let cache = VehicleOccupancyCache::default();
        let bus = AgencyAndId::new("1", "bus1");
        cache.add_record(record(OccupancyStatus::Full, 200));
        cache.add_record(record(OccupancyStatus::Empty, 100));
        assert_eq!(
            cache.last_record_for_vehicle(&bus).unwrap().status,
            OccupancyStatus::Full
        );

        cache.clear_record_for_vehicle(&bus);
        assert!(cache.last_record_for_vehicle(&bus).is_none());
    }
}
