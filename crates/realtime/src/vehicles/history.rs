use std::collections::VecDeque;

use dashmap::DashMap;
use headway_transit::AgencyAndId;

use crate::vehicles::records::VehicleLocationRecord;

/// Recent location records per vehicle.
pub trait VehicleLocationRecordCache: Send + Sync {
    fn add_record(&self, block_id: &AgencyAndId, record: VehicleLocationRecord);

    /// Oldest first.
    fn records_for_vehicle(&self, vehicle_id: &AgencyAndId) -> Vec<VehicleLocationRecord>;

    fn clear_records_for_vehicle(&self, vehicle_id: &AgencyAndId);
}

#[derive(Debug)]
struct History {
    block_id: AgencyAndId,
    records: VecDeque<VehicleLocationRecord>,
}

/// A bounded ring of records per vehicle. A vehicle moving to another block
/// starts a fresh history.
#[derive(Debug)]
pub struct VehicleLocationHistory {
    capacity: usize,
    histories: DashMap<AgencyAndId, History>,
}

impl VehicleLocationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            histories: DashMap::new(),
        }
    }

    pub fn block_for_vehicle(&self, vehicle_id: &AgencyAndId) -> Option<AgencyAndId> {
        self.histories.get(vehicle_id).map(|h| h.block_id.clone())
    }
}

impl VehicleLocationRecordCache for VehicleLocationHistory {
    fn add_record(&self, block_id: &AgencyAndId, record: VehicleLocationRecord) {
        let Some(vehicle_id) = record.vehicle_id.clone() else {
            return;
        };

        let mut history = self.histories.entry(vehicle_id).or_insert_with(|| History {
            block_id: block_id.clone(),
            records: VecDeque::with_capacity(self.capacity),
        });
        if &history.block_id != block_id {
            history.block_id = block_id.clone();
            history.records.clear();
        }
        if history.records.len() == self.capacity {
            history.records.pop_front();
        }
        history.records.push_back(record);
    }

    fn records_for_vehicle(&self, vehicle_id: &AgencyAndId) -> Vec<VehicleLocationRecord> {
        self.histories
            .get(vehicle_id)
            .map(|h| h.records.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_records_for_vehicle(&self, vehicle_id: &AgencyAndId) {
        self.histories.remove(vehicle_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aid(id: &str) -> AgencyAndId {
        AgencyAndId::new("1", id)
    }

    #[test]
    fn test_history_is_bounded() {
        let history = VehicleLocationHistory::new(3);
        for time in 1..=5 {
            history.add_record(&aid("block1"), VehicleLocationRecord::new(aid("bus1"), time));
        }

        let times: Vec<_> = history
            .records_for_vehicle(&aid("bus1"))
            .iter()
            .map(|r| r.time_of_record)
            .collect();
        assert_eq!(times, vec![3, 4, 5]);
    }

    #[test]
    fn test_block_change_restarts_history() {
        let history = VehicleLocationHistory::new(10);
        history.add_record(&aid("block1"), VehicleLocationRecord::new(aid("bus1"), 1));
        history.add_record(&aid("block2"), VehicleLocationRecord::new(aid("bus1"), 2));

        assert_eq!(history.records_for_vehicle(&aid("bus1")).len(), 1);
        assert_eq!(history.block_for_vehicle(&aid("bus1")), Some(aid("block2")));

        history.clear_records_for_vehicle(&aid("bus1"));
        assert!(history.records_for_vehicle(&aid("bus1")).is_empty());
        assert!(history.block_for_vehicle(&aid("bus1")).is_none());
    }
}
