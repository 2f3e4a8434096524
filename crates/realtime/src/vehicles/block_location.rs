use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use headway_transit::AgencyAndId;
use tracing::debug;

use crate::vehicles::history::VehicleLocationRecordCache;
use crate::vehicles::records::VehicleLocationRecord;

/// Receives records that were matched to a block.
pub trait BlockVehicleLocationListener: Send + Sync {
    fn handle_vehicle_location_record(&self, record: &VehicleLocationRecord);

    /// Drops whatever block the vehicle was associated with.
    fn reset_vehicle_location(&self, vehicle_id: &AgencyAndId);
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockLocation {
    pub block_id: AgencyAndId,
    pub service_date: NaiveDate,
    pub record: VehicleLocationRecord,
}

/// Current block of every vehicle, with history kept in a record cache.
pub struct BlockLocationIndex {
    locations: DashMap<AgencyAndId, BlockLocation>,
    history: Arc<dyn VehicleLocationRecordCache>,
}

impl BlockLocationIndex {
    pub fn new(history: Arc<dyn VehicleLocationRecordCache>) -> Self {
        Self {
            locations: DashMap::new(),
            history,
        }
    }

    pub fn location_for_vehicle(&self, vehicle_id: &AgencyAndId) -> Option<BlockLocation> {
        self.locations.get(vehicle_id).map(|l| l.value().clone())
    }

    pub fn vehicles_for_block(&self, block_id: &AgencyAndId) -> Vec<AgencyAndId> {
        let mut vehicles: Vec<_> = self
            .locations
            .iter()
            .filter(|l| &l.block_id == block_id)
            .map(|l| l.key().clone())
            .collect();
        vehicles.sort();
        vehicles
    }
}

impl BlockVehicleLocationListener for BlockLocationIndex {
    fn handle_vehicle_location_record(&self, record: &VehicleLocationRecord) {
        let (Some(vehicle_id), Some(block_id), Some(service_date)) =
            (&record.vehicle_id, &record.block_id, record.service_date)
        else {
            return;
        };

        self.history.add_record(block_id, record.clone());
        self.locations.insert(
            vehicle_id.clone(),
            BlockLocation {
                block_id: block_id.clone(),
                service_date,
                record: record.clone(),
            },
        );
    }

    fn reset_vehicle_location(&self, vehicle_id: &AgencyAndId) {
        if let Some((_, location)) = self.locations.remove(vehicle_id) {
            debug!("vehicle {vehicle_id} left block {}", location.block_id);
        }
        self.history.clear_records_for_vehicle(vehicle_id);
    }
}
