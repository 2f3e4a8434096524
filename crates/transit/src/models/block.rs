//! Blocks: a vehicle's continuous run across one or more trips.
//!
//! A [`BlockConfiguration`] is built from the current trips of a block and
//! snapshots their stop-times into a block-level list. Configurations are
//! never edited in place; when a member trip changes the store builds a new
//! configuration from the new trip and swaps it in.

use std::collections::HashMap;
use std::sync::Arc;

use crate::identifiers::AgencyAndId;
use crate::models::entities::TripEntry;
use crate::models::types::{ServiceIds, StopTimeEntry};

#[derive(Clone, Debug)]
pub struct BlockEntry {
    pub id: AgencyAndId,
    pub configurations: Vec<Arc<BlockConfiguration>>,
}

impl BlockEntry {
    pub fn new(id: AgencyAndId) -> Self {
        Self {
            id,
            configurations: Vec::new(),
        }
    }

    pub fn trip_ids(&self) -> impl Iterator<Item = &AgencyAndId> {
        self.configurations
            .iter()
            .flat_map(|config| config.trips.iter().map(|bt| &bt.trip.id))
    }
}

/// A trip's position within a block configuration.
#[derive(Clone, Debug)]
pub struct BlockTripEntry {
    pub trip: Arc<TripEntry>,
    pub sequence: usize,
    /// Index into [`BlockConfiguration::stop_times`] of this trip's first stop-time.
    pub accumulated_stop_time_index: usize,
    pub distance_from_block_start: f64,
}

/// A stop-time as seen from the block.
#[derive(Clone, Debug)]
pub struct BlockStopTimeEntry {
    pub stop_time: StopTimeEntry,
    pub trip_id: AgencyAndId,
    pub block_sequence: usize,
    pub trip_sequence: usize,
    pub distance_along_block: f64,
}

#[derive(Clone, Debug)]
pub struct BlockConfiguration {
    pub block_id: AgencyAndId,
    pub service_ids: ServiceIds,
    pub trips: Vec<BlockTripEntry>,
    /// Deadhead distance before each trip, aligned with `trips`.
    pub trip_gap_distances: Vec<f64>,
    stop_times: Vec<BlockStopTimeEntry>,
}

impl BlockConfiguration {
    pub fn builder(block_id: AgencyAndId, service_ids: ServiceIds) -> BlockConfigurationBuilder {
        BlockConfigurationBuilder {
            block_id,
            service_ids,
            trips: Vec::new(),
            trip_gap_distances: HashMap::new(),
        }
    }

    pub fn stop_times(&self) -> &[BlockStopTimeEntry] {
        &self.stop_times
    }

    pub fn trip_index(&self, trip_id: &AgencyAndId) -> Option<usize> {
        self.trips.iter().position(|bt| &bt.trip.id == trip_id)
    }

    /// Block-level stop-times belonging to one trip.
    pub fn stop_times_for_trip(&self, trip_id: &AgencyAndId) -> Option<&[BlockStopTimeEntry]> {
        let index = self.trip_index(trip_id)?;
        let start = self.trips[index].accumulated_stop_time_index;
        let end = self
            .trips
            .get(index + 1)
            .map(|next| next.accumulated_stop_time_index)
            .unwrap_or(self.stop_times.len());
        Some(&self.stop_times[start..end])
    }

    pub fn total_block_distance(&self) -> f64 {
        self.trips
            .last()
            .map(|bt| bt.distance_from_block_start + bt.trip.total_trip_distance)
            .unwrap_or_default()
    }

    pub fn trip_gap_distance(&self, trip_id: &AgencyAndId) -> Option<f64> {
        self.trip_index(trip_id)
            .map(|index| self.trip_gap_distances[index])
    }

    /// Same service ids, rebuilt from the given replacement trips. Surviving
    /// trips keep their gap distance; new trips start with none.
    pub fn rebuilt_with(&self, trips: Vec<Arc<TripEntry>>) -> Option<Arc<BlockConfiguration>> {
        let gaps = self
            .trips
            .iter()
            .zip(&self.trip_gap_distances)
            .map(|(bt, gap)| (bt.trip.id.clone(), *gap));
        BlockConfiguration::builder(self.block_id.clone(), self.service_ids.clone())
            .trip_gap_distances(gaps)
            .trips(trips)
            .build()
            .map(Arc::new)
    }
}

pub struct BlockConfigurationBuilder {
    block_id: AgencyAndId,
    service_ids: ServiceIds,
    trips: Vec<Arc<TripEntry>>,
    trip_gap_distances: HashMap<AgencyAndId, f64>,
}

impl BlockConfigurationBuilder {
    pub fn trips(mut self, trips: Vec<Arc<TripEntry>>) -> Self {
        self.trips = trips;
        self
    }

    /// Deadhead distance before each listed trip. Unlisted trips get 0.
    pub fn trip_gap_distances(mut self, gaps: impl IntoIterator<Item = (AgencyAndId, f64)>) -> Self {
        self.trip_gap_distances.extend(gaps);
        self
    }

    /// Returns `None` when there are no trips left to form a configuration.
    pub fn build(mut self) -> Option<BlockConfiguration> {
        if self.trips.is_empty() {
            return None;
        }

        self.trips
            .sort_by_key(|trip| (trip.first_departure().unwrap_or(i32::MAX), trip.id.clone()));

        let gaps: Vec<f64> = self
            .trips
            .iter()
            .map(|trip| self.trip_gap_distances.get(&trip.id).copied().unwrap_or_default())
            .collect();

        for pair in self.trips.windows(2) {
            if let (Some(end), Some(start)) = (pair[0].last_arrival(), pair[1].first_departure()) {
                if start < end {
                    tracing::warn!(
                        "block {} has overlapping trips {} and {}",
                        self.block_id,
                        pair[0].id,
                        pair[1].id
                    );
                }
            }
        }

        let mut trips = Vec::with_capacity(self.trips.len());
        let mut stop_times = Vec::new();
        let mut distance = 0.0;

        for (sequence, trip) in self.trips.into_iter().enumerate() {
            distance += gaps[sequence];
            let accumulated_stop_time_index = stop_times.len();
            for stop_time in trip.stop_times() {
                stop_times.push(BlockStopTimeEntry {
                    stop_time: stop_time.clone(),
                    trip_id: trip.id.clone(),
                    block_sequence: stop_times.len(),
                    trip_sequence: sequence,
                    distance_along_block: distance + stop_time.distance_along_trip,
                });
            }
            let trip_distance = trip.total_trip_distance;
            trips.push(BlockTripEntry {
                trip,
                sequence,
                accumulated_stop_time_index,
                distance_from_block_start: distance,
            });
            distance += trip_distance;
        }

        Some(BlockConfiguration {
            block_id: self.block_id,
            service_ids: self.service_ids,
            trips,
            trip_gap_distances: gaps,
            stop_times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn aid(id: &str) -> AgencyAndId {
        AgencyAndId::new("1", id)
    }

    fn trip(id: &str, start: i32) -> Arc<TripEntry> {
        Arc::new(TripEntry::new(
            aid(id),
            aid("routeA"),
            Some(aid("blockA")),
            aid("serviceId"),
            vec![
                StopTimeEntry::new(aid("stopA"), 1, start, start, 0.0),
                StopTimeEntry::new(aid("stopB"), 2, start + 60, start + 60, 100.0),
                StopTimeEntry::new(aid("stopC"), 3, start + 120, start + 120, 250.0),
            ],
        ))
    }

    #[test]
    fn test_build_orders_trips_by_departure() {
        let config = BlockConfiguration::builder(aid("blockA"), ServiceIds::single(aid("serviceId")))
            .trips(vec![trip("tripB", 600), trip("tripA", 0)])
            .build()
            .unwrap();

        assert_eq!(config.trips[0].trip.id, aid("tripA"));
        assert_eq!(config.trips[1].accumulated_stop_time_index, 3);
        assert_eq!(config.stop_times().len(), 6);
        assert_relative_eq!(config.trips[1].distance_from_block_start, 250.0);
        assert_relative_eq!(config.stop_times()[4].distance_along_block, 350.0);
        assert_relative_eq!(config.total_block_distance(), 500.0);
    }

    #[test]
    fn test_stop_times_for_trip_matches_trip() {
        let trip_b = trip("tripB", 600);
        let config = BlockConfiguration::builder(aid("blockA"), ServiceIds::single(aid("serviceId")))
            .trips(vec![trip("tripA", 0), trip_b.clone()])
            .build()
            .unwrap();

        let block_view = config.stop_times_for_trip(&aid("tripB")).unwrap();
        assert_eq!(block_view.len(), trip_b.stop_times().len());
        for (block_stop_time, stop_time) in block_view.iter().zip(trip_b.stop_times()) {
            assert_eq!(&block_stop_time.stop_time, stop_time);
        }
        assert!(config.stop_times_for_trip(&aid("tripC")).is_none());
    }

    #[test]
    fn test_gap_distances_follow_their_trips() {
        let config = BlockConfiguration::builder(aid("blockA"), ServiceIds::single(aid("serviceId")))
            .trips(vec![trip("tripA", 0), trip("tripB", 600), trip("tripC", 1200)])
            .trip_gap_distances([(aid("tripB"), 40.0), (aid("tripC"), 70.0)])
            .build()
            .unwrap();
        assert_relative_eq!(config.trips[2].distance_from_block_start, 250.0 + 40.0 + 250.0 + 70.0);

        // dropping the middle trip keeps tripC's own gap
        let rebuilt = config
            .rebuilt_with(vec![config.trips[2].trip.clone(), config.trips[0].trip.clone()])
            .unwrap();
        assert_eq!(rebuilt.trips[1].trip.id, aid("tripC"));
        assert_relative_eq!(rebuilt.trip_gap_distance(&aid("tripC")).unwrap(), 70.0);
        assert_relative_eq!(rebuilt.trips[1].distance_from_block_start, 320.0);
        assert_relative_eq!(rebuilt.stop_times()[4].distance_along_block, 420.0);

        // a later-departing replacement reorders trips without swapping gaps
        let rebuilt = config
            .rebuilt_with(vec![trip("tripA", 1800), config.trips[1].trip.clone(), config.trips[2].trip.clone()])
            .unwrap();
        assert_eq!(rebuilt.trips[0].trip.id, aid("tripB"));
        assert_relative_eq!(rebuilt.trip_gap_distances[0], 40.0);
        assert_relative_eq!(rebuilt.trip_gap_distance(&aid("tripA")).unwrap(), 0.0);
        assert!(rebuilt.trip_gap_distance(&aid("tripX")).is_none());
    }

    #[test]
    fn test_empty_configuration_is_dropped() {
        let config = BlockConfiguration::builder(aid("blockA"), ServiceIds::default()).build();
        assert!(config.is_none());
    }
}
