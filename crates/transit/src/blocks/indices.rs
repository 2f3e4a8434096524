//! Derived block indices.
//!
//! Indices hold `Arc`s to immutable block configurations and are never
//! patched: when the graph changes they are thrown away and rebuilt.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;

use crate::identifiers::AgencyAndId;
use crate::models::block::{BlockConfiguration, BlockEntry, BlockStopTimeEntry, BlockTripEntry};
use crate::models::types::ServiceIds;

/// The trips of one block configuration.
#[derive(Clone, Debug)]
pub struct BlockTripIndex {
    pub configuration: Arc<BlockConfiguration>,
}

impl BlockTripIndex {
    pub fn new(configuration: Arc<BlockConfiguration>) -> Self {
        Self { configuration }
    }

    pub fn block_id(&self) -> &AgencyAndId {
        &self.configuration.block_id
    }

    pub fn service_ids(&self) -> &ServiceIds {
        &self.configuration.service_ids
    }

    pub fn trips(&self) -> &[BlockTripEntry] {
        &self.configuration.trips
    }

    pub fn route_ids(&self) -> impl Iterator<Item = &AgencyAndId> {
        self.trips().iter().map(|bt| &bt.trip.route_id).unique()
    }
}

/// A block stop-time referenced by configuration and position.
#[derive(Clone, Debug)]
pub struct BlockStopTimeRef {
    pub configuration: Arc<BlockConfiguration>,
    pub index: usize,
}

impl BlockStopTimeRef {
    pub fn stop_time(&self) -> &BlockStopTimeEntry {
        &self.configuration.stop_times()[self.index]
    }
}

/// Block stop-times at one stop sharing a service-id set, ordered by
/// departure time.
#[derive(Clone, Debug)]
pub struct BlockStopTimeIndex {
    pub stop_id: AgencyAndId,
    pub service_ids: ServiceIds,
    entries: Vec<BlockStopTimeRef>,
}

impl BlockStopTimeIndex {
    pub fn entries(&self) -> &[BlockStopTimeRef] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn departure_times(&self) -> Vec<i32> {
        self.entries
            .iter()
            .map(|entry| entry.stop_time().stop_time.departure_time)
            .collect()
    }

    /// Trip of the earliest entry; used to recognise re-registrations.
    pub fn first_trip_id(&self) -> Option<&AgencyAndId> {
        self.entries.first().map(|entry| &entry.stop_time().trip_id)
    }
}

/// One trip index per configuration of every block.
pub fn create_trip_indices<'a>(
    blocks: impl IntoIterator<Item = &'a Arc<BlockEntry>>,
) -> Vec<Arc<BlockTripIndex>> {
    blocks
        .into_iter()
        .flat_map(|block| block.configurations.iter())
        .map(|config| Arc::new(BlockTripIndex::new(config.clone())))
        .collect()
}

/// Stop-time indices grouped by stop, one per (stop, service-id set).
pub fn create_stop_time_indices<'a>(
    configurations: impl IntoIterator<Item = &'a Arc<BlockConfiguration>>,
) -> HashMap<AgencyAndId, Vec<Arc<BlockStopTimeIndex>>> {
    let mut grouped: HashMap<(AgencyAndId, ServiceIds), Vec<BlockStopTimeRef>> = HashMap::new();
    for config in configurations {
        for (index, block_stop_time) in config.stop_times().iter().enumerate() {
            let key = (block_stop_time.stop_time.stop_id.clone(), config.service_ids.clone());
            grouped.entry(key).or_default().push(BlockStopTimeRef {
                configuration: config.clone(),
                index,
            });
        }
    }

    let mut by_stop: HashMap<AgencyAndId, Vec<Arc<BlockStopTimeIndex>>> = HashMap::new();
    for ((stop_id, service_ids), mut entries) in grouped {
        entries.sort_by_key(|entry| {
            let stop_time = entry.stop_time();
            (stop_time.stop_time.departure_time, stop_time.trip_id.clone())
        });
        by_stop
            .entry(stop_id.clone())
            .or_default()
            .push(Arc::new(BlockStopTimeIndex {
                stop_id,
                service_ids,
                entries,
            }));
    }
    for indices in by_stop.values_mut() {
        indices.sort_by(|a, b| a.service_ids.cmp(&b.service_ids));
    }
    by_stop
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entities::TripEntry;
    use crate::models::types::StopTimeEntry;

    fn aid(id: &str) -> AgencyAndId {
        AgencyAndId::new("1", id)
    }

    fn configuration(block: &str, service: &str, trips: &[(&str, i32)]) -> Arc<BlockConfiguration> {
        let trips = trips
            .iter()
            .map(|&(id, start)| {
                Arc::new(TripEntry::new(
                    aid(id),
                    aid("routeA"),
                    Some(aid(block)),
                    aid(service),
                    vec![
                        StopTimeEntry::new(aid("stopA"), 1, start, start, 0.0),
                        StopTimeEntry::new(aid("stopB"), 2, start + 300, start + 300, 1200.0),
                    ],
                ))
            })
            .collect();
        Arc::new(
            BlockConfiguration::builder(aid(block), ServiceIds::single(aid(service)))
                .trips(trips)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_stop_time_indices_grouped_by_service() {
        let configs = vec![
            configuration("block1", "weekday", &[("trip1", 900)]),
            configuration("block2", "weekday", &[("trip2", 300)]),
            configuration("block3", "saturday", &[("trip3", 600)]),
        ];
        let by_stop = create_stop_time_indices(&configs);

        let at_a = &by_stop[&aid("stopA")];
        assert_eq!(at_a.len(), 2);
        assert_eq!(at_a[0].service_ids, ServiceIds::single(aid("saturday")));
        assert_eq!(at_a[1].departure_times(), vec![300, 900]);
        assert_eq!(at_a[1].first_trip_id(), Some(&aid("trip2")));
        assert_eq!(by_stop[&aid("stopB")][1].len(), 2);
    }

    #[test]
    fn test_trip_indices_one_per_configuration() {
        let block = Arc::new(BlockEntry {
            id: aid("block1"),
            configurations: vec![
                configuration("block1", "weekday", &[("trip1", 0), ("trip2", 600)]),
                configuration("block1", "saturday", &[("trip3", 0)]),
            ],
        });
        let indices = create_trip_indices([&block]);

        assert_eq!(indices.len(), 2);
        assert_eq!(indices[0].trips().len(), 2);
        assert_eq!(indices[0].route_ids().count(), 1);
        assert_eq!(indices[1].block_id(), &aid("block1"));
    }
}
