//! Process-wide wiring of the realtime services.

use std::future::Future;
use std::sync::Arc;

use headway_transit::{
    BlockIndexEngine, CalendarService, DynamicBlockIndexEngine, DynamicGraph, EntityIdResolver,
    LayeredGraph, TransitGraph, TransitGraphStore,
};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::registries::{CancelledTripRegistry, KneelingVehicleRegistry, StrollerVehicleRegistry};
use crate::revenue::RevenueSearchIndex;
use crate::scheduler::FeedScheduler;
use crate::sometimes::{ScheduleChangePatcher, ServiceChangeFeed, TimeService};
use crate::vehicles::{
    BlockLocationIndex, VehicleLocationHistory, VehicleLocationRecord, VehicleOccupancyCache,
    VehicleStatusTracker,
};

pub struct RealtimeEngine {
    pub config: EngineConfig,
    pub graph: Arc<TransitGraphStore>,
    pub indices: Arc<BlockIndexEngine>,
    pub dynamic_indices: Arc<DynamicBlockIndexEngine>,
    pub resolver: Arc<EntityIdResolver>,
    pub patcher: Arc<ScheduleChangePatcher>,
    pub block_locations: Arc<BlockLocationIndex>,
    pub tracker: Arc<VehicleStatusTracker>,
    pub cancelled_trips: Arc<CancelledTripRegistry>,
    pub kneeling_vehicles: Arc<KneelingVehicleRegistry>,
    pub stroller_vehicles: Arc<StrollerVehicleRegistry>,
    pub revenue: Arc<RevenueSearchIndex>,
}

impl RealtimeEngine {
    pub fn new(
        config: EngineConfig,
        graph: Arc<TransitGraphStore>,
        calendar: Arc<dyn CalendarService>,
        time: Arc<dyn TimeService>,
    ) -> Self {
        let indices = Arc::new(BlockIndexEngine::new(graph.clone()));
        let dynamic_graph = Arc::new(DynamicGraph::default());
        let dynamic_indices = Arc::new(DynamicBlockIndexEngine::new(
            graph.clone(),
            dynamic_graph.clone(),
        ));
        // lookups see runtime trips too; mutations only ever touch `graph`
        let lookup: Arc<dyn TransitGraph> = Arc::new(LayeredGraph::new(graph.clone(), dynamic_graph));
        let resolver = Arc::new(EntityIdResolver::new(
            lookup.clone(),
            calendar,
            config.agency_ids.clone(),
            config.warn_agency_threshold,
        ));
        let patcher = Arc::new(ScheduleChangePatcher::new(
            graph.clone(),
            indices.clone(),
            resolver.clone(),
            time,
        ));

        let history = Arc::new(VehicleLocationHistory::new(config.vehicle_history_capacity));
        let block_locations = Arc::new(BlockLocationIndex::new(history.clone()));
        let tracker = Arc::new(VehicleStatusTracker::new(
            lookup,
            block_locations.clone(),
            history,
            Arc::new(VehicleOccupancyCache::default()),
        ));

        info!(
            "realtime engine ready at graph version {} with default agency {:?}",
            graph.version(),
            resolver.default_agency_id()
        );

        Self {
            config,
            graph,
            indices,
            dynamic_indices,
            resolver,
            patcher,
            block_locations,
            tracker,
            cancelled_trips: Arc::default(),
            kneeling_vehicles: Arc::default(),
            stroller_vehicles: Arc::default(),
            revenue: Arc::default(),
        }
    }

    /// Polls `fetch` for GTFS-Sometimes snapshots on the configured interval.
    pub fn spawn_schedule_patching<F, Fut>(&self, fetch: F) -> FeedScheduler
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<ServiceChangeFeed>> + Send + 'static,
    {
        let patcher = self.patcher.clone();
        let fetch = Arc::new(fetch);
        FeedScheduler::spawn(
            "schedule change feed",
            self.config.schedule_patch_interval(),
            move || {
                let patcher = patcher.clone();
                let fetch = fetch.clone();
                async move {
                    let feed = fetch().await?;
                    patcher.apply_feed(feed.timestamp, &feed.service_changes);
                    Ok(())
                }
            },
        )
    }

    /// Polls `fetch` for vehicle positions on the configured interval.
    pub fn spawn_vehicle_ingestion<F, Fut>(&self, fetch: F) -> FeedScheduler
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<Vec<VehicleLocationRecord>>> + Send + 'static,
    {
        let tracker = self.tracker.clone();
        let fetch = Arc::new(fetch);
        FeedScheduler::spawn(
            "vehicle position feed",
            self.config.vehicle_feed_interval(),
            move || {
                let tracker = tracker.clone();
                let fetch = fetch.clone();
                async move {
                    let records = fetch().await?;
                    if let Err(e) = tracker.handle_vehicle_location_records(records) {
                        warn!("vehicle position feed contained bad records: {e}");
                    }
                    Ok(())
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    use chrono::NaiveDate;
    use headway_transit::{
        AgencyAndId, AgencyEntry, BlockConfiguration, BlockInstance, CalendarData, ServiceIds, StopEntry,
        StopTimeEntry, TripEntry,
    };

    use super::*;
    use crate::sometimes::{
        DateDescriptor, EntityDescriptor, FixedTimeService, ServiceChange, ServiceChangeType, Table,
    };
    use crate::vehicles::VehicleLocationRecord;

    fn aid(id: &str) -> AgencyAndId {
        AgencyAndId::new("1", id)
    }

    fn engine() -> RealtimeEngine {
        let graph = Arc::new(TransitGraphStore::new());
        graph.add_agency(AgencyEntry::new("1", "America/New_York"));
        for stop in ["stopA", "stopB", "stopC"] {
            graph.add_stop_entry(StopEntry::new(aid(stop), 40.7, -74.0), None);
        }
        graph
            .add_trip_entry(
                TripEntry::new(
                    aid("tripA"),
                    aid("routeA"),
                    Some(aid("blockA")),
                    aid("weekday"),
                    vec![
                        StopTimeEntry::new(aid("stopA"), 1, 3600, 3600, 0.0),
                        StopTimeEntry::new(aid("stopB"), 2, 3700, 3700, 500.0),
                        StopTimeEntry::new(aid("stopC"), 3, 3800, 3800, 1000.0),
                    ],
                ),
                None,
            )
            .unwrap();

        let config = EngineConfig {
            schedule_patch_interval_secs: 1,
            ..EngineConfig::default()
        };
        RealtimeEngine::new(
            config,
            graph,
            Arc::new(CalendarData::new(Vec::new())),
            Arc::new(FixedTimeService::on(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())),
        )
    }

    #[test]
    fn test_wiring_uses_graph_agencies() {
        let engine = engine();
        assert_eq!(&*engine.resolver.default_agency_id(), "1");
        assert_eq!(engine.indices.block_trip_indices_for_block(&aid("blockA")).len(), 1);
        assert!(engine.dynamic_indices.stop_time_indices_for_stop(&aid("stopA")).is_none());
        assert!(engine.revenue.stop_has_revenue_service(&aid("stopA")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_patching_applies_fetched_feed() {
        let engine = engine();
        let fetches = Arc::new(AtomicI64::new(0));
        let counter = fetches.clone();
        let scheduler = engine.spawn_schedule_patching(move || {
            let timestamp = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if timestamp == 0 {
                    eyre::bail!("feed unavailable");
                }
                Ok(ServiceChangeFeed {
                    timestamp,
                    service_changes: vec![
                        ServiceChange::new(Table::StopTimes, ServiceChangeType::Delete)
                            .with_entity(EntityDescriptor::stop_time("tripA", "stopB"))
                            .with_date(DateDescriptor::single(
                                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
                            )),
                    ],
                })
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await;

        assert!(fetches.load(Ordering::SeqCst) >= 3);
        let trip = engine.graph.trip_for_id(&aid("tripA")).unwrap();
        assert_eq!(trip.stop_times().len(), 2);
        assert!(engine.indices.stop_time_indices_for_stop(&aid("stopB")).is_empty());
    }

    #[test]
    fn test_tracker_resolves_vehicles_on_added_trips() {
        let engine = engine();
        let service_date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let trip = Arc::new(TripEntry::new(
            aid("added"),
            aid("routeA"),
            Some(aid("addedBlock")),
            aid("weekday"),
            vec![
                StopTimeEntry::new(aid("stopA"), 1, 7200, 7200, 0.0),
                StopTimeEntry::new(aid("stopC"), 2, 7500, 7500, 1000.0),
            ],
        ));
        let configuration = BlockConfiguration::builder(aid("addedBlock"), ServiceIds::single(aid("weekday")))
            .trips(vec![trip])
            .build()
            .unwrap();
        engine
            .dynamic_indices
            .register(BlockInstance::new(Arc::new(configuration), service_date));

        engine
            .tracker
            .handle_vehicle_location_record(
                VehicleLocationRecord::new(aid("bus"), 1_000)
                    .with_trip(aid("added"))
                    .with_service_date(service_date),
            )
            .unwrap();

        let location = engine.block_locations.location_for_vehicle(&aid("bus")).unwrap();
        assert_eq!(location.block_id, aid("addedBlock"));
        assert!(engine.graph.trip_for_id(&aid("added")).is_none());
        assert_eq!(engine.resolver.trip_id("added"), aid("added"));
    }
}
