//! Indices for blocks that only exist at runtime.
//!
//! Trips added or duplicated by realtime feeds never enter the static graph.
//! They are registered here, together with a [`DynamicGraph`] view so that
//! lookups and narratives resolve for them too.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tracing::debug;

use crate::blocks::indices::{
    create_stop_time_indices, create_trip_indices, BlockStopTimeIndex, BlockTripIndex,
};
use crate::identifiers::AgencyAndId;
use crate::models::block::{BlockConfiguration, BlockEntry};
use crate::models::entities::{RouteEntry, ShapePoints, StopEntry, TripEntry};
use crate::models::narrative::TripNarrative;
use crate::models::traits::TransitGraph;

/// A block configuration running on a given service date.
#[derive(Clone, Debug)]
pub struct BlockInstance {
    pub configuration: Arc<BlockConfiguration>,
    pub service_date: NaiveDate,
    pub narratives: HashMap<AgencyAndId, TripNarrative>,
}

impl BlockInstance {
    pub fn new(configuration: Arc<BlockConfiguration>, service_date: NaiveDate) -> Self {
        Self {
            configuration,
            service_date,
            narratives: HashMap::new(),
        }
    }

    pub fn with_narrative(mut self, trip_id: AgencyAndId, narrative: TripNarrative) -> Self {
        self.narratives.insert(trip_id, narrative);
        self
    }

    pub fn block_id(&self) -> &AgencyAndId {
        &self.configuration.block_id
    }
}

/// Blocks, trips and routes registered at runtime. Holds no stops or shapes;
/// those always come from the static graph.
#[derive(Debug, Default)]
pub struct DynamicGraph {
    blocks: DashMap<AgencyAndId, Arc<BlockEntry>>,
    trips: DashMap<AgencyAndId, Arc<TripEntry>>,
    routes: DashMap<AgencyAndId, Arc<RouteEntry>>,
    trip_narratives: DashMap<AgencyAndId, Arc<TripNarrative>>,
}

impl DynamicGraph {
    pub fn register_block(&self, block: BlockEntry) {
        self.blocks.insert(block.id.clone(), Arc::new(block));
    }

    pub fn register_trip(&self, trip: Arc<TripEntry>) {
        self.trips.insert(trip.id.clone(), trip);
    }

    /// Adds `trip_id` to the route, creating the route under `parent_id` if
    /// it is new.
    pub fn register_route(&self, route_id: &AgencyAndId, parent_id: &AgencyAndId, trip_id: &AgencyAndId) {
        let mut route = self
            .routes
            .entry(route_id.clone())
            .or_insert_with(|| Arc::new(RouteEntry::new(route_id.clone(), parent_id.clone())));
        if !route.trip_ids.contains(trip_id) {
            let mut updated = (**route).clone();
            updated.trip_ids.push(trip_id.clone());
            *route = Arc::new(updated);
        }
    }

    pub fn register_trip_narrative(&self, trip_id: AgencyAndId, narrative: TripNarrative) {
        self.trip_narratives.insert(trip_id, Arc::new(narrative));
    }
}

impl TransitGraph for DynamicGraph {
    fn trip_for_id(&self, id: &AgencyAndId) -> Option<Arc<TripEntry>> {
        self.trips.get(id).map(|e| e.value().clone())
    }

    fn block_for_id(&self, id: &AgencyAndId) -> Option<Arc<BlockEntry>> {
        self.blocks.get(id).map(|e| e.value().clone())
    }

    fn route_for_id(&self, id: &AgencyAndId) -> Option<Arc<RouteEntry>> {
        self.routes.get(id).map(|e| e.value().clone())
    }

    fn stop_for_id(&self, _id: &AgencyAndId) -> Option<Arc<StopEntry>> {
        None
    }

    fn shape(&self, _id: &AgencyAndId) -> Option<Arc<ShapePoints>> {
        None
    }

    fn trip_narrative(&self, id: &AgencyAndId) -> Option<Arc<TripNarrative>> {
        self.trip_narratives.get(id).map(|e| e.value().clone())
    }

    fn agency_ids(&self) -> Vec<Arc<str>> {
        Vec::new()
    }
}

/// The static graph with a [`DynamicGraph`] layered under it. Lookups try the
/// static graph first, so a runtime trip never shadows a scheduled one.
pub struct LayeredGraph {
    static_graph: Arc<dyn TransitGraph>,
    dynamic: Arc<DynamicGraph>,
}

impl LayeredGraph {
    pub fn new(static_graph: Arc<dyn TransitGraph>, dynamic: Arc<DynamicGraph>) -> Self {
        Self {
            static_graph,
            dynamic,
        }
    }
}

impl TransitGraph for LayeredGraph {
    fn trip_for_id(&self, id: &AgencyAndId) -> Option<Arc<TripEntry>> {
        self.static_graph
            .trip_for_id(id)
            .or_else(|| self.dynamic.trip_for_id(id))
    }

    fn block_for_id(&self, id: &AgencyAndId) -> Option<Arc<BlockEntry>> {
        self.static_graph
            .block_for_id(id)
            .or_else(|| self.dynamic.block_for_id(id))
    }

    fn route_for_id(&self, id: &AgencyAndId) -> Option<Arc<RouteEntry>> {
        self.static_graph
            .route_for_id(id)
            .or_else(|| self.dynamic.route_for_id(id))
    }

    fn stop_for_id(&self, id: &AgencyAndId) -> Option<Arc<StopEntry>> {
        self.static_graph.stop_for_id(id)
    }

    fn shape(&self, id: &AgencyAndId) -> Option<Arc<ShapePoints>> {
        self.static_graph.shape(id)
    }

    fn trip_narrative(&self, id: &AgencyAndId) -> Option<Arc<TripNarrative>> {
        self.static_graph
            .trip_narrative(id)
            .or_else(|| self.dynamic.trip_narrative(id))
    }

    fn agency_ids(&self) -> Vec<Arc<str>> {
        self.static_graph.agency_ids()
    }
}

pub struct DynamicBlockIndexEngine {
    static_graph: Arc<dyn TransitGraph>,
    graph: Arc<DynamicGraph>,
    instances: DashMap<AgencyAndId, Arc<BlockInstance>>,
    by_route_collection: DashMap<AgencyAndId, Vec<Arc<BlockTripIndex>>>,
    by_block: DashMap<AgencyAndId, Vec<Arc<BlockTripIndex>>>,
    by_stop: DashMap<AgencyAndId, Vec<Arc<BlockStopTimeIndex>>>,
}

impl DynamicBlockIndexEngine {
    /// `static_graph` supplies route collections for routes that already
    /// exist in the schedule.
    pub fn new(static_graph: Arc<dyn TransitGraph>, graph: Arc<DynamicGraph>) -> Self {
        Self {
            static_graph,
            graph,
            instances: DashMap::new(),
            by_route_collection: DashMap::new(),
            by_block: DashMap::new(),
            by_stop: DashMap::new(),
        }
    }

    pub fn dynamic_graph(&self) -> &Arc<DynamicGraph> {
        &self.graph
    }

    /// Registers a runtime block. Registering the same block again replaces
    /// its trip indices; a stop never gets two indices for the same trip.
    pub fn register(&self, instance: BlockInstance) {
        let block_id = instance.block_id().clone();
        let instance = Arc::new(instance);
        self.instances.insert(block_id.clone(), instance.clone());

        let mut block = BlockEntry::new(block_id.clone());
        block.configurations.push(instance.configuration.clone());
        let block = Arc::new(block);

        let trip_indices = create_trip_indices([&block]);
        for index in &trip_indices {
            for block_trip in index.trips() {
                let trip = &block_trip.trip;
                self.graph.register_trip(trip.clone());

                let collection_id = self
                    .static_graph
                    .route_for_id(&trip.route_id)
                    .map(|route| route.parent_id.clone())
                    .unwrap_or_else(|| trip.route_id.clone());
                self.graph.register_route(&trip.route_id, &collection_id, &trip.id);

                let mut indices = self.by_route_collection.entry(collection_id).or_default();
                indices.retain(|existing| existing.block_id() != &block_id);
                indices.push(index.clone());

                let narrative = instance.narratives.get(&trip.id).cloned().unwrap_or_default();
                self.graph.register_trip_narrative(trip.id.clone(), narrative);
            }
        }
        self.by_block.insert(block_id.clone(), trip_indices);
        self.graph.register_block((*block).clone());

        let by_stop = create_stop_time_indices(&block.configurations);
        for (stop_id, indices) in by_stop {
            let mut registered = self.by_stop.entry(stop_id).or_default();
            for index in indices {
                let duplicate = registered
                    .iter()
                    .any(|existing| existing.first_trip_id() == index.first_trip_id());
                if !duplicate {
                    registered.push(index);
                }
            }
        }

        debug!("registered dynamic block {block_id} for {}", instance.service_date);
    }

    pub fn dynamic_block_instance(&self, block_id: &AgencyAndId) -> Option<Arc<BlockInstance>> {
        self.instances.get(block_id).map(|e| e.value().clone())
    }

    /// `None` when nothing was ever registered at the stop.
    pub fn stop_time_indices_for_stop(&self, stop_id: &AgencyAndId) -> Option<Vec<Arc<BlockStopTimeIndex>>> {
        self.by_stop.get(stop_id).map(|e| e.value().clone())
    }

    pub fn block_trip_indices_for_route_collection(
        &self,
        route_collection_id: &AgencyAndId,
    ) -> Option<Vec<Arc<BlockTripIndex>>> {
        self.by_route_collection
            .get(route_collection_id)
            .map(|e| e.value().clone())
    }

    pub fn block_trip_indices_for_block(&self, block_id: &AgencyAndId) -> Option<Vec<Arc<BlockTripIndex>>> {
        self.by_block.get(block_id).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TransitGraphStore;
    use crate::models::types::{ServiceIds, StopTimeEntry};

    fn aid(id: &str) -> AgencyAndId {
        AgencyAndId::new("1", id)
    }

    fn instance() -> BlockInstance {
        let trip = Arc::new(TripEntry::new(
            aid("addedTrip"),
            aid("routeA"),
            Some(aid("addedBlock")),
            aid("weekday"),
            vec![
                StopTimeEntry::new(aid("stopA"), 1, 3600, 3600, 0.0),
                StopTimeEntry::new(aid("stopB"), 2, 3900, 3900, 800.0),
            ],
        ));
        let configuration =
            BlockConfiguration::builder(aid("addedBlock"), ServiceIds::single(aid("weekday")))
                .trips(vec![trip])
                .build()
                .unwrap();
        BlockInstance::new(
            Arc::new(configuration),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        )
        .with_narrative(aid("addedTrip"), TripNarrative::with_headsign("Downtown"))
    }

    fn engine() -> DynamicBlockIndexEngine {
        DynamicBlockIndexEngine::new(
            Arc::new(TransitGraphStore::new()),
            Arc::new(DynamicGraph::default()),
        )
    }

    #[test]
    fn test_register_indexes_each_stop_once() {
        let engine = engine();
        engine.register(instance());

        assert_eq!(engine.stop_time_indices_for_stop(&aid("stopA")).unwrap().len(), 1);
        assert_eq!(engine.stop_time_indices_for_stop(&aid("stopB")).unwrap().len(), 1);
        assert!(engine.stop_time_indices_for_stop(&aid("stopC")).is_none());

        // Re-registration doesn't duplicate anything
        engine.register(instance());
        assert_eq!(engine.stop_time_indices_for_stop(&aid("stopA")).unwrap().len(), 1);
        assert_eq!(engine.block_trip_indices_for_block(&aid("addedBlock")).unwrap().len(), 1);
        assert_eq!(
            engine.block_trip_indices_for_route_collection(&aid("routeA")).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_register_populates_dynamic_graph() {
        let engine = engine();
        engine.register(instance());

        let graph = engine.dynamic_graph();
        assert!(graph.trip_for_id(&aid("addedTrip")).is_some());
        assert!(graph.block_for_id(&aid("addedBlock")).is_some());
        assert_eq!(graph.route_for_id(&aid("routeA")).unwrap().trip_ids, vec![aid("addedTrip")]);
        assert_eq!(
            graph.trip_narrative(&aid("addedTrip")).unwrap().headsign.as_deref(),
            Some("Downtown")
        );
        assert!(engine.dynamic_block_instance(&aid("addedBlock")).is_some());
        assert!(engine.dynamic_block_instance(&aid("otherBlock")).is_none());
    }

    #[test]
    fn test_route_collection_from_static_graph() {
        let static_graph = Arc::new(TransitGraphStore::new());
        static_graph.add_agency(crate::models::entities::AgencyEntry::new("1", "UTC"));
        static_graph
            .add_route_entry(aid("routeA"), aid("collectionA"))
            .unwrap();
        let engine = DynamicBlockIndexEngine::new(static_graph, Arc::new(DynamicGraph::default()));
        engine.register(instance());

        assert!(engine
            .block_trip_indices_for_route_collection(&aid("collectionA"))
            .is_some());
        assert!(engine
            .block_trip_indices_for_route_collection(&aid("routeA"))
            .is_none());
    }

    #[test]
    fn test_layered_graph_prefers_static_entries() {
        let static_graph = Arc::new(TransitGraphStore::new());
        static_graph.add_agency(crate::models::entities::AgencyEntry::new("1", "UTC"));
        static_graph.add_stop_entry(StopEntry::new(aid("stopA"), 40.7, -74.0), None);
        let scheduled = TripEntry::new(
            aid("scheduledTrip"),
            aid("routeA"),
            None,
            aid("weekday"),
            vec![StopTimeEntry::new(aid("stopA"), 1, 0, 0, 0.0)],
        );
        static_graph.add_trip_entry(scheduled, None).unwrap();

        let engine = DynamicBlockIndexEngine::new(static_graph.clone(), Arc::new(DynamicGraph::default()));
        engine.register(instance());
        let layered = LayeredGraph::new(static_graph, engine.dynamic_graph().clone());

        assert_eq!(
            layered.trip_for_id(&aid("addedTrip")).unwrap().block_id,
            aid("addedBlock")
        );
        assert!(layered.block_for_id(&aid("addedBlock")).is_some());
        assert!(layered.trip_narrative(&aid("addedTrip")).is_some());
        // the scheduled route wins over the runtime registration of routeA
        assert_eq!(layered.route_for_id(&aid("routeA")).unwrap().trip_ids, vec![aid("scheduledTrip")]);
        assert!(layered.stop_for_id(&aid("stopA")).is_some());
        assert_eq!(layered.agency_ids(), vec![Arc::<str>::from("1")]);
        assert!(layered.trip_for_id(&aid("missing")).is_none());
    }
}
