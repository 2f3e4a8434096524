//! The authoritative in-memory transit graph.
//!
//! Every entity map holds `Arc`s that are replaced wholesale on mutation, so a
//! reader holding an entity (or a list returned by one of the `all_*` queries)
//! never observes a half-applied change. Structural trip mutations take the
//! mutex of the trip's block; unrelated blocks are never blocked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use geo::{Point, Rect};
use itertools::Itertools;
use rstar::RTree;
use tracing::{debug, warn};

use crate::graph::narrative::NarrativeStore;
use crate::identifiers::AgencyAndId;
use crate::models::block::{BlockConfiguration, BlockEntry};
use crate::models::entities::{
    AgencyEntry, RouteCollectionEntry, RouteEntry, ShapePoints, StopEntry, TripEntry,
};
use crate::models::narrative::{StopNarrative, TripNarrative};
use crate::models::traits::TransitGraph;
use crate::models::types::{Result, ServiceIds, StopTimeEntry, TransitError};
use crate::spatial::index::{build_stop_tree, stops_in_bounds, StopNode};
use crate::spatial::queries::{bounds_around, haversine_distance};
use crate::sync;

pub struct TransitGraphStore {
    agencies: RwLock<Vec<Arc<AgencyEntry>>>,
    stops: DashMap<AgencyAndId, Arc<StopEntry>>,
    stop_tree: RwLock<Arc<RTree<StopNode>>>,
    routes: DashMap<AgencyAndId, Arc<RouteEntry>>,
    route_collections: DashMap<AgencyAndId, Arc<RouteCollectionEntry>>,
    trips: DashMap<AgencyAndId, Arc<TripEntry>>,
    blocks: DashMap<AgencyAndId, Arc<BlockEntry>>,
    shapes: DashMap<AgencyAndId, Arc<ShapePoints>>,
    narratives: NarrativeStore,

    block_locks: DashMap<AgencyAndId, Arc<Mutex<()>>>,
    stop_lock: Mutex<()>,
    version: AtomicU64,
}

impl TransitGraphStore {
    pub fn new() -> Self {
        Self {
            agencies: RwLock::new(Vec::new()),
            stops: DashMap::new(),
            stop_tree: RwLock::new(Arc::new(RTree::new())),
            routes: DashMap::new(),
            route_collections: DashMap::new(),
            trips: DashMap::new(),
            blocks: DashMap::new(),
            shapes: DashMap::new(),
            narratives: NarrativeStore::default(),
            block_locks: DashMap::new(),
            stop_lock: Mutex::new(()),
            version: AtomicU64::new(0),
        }
    }

    /// Bumped on every change that invalidates derived indices.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn narratives(&self) -> &NarrativeStore {
        &self.narratives
    }

    // ========================================================================
    // Agencies
    // ========================================================================

    pub fn all_agencies(&self) -> Vec<Arc<AgencyEntry>> {
        sync::read(&self.agencies).clone()
    }

    pub fn agency_for_id(&self, id: &str) -> Option<Arc<AgencyEntry>> {
        sync::read(&self.agencies)
            .iter()
            .find(|agency| &*agency.id == id)
            .cloned()
    }

    /// Returns `false` if an agency with the same id is already registered.
    pub fn add_agency(&self, agency: AgencyEntry) -> bool {
        let mut agencies = sync::write(&self.agencies);
        if agencies.iter().any(|existing| existing.id == agency.id) {
            return false;
        }
        agencies.push(Arc::new(agency));
        true
    }

    fn link_route_collection(&self, collection_id: &AgencyAndId) {
        let mut agencies = sync::write(&self.agencies);
        if let Some(agency) = agencies
            .iter_mut()
            .find(|agency| &*agency.id == collection_id.agency_id())
        {
            if !agency.route_collection_ids.contains(collection_id) {
                let mut updated = (**agency).clone();
                updated.route_collection_ids.push(collection_id.clone());
                *agency = Arc::new(updated);
            }
        }
    }

    // ========================================================================
    // Stops
    // ========================================================================

    pub fn all_stops(&self) -> Vec<Arc<StopEntry>> {
        let mut stops: Vec<_> = self.stops.iter().map(|e| e.value().clone()).collect();
        stops.sort_by_key(|stop| stop.index);
        stops
    }

    pub fn stop_for_id(&self, id: &AgencyAndId) -> Option<Arc<StopEntry>> {
        self.stops.get(id).map(|e| e.value().clone())
    }

    /// Stops inside `bounds` (x = lon, y = lat).
    pub fn stops_by_location(&self, bounds: Rect) -> Vec<Arc<StopEntry>> {
        let tree = sync::read(&self.stop_tree).clone();
        stops_in_bounds(&tree, bounds)
    }

    /// Stops within `radius` metres of `center`, nearest first.
    pub fn stops_within(&self, center: Point, radius: f64) -> Vec<Arc<StopEntry>> {
        self.stops_by_location(bounds_around(center, radius))
            .into_iter()
            .map(|stop| (haversine_distance(center, stop.location), stop))
            .filter(|(distance, _)| *distance <= radius)
            .sorted_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, stop)| stop)
            .collect()
    }

    /// Registers a stop and assigns it the next dense index. Returns `false`
    /// if the id is taken.
    pub fn add_stop_entry(&self, mut stop: StopEntry, narrative: Option<StopNarrative>) -> bool {
        let _guard = sync::lock(&self.stop_lock);
        if self.stops.contains_key(&stop.id) {
            return false;
        }

        stop.index = self.stops.len();
        if let Some(narrative) = narrative {
            self.narratives.add_stop(stop.id.clone(), narrative);
        }
        self.stops.insert(stop.id.clone(), Arc::new(stop));
        self.rebuild_stop_tree();
        true
    }

    /// Bulk form of [`Self::add_stop_entry`]: the R-tree is rebuilt once.
    /// Returns how many stops were new.
    pub fn add_stop_entries(
        &self,
        stops: impl IntoIterator<Item = (StopEntry, Option<StopNarrative>)>,
    ) -> usize {
        let _guard = sync::lock(&self.stop_lock);
        let mut added = 0;
        for (mut stop, narrative) in stops {
            if self.stops.contains_key(&stop.id) {
                continue;
            }
            stop.index = self.stops.len();
            if let Some(narrative) = narrative {
                self.narratives.add_stop(stop.id.clone(), narrative);
            }
            self.stops.insert(stop.id.clone(), Arc::new(stop));
            added += 1;
        }
        if added > 0 {
            self.rebuild_stop_tree();
        }
        added
    }

    /// Removes a stop, compacting the indices of the stops after it.
    pub fn remove_stop_entry(&self, id: &AgencyAndId) -> bool {
        let _guard = sync::lock(&self.stop_lock);
        let Some((_, removed)) = self.stops.remove(id) else {
            return false;
        };

        let shifted: Vec<_> = self
            .stops
            .iter()
            .filter(|e| e.value().index > removed.index)
            .map(|e| e.value().clone())
            .collect();
        for stop in shifted {
            let mut updated = (*stop).clone();
            updated.index -= 1;
            self.stops.insert(updated.id.clone(), Arc::new(updated));
        }

        self.narratives.remove_stop(id);
        self.rebuild_stop_tree();
        self.version.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Moves a stop, keeping its index. Returns the stop as it was before.
    pub fn move_stop_entry(&self, id: &AgencyAndId, lat: f64, lon: f64) -> Option<Arc<StopEntry>> {
        let _guard = sync::lock(&self.stop_lock);
        let previous = self.stops.get(id).map(|e| e.value().clone())?;

        let mut moved = (*previous).clone();
        moved.location = Point::new(lon, lat);
        self.stops.insert(id.clone(), Arc::new(moved));
        self.rebuild_stop_tree();
        Some(previous)
    }

    fn rebuild_stop_tree(&self) {
        let stops = self.all_stops();
        let tree = build_stop_tree(&stops);
        *sync::write(&self.stop_tree) = Arc::new(tree);
    }

    // ========================================================================
    // Routes
    // ========================================================================

    pub fn all_routes(&self) -> Vec<Arc<RouteEntry>> {
        let mut routes: Vec<_> = self.routes.iter().map(|e| e.value().clone()).collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        routes
    }

    pub fn route_for_id(&self, id: &AgencyAndId) -> Option<Arc<RouteEntry>> {
        self.routes.get(id).map(|e| e.value().clone())
    }

    pub fn all_route_collections(&self) -> Vec<Arc<RouteCollectionEntry>> {
        let mut collections: Vec<_> = self
            .route_collections
            .iter()
            .map(|e| e.value().clone())
            .collect();
        collections.sort_by(|a, b| a.id.cmp(&b.id));
        collections
    }

    pub fn route_collection_for_id(&self, id: &AgencyAndId) -> Option<Arc<RouteCollectionEntry>> {
        self.route_collections.get(id).map(|e| e.value().clone())
    }

    /// Registers a route under `collection_id`, creating the collection and
    /// linking it to its agency when needed. Returns `false` if the route
    /// already exists.
    pub fn add_route_entry(&self, route_id: AgencyAndId, collection_id: AgencyAndId) -> Result<bool> {
        if self.agency_for_id(collection_id.agency_id()).is_none() {
            return Err(TransitError::AgencyNotFound(collection_id.agency_id().to_string()));
        }

        match self.routes.entry(route_id.clone()) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(RouteEntry::new(route_id.clone(), collection_id.clone())));
            }
        }

        let created = match self.route_collections.entry(collection_id.clone()) {
            Entry::Occupied(mut entry) => {
                let mut updated = (**entry.get()).clone();
                updated.route_ids.push(route_id);
                entry.insert(Arc::new(updated));
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(RouteCollectionEntry {
                    id: collection_id.clone(),
                    route_ids: vec![route_id],
                }));
                true
            }
        };
        if created {
            self.link_route_collection(&collection_id);
        }
        Ok(true)
    }

    fn update_route_trips(&self, route_id: &AgencyAndId, f: impl FnOnce(&mut Vec<AgencyAndId>)) {
        if let Some(mut route) = self.routes.get_mut(route_id) {
            let mut updated = (**route).clone();
            f(&mut updated.trip_ids);
            *route = Arc::new(updated);
        }
    }

    // ========================================================================
    // Trips and blocks
    // ========================================================================

    pub fn all_trips(&self) -> Vec<Arc<TripEntry>> {
        let mut trips: Vec<_> = self.trips.iter().map(|e| e.value().clone()).collect();
        trips.sort_by(|a, b| a.id.cmp(&b.id));
        trips
    }

    pub fn trip_for_id(&self, id: &AgencyAndId) -> Option<Arc<TripEntry>> {
        self.trips.get(id).map(|e| e.value().clone())
    }

    pub fn all_blocks(&self) -> Vec<Arc<BlockEntry>> {
        let mut blocks: Vec<_> = self.blocks.iter().map(|e| e.value().clone()).collect();
        blocks.sort_by(|a, b| a.id.cmp(&b.id));
        blocks
    }

    pub fn block_for_id(&self, id: &AgencyAndId) -> Option<Arc<BlockEntry>> {
        self.blocks.get(id).map(|e| e.value().clone())
    }

    fn validate_trip(&self, trip: &TripEntry) -> Result<()> {
        if trip.stop_times().is_empty() {
            return Err(TransitError::InvalidData(format!("trip {} has no stop times", trip.id)));
        }
        if self.agency_for_id(trip.id.agency_id()).is_none() {
            return Err(TransitError::AgencyNotFound(trip.id.agency_id().to_string()));
        }
        if !self.routes.contains_key(&trip.route_id)
            && self.agency_for_id(trip.route_id.agency_id()).is_none()
        {
            return Err(TransitError::AgencyNotFound(trip.route_id.agency_id().to_string()));
        }
        Ok(())
    }

    /// Inserts a trip and attaches it to its block.
    ///
    /// Returns `Ok(false)` when a trip with the same id already exists, and an
    /// error when the trip has no stop-times or belongs to an unknown agency.
    pub fn add_trip_entry(&self, trip: TripEntry, narrative: Option<TripNarrative>) -> Result<bool> {
        self.validate_trip(&trip)?;

        let lock = self.block_lock(&trip.block_id);
        let _guard = sync::lock(&lock);

        let trip = Arc::new(trip);
        match self.trips.entry(trip.id.clone()) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(trip.clone());
            }
        }

        if !self.routes.contains_key(&trip.route_id) {
            self.add_route_entry(trip.route_id.clone(), trip.route_id.clone())?;
        }
        self.update_route_trips(&trip.route_id, |trip_ids| trip_ids.push(trip.id.clone()));
        self.attach_to_block(&trip);

        if let Some(narrative) = narrative {
            self.narratives.add_trip(trip.id.clone(), narrative);
        }

        self.invalidate(&trip);
        Ok(true)
    }

    /// Removes a trip from the graph and from its block. Block configurations
    /// left without trips are dropped, as is a block left without
    /// configurations.
    pub fn delete_trip_entry_for_id(&self, id: &AgencyAndId) -> bool {
        let Some(block_id) = self.trips.get(id).map(|e| e.value().block_id.clone()) else {
            return false;
        };
        let lock = self.block_lock(&block_id);
        let _guard = sync::lock(&lock);

        let Some((_, trip)) = self.trips.remove(id) else {
            return false;
        };
        self.detach_from_block(&trip);
        self.update_route_trips(&trip.route_id, |trip_ids| trip_ids.retain(|t| t != id));
        self.narratives.remove_trip(id);

        self.invalidate(&trip);
        true
    }

    /// Replaces a trip wholesale. The trip is validated before the old entry
    /// is removed.
    pub fn update_trip_entry(&self, trip: TripEntry, narrative: Option<TripNarrative>) -> Result<bool> {
        self.validate_trip(&trip)?;
        self.delete_trip_entry_for_id(&trip.id);
        self.add_trip_entry(trip, narrative)
    }

    fn attach_to_block(&self, trip: &Arc<TripEntry>) {
        let block = match self.block_for_id(&trip.block_id) {
            Some(existing) => {
                let mut block = (*existing).clone();
                let mut joined = false;
                for config in block.configurations.iter_mut() {
                    if !config.service_ids.contains(&trip.service_id) {
                        continue;
                    }
                    let mut trips: Vec<_> = config.trips.iter().map(|bt| bt.trip.clone()).collect();
                    trips.push(trip.clone());
                    if let Some(rebuilt) = config.rebuilt_with(trips) {
                        *config = rebuilt;
                        joined = true;
                    }
                }
                if !joined {
                    block.configurations.extend(single_trip_configuration(trip));
                }
                block
            }
            None => {
                let mut block = BlockEntry::new(trip.block_id.clone());
                block.configurations.extend(single_trip_configuration(trip));
                block
            }
        };
        self.blocks.insert(block.id.clone(), Arc::new(block));
    }

    fn detach_from_block(&self, trip: &TripEntry) {
        let Some(existing) = self.block_for_id(&trip.block_id) else {
            return;
        };

        let configurations: Vec<_> = existing
            .configurations
            .iter()
            .filter_map(|config| {
                if config.trip_index(&trip.id).is_none() {
                    return Some(config.clone());
                }
                let remaining = config
                    .trips
                    .iter()
                    .filter(|bt| bt.trip.id != trip.id)
                    .map(|bt| bt.trip.clone())
                    .collect();
                config.rebuilt_with(remaining)
            })
            .collect();

        if configurations.is_empty() {
            self.blocks.remove(&existing.id);
        } else {
            self.blocks.insert(
                existing.id.clone(),
                Arc::new(BlockEntry {
                    id: existing.id.clone(),
                    configurations,
                }),
            );
        }
    }

    /// Rebuilds every configuration holding `trip` from its new version.
    fn replace_trip_in_block(&self, trip: &Arc<TripEntry>) {
        let Some(existing) = self.block_for_id(&trip.block_id) else {
            return;
        };

        let mut block = (*existing).clone();
        for config in block.configurations.iter_mut() {
            if config.trip_index(&trip.id).is_none() {
                continue;
            }
            let trips = config
                .trips
                .iter()
                .map(|bt| if bt.trip.id == trip.id { trip.clone() } else { bt.trip.clone() })
                .collect();
            if let Some(rebuilt) = config.rebuilt_with(trips) {
                *config = rebuilt;
            }
        }
        self.blocks.insert(block.id.clone(), Arc::new(block));
    }

    fn block_lock(&self, block_id: &AgencyAndId) -> Arc<Mutex<()>> {
        self.block_locks.entry(block_id.clone()).or_default().value().clone()
    }

    /// Applies `f` to a copy of the trip under its block lock and publishes
    /// the result. Returns `false` when the trip is missing or `f` declines.
    fn mutate_trip(
        &self,
        trip_id: &AgencyAndId,
        invalidates: bool,
        f: impl FnOnce(&mut TripEntry) -> bool,
    ) -> bool {
        let Some(block_id) = self.trips.get(trip_id).map(|e| e.value().block_id.clone()) else {
            return false;
        };
        let lock = self.block_lock(&block_id);
        let _guard = sync::lock(&lock);

        // The trip may have been deleted while we waited for the lock.
        let Some(current) = self.trip_for_id(trip_id) else {
            return false;
        };
        let mut updated = (*current).clone();
        if !f(&mut updated) {
            return false;
        }

        let updated = Arc::new(updated);
        self.trips.insert(trip_id.clone(), updated.clone());
        self.replace_trip_in_block(&updated);
        if invalidates {
            self.invalidate(&updated);
        }
        true
    }

    fn mutate_stop_times(
        &self,
        trip_id: &AgencyAndId,
        f: impl FnOnce(&mut Vec<StopTimeEntry>) -> bool,
    ) -> bool {
        self.mutate_trip(trip_id, true, |trip| {
            let mut stop_times = trip.stop_times().to_vec();
            if !f(&mut stop_times) {
                return false;
            }
            trip.set_stop_times(stop_times);
            true
        })
    }

    fn invalidate(&self, trip: &TripEntry) {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        let stops = trip.stop_times().iter().map(|st| &st.stop_id).unique().join(", ");
        debug!(
            "graph version {version}: invalidated route {} and stops [{stops}] for trip {}",
            trip.route_id, trip.id
        );
    }

    // ========================================================================
    // Stop-times
    // ========================================================================

    /// Removes the first stop-time of the trip at `stop_id`.
    pub fn delete_stop_time(&self, trip_id: &AgencyAndId, stop_id: &AgencyAndId) -> bool {
        self.mutate_stop_times(trip_id, |stop_times| {
            match stop_times.iter().position(|st| &st.stop_id == stop_id) {
                Some(index) => {
                    stop_times.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    /// Inserts a stop-time keeping the trip ordered by distance, or by time
    /// when no distance is known. A missing distance is interpolated from
    /// the neighbouring stop-times.
    pub fn insert_stop_time(
        &self,
        trip_id: &AgencyAndId,
        stop_id: &AgencyAndId,
        arrival_time: i32,
        departure_time: i32,
        distance_along_trip: Option<f64>,
    ) -> bool {
        let Some(location) = self.stops.get(stop_id).map(|e| e.value().location) else {
            warn!("cannot insert stop time for unknown stop {stop_id} on trip {trip_id}");
            return false;
        };

        self.mutate_stop_times(trip_id, |stop_times| {
            let position =
                insert_position(stop_times, arrival_time, departure_time, distance_along_trip);
            let distance_along_trip = distance_along_trip.unwrap_or_else(|| {
                interpolated_distance(stop_times, position, |neighbour| {
                    self.stops
                        .get(neighbour)
                        .map_or(MIN_STOP_SPACING, |stop| {
                            haversine_distance(stop.location, location).max(MIN_STOP_SPACING)
                        })
                })
            });
            stop_times.insert(
                position,
                StopTimeEntry {
                    stop_id: stop_id.clone(),
                    sequence: position,
                    gtfs_sequence: None,
                    arrival_time,
                    departure_time,
                    distance_along_trip,
                },
            );
            true
        })
    }

    /// Updates the times of the first stop-time at `stop_id` whose current
    /// times match the given originals. `None` matches any time.
    pub fn update_stop_time(
        &self,
        trip_id: &AgencyAndId,
        stop_id: &AgencyAndId,
        original_arrival: Option<i32>,
        original_departure: Option<i32>,
        new_arrival: i32,
        new_departure: i32,
    ) -> bool {
        self.mutate_stop_times(trip_id, |stop_times| {
            let found = stop_times.iter_mut().find(|st| {
                &st.stop_id == stop_id
                    && original_arrival.map_or(true, |t| st.arrival_time == t)
                    && original_departure.map_or(true, |t| st.departure_time == t)
            });
            match found {
                Some(stop_time) => {
                    stop_time.arrival_time = new_arrival;
                    stop_time.departure_time = new_departure;
                    true
                }
                None => false,
            }
        })
    }

    /// Replaces the trip's stop-times wholesale.
    pub fn replace_stop_times(&self, trip_id: &AgencyAndId, stop_times: Vec<StopTimeEntry>) -> bool {
        self.mutate_stop_times(trip_id, move |current| {
            *current = stop_times;
            true
        })
    }

    // ========================================================================
    // Shapes
    // ========================================================================

    pub fn shape(&self, id: &AgencyAndId) -> Option<Arc<ShapePoints>> {
        self.shapes.get(id).map(|e| e.value().clone())
    }

    /// Stores a shape, replacing any previous one. Returns `true` if the id
    /// was new.
    pub fn add_shape(&self, mut shape: ShapePoints) -> bool {
        shape.ensure_dist_traveled();
        self.shapes.insert(shape.shape_id.clone(), Arc::new(shape)).is_none()
    }

    pub fn remove_shape(&self, id: &AgencyAndId) -> bool {
        self.shapes.remove(id).is_some()
    }

    /// Points the trip at a different shape. Stop-time structure is untouched,
    /// so indices stay valid.
    pub fn update_shape_for_trip(&self, trip_id: &AgencyAndId, shape_id: Option<AgencyAndId>) -> bool {
        self.mutate_trip(trip_id, false, |trip| {
            trip.shape_id = shape_id;
            true
        })
    }

    pub fn all_referenced_shape_ids(&self) -> Vec<AgencyAndId> {
        self.trips
            .iter()
            .filter_map(|e| e.value().shape_id.clone())
            .sorted()
            .dedup()
            .collect()
    }
}

impl Default for TransitGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitGraph for TransitGraphStore {
    fn trip_for_id(&self, id: &AgencyAndId) -> Option<Arc<TripEntry>> {
        TransitGraphStore::trip_for_id(self, id)
    }

    fn block_for_id(&self, id: &AgencyAndId) -> Option<Arc<BlockEntry>> {
        TransitGraphStore::block_for_id(self, id)
    }

    fn route_for_id(&self, id: &AgencyAndId) -> Option<Arc<RouteEntry>> {
        TransitGraphStore::route_for_id(self, id)
    }

    fn stop_for_id(&self, id: &AgencyAndId) -> Option<Arc<StopEntry>> {
        TransitGraphStore::stop_for_id(self, id)
    }

    fn shape(&self, id: &AgencyAndId) -> Option<Arc<ShapePoints>> {
        TransitGraphStore::shape(self, id)
    }

    fn trip_narrative(&self, id: &AgencyAndId) -> Option<Arc<TripNarrative>> {
        self.narratives.trip(id)
    }

    fn agency_ids(&self) -> Vec<Arc<str>> {
        sync::read(&self.agencies)
            .iter()
            .map(|agency| agency.id.clone())
            .collect()
    }
}

fn single_trip_configuration(trip: &Arc<TripEntry>) -> Option<Arc<BlockConfiguration>> {
    BlockConfiguration::builder(trip.block_id.clone(), ServiceIds::single(trip.service_id.clone()))
        .trips(vec![trip.clone()])
        .build()
        .map(Arc::new)
}

/// Scans from the end and returns the slot after the last stop-time that
/// sorts strictly before the new one.
fn insert_position(
    stop_times: &[StopTimeEntry],
    arrival_time: i32,
    departure_time: i32,
    distance_along_trip: Option<f64>,
) -> usize {
    stop_times
        .iter()
        .rposition(|st| match distance_along_trip {
            Some(distance) => {
                st.distance_along_trip < distance
                    || (st.distance_along_trip == distance && st.arrival_time < arrival_time)
            }
            None if arrival_time >= 0 => st.arrival_time < arrival_time,
            None => st.departure_time < departure_time,
        })
        .map_or(0, |index| index + 1)
}

/// Smallest distance placed between an inserted stop-time and the trip end
/// it extends.
const MIN_STOP_SPACING: f64 = 1.0;

/// Distance for a stop-time inserted at `position`. Between two stop-times it
/// is the midpoint; past either end it steps outward by `spacing` (metres to
/// the neighbouring stop), so distances stay strictly increasing.
fn interpolated_distance(
    stop_times: &[StopTimeEntry],
    position: usize,
    spacing: impl Fn(&AgencyAndId) -> f64,
) -> f64 {
    let before = position.checked_sub(1).and_then(|index| stop_times.get(index));
    let after = stop_times.get(position);
    match (before, after) {
        (Some(before), Some(after)) => (before.distance_along_trip + after.distance_along_trip) / 2.0,
        (None, Some(first)) if first.distance_along_trip > 0.0 => first.distance_along_trip / 2.0,
        (None, Some(first)) => first.distance_along_trip - spacing(&first.stop_id),
        (Some(last), None) => last.distance_along_trip + spacing(&last.stop_id),
        (None, None) => 0.0,
    }
}
