//! Narrative cache for graph entities.

use std::sync::Arc;

use dashmap::DashMap;

use crate::identifiers::AgencyAndId;
use crate::models::narrative::{RouteCollectionNarrative, StopNarrative, TripNarrative};

#[derive(Debug, Default)]
pub struct NarrativeStore {
    trips: DashMap<AgencyAndId, Arc<TripNarrative>>,
    stops: DashMap<AgencyAndId, Arc<StopNarrative>>,
    route_collections: DashMap<AgencyAndId, Arc<RouteCollectionNarrative>>,
}

impl NarrativeStore {
    pub fn trip(&self, id: &AgencyAndId) -> Option<Arc<TripNarrative>> {
        self.trips.get(id).map(|n| n.clone())
    }

    pub fn add_trip(&self, id: AgencyAndId, narrative: TripNarrative) {
        self.trips.insert(id, Arc::new(narrative));
    }

    pub fn remove_trip(&self, id: &AgencyAndId) -> Option<Arc<TripNarrative>> {
        self.trips.remove(id).map(|(_, n)| n)
    }

    pub fn stop(&self, id: &AgencyAndId) -> Option<Arc<StopNarrative>> {
        self.stops.get(id).map(|n| n.clone())
    }

    pub fn add_stop(&self, id: AgencyAndId, narrative: StopNarrative) {
        self.stops.insert(id, Arc::new(narrative));
    }

    pub fn remove_stop(&self, id: &AgencyAndId) -> Option<Arc<StopNarrative>> {
        self.stops.remove(id).map(|(_, n)| n)
    }

    pub fn route_collection(&self, id: &AgencyAndId) -> Option<Arc<RouteCollectionNarrative>> {
        self.route_collections.get(id).map(|n| n.clone())
    }

    pub fn add_route_collection(&self, id: AgencyAndId, narrative: RouteCollectionNarrative) {
        self.route_collections.insert(id, Arc::new(narrative));
    }
}
