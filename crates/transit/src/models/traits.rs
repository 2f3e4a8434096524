//! Read-side interface of the transit graph.
//!
//! Implemented by the authoritative [`TransitGraphStore`](crate::graph::TransitGraphStore)
//! and by the dynamic view holding trips added at runtime by realtime feeds.

use std::sync::Arc;

use crate::identifiers::AgencyAndId;
use crate::models::block::BlockEntry;
use crate::models::entities::{RouteEntry, ShapePoints, StopEntry, TripEntry};
use crate::models::narrative::TripNarrative;

// ============================================================================
// Graph lookups
// ============================================================================

pub trait TransitGraph: Send + Sync {
    fn trip_for_id(&self, id: &AgencyAndId) -> Option<Arc<TripEntry>>;

    fn block_for_id(&self, id: &AgencyAndId) -> Option<Arc<BlockEntry>>;

    fn route_for_id(&self, id: &AgencyAndId) -> Option<Arc<RouteEntry>>;

    fn stop_for_id(&self, id: &AgencyAndId) -> Option<Arc<StopEntry>>;

    fn shape(&self, id: &AgencyAndId) -> Option<Arc<ShapePoints>>;

    fn trip_narrative(&self, id: &AgencyAndId) -> Option<Arc<TripNarrative>>;

    /// Agency ids in registration order.
    fn agency_ids(&self) -> Vec<Arc<str>>;
}

impl<T: TransitGraph + ?Sized> TransitGraph for Arc<T> {
    fn trip_for_id(&self, id: &AgencyAndId) -> Option<Arc<TripEntry>> {
        (**self).trip_for_id(id)
    }

    fn block_for_id(&self, id: &AgencyAndId) -> Option<Arc<BlockEntry>> {
        (**self).block_for_id(id)
    }

    fn route_for_id(&self, id: &AgencyAndId) -> Option<Arc<RouteEntry>> {
        (**self).route_for_id(id)
    }

    fn stop_for_id(&self, id: &AgencyAndId) -> Option<Arc<StopEntry>> {
        (**self).stop_for_id(id)
    }

    fn shape(&self, id: &AgencyAndId) -> Option<Arc<ShapePoints>> {
        (**self).shape(id)
    }

    fn trip_narrative(&self, id: &AgencyAndId) -> Option<Arc<TripNarrative>> {
        (**self).trip_narrative(id)
    }

    fn agency_ids(&self) -> Vec<Arc<str>> {
        (**self).agency_ids()
    }
}
