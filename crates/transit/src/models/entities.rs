//! Graph entities.
//!
//! Entities are immutable once published into the graph store. Mutations build
//! a replacement value and swap the `Arc` held by the store.

use std::sync::Arc;

use geo::{LineString, Point};

use crate::identifiers::AgencyAndId;
use crate::models::types::StopTimeEntry;
use crate::spatial::queries::haversine_distance;

#[derive(Clone, Debug, PartialEq)]
pub struct AgencyEntry {
    pub id: Arc<str>,
    pub timezone: Arc<str>,
    pub route_collection_ids: Vec<AgencyAndId>,
}

impl AgencyEntry {
    pub fn new(id: impl AsRef<str>, timezone: impl AsRef<str>) -> Self {
        Self {
            id: id.as_ref().into(),
            timezone: timezone.as_ref().into(),
            route_collection_ids: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StopEntry {
    pub id: AgencyAndId,
    pub location: Point,
    /// Dense index assigned by the store.
    pub index: usize,
}

impl StopEntry {
    pub fn new(id: AgencyAndId, lat: f64, lon: f64) -> Self {
        Self {
            id,
            location: Point::new(lon, lat),
            index: 0,
        }
    }

    pub fn lat(&self) -> f64 {
        self.location.y()
    }

    pub fn lon(&self) -> f64 {
        self.location.x()
    }
}

/// A route variant. Riders see its parent [`RouteCollectionEntry`].
#[derive(Clone, Debug, PartialEq)]
pub struct RouteEntry {
    pub id: AgencyAndId,
    pub parent_id: AgencyAndId,
    pub trip_ids: Vec<AgencyAndId>,
}

impl RouteEntry {
    pub fn new(id: AgencyAndId, parent_id: AgencyAndId) -> Self {
        Self {
            id,
            parent_id,
            trip_ids: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteCollectionEntry {
    pub id: AgencyAndId,
    pub route_ids: Vec<AgencyAndId>,
}

/// A trip together with the single owned sequence of its stop-times.
#[derive(Clone, Debug, PartialEq)]
pub struct TripEntry {
    pub id: AgencyAndId,
    pub route_id: AgencyAndId,
    /// Single-trip blocks use the trip id as block id.
    pub block_id: AgencyAndId,
    pub service_id: AgencyAndId,
    pub shape_id: Option<AgencyAndId>,
    pub direction_id: Option<Arc<str>>,
    pub total_trip_distance: f64,
    stop_times: Vec<StopTimeEntry>,
}

impl TripEntry {
    pub fn new(
        id: AgencyAndId,
        route_id: AgencyAndId,
        block_id: Option<AgencyAndId>,
        service_id: AgencyAndId,
        stop_times: Vec<StopTimeEntry>,
    ) -> Self {
        let block_id = block_id.unwrap_or_else(|| id.clone());
        let mut trip = Self {
            id,
            route_id,
            block_id,
            service_id,
            shape_id: None,
            direction_id: None,
            total_trip_distance: 0.0,
            stop_times: Vec::new(),
        };
        trip.set_stop_times(stop_times);
        trip
    }

    pub fn with_shape(mut self, shape_id: AgencyAndId) -> Self {
        self.shape_id = Some(shape_id);
        self
    }

    pub fn with_direction(mut self, direction_id: impl AsRef<str>) -> Self {
        self.direction_id = Some(direction_id.as_ref().into());
        self
    }

    pub fn stop_times(&self) -> &[StopTimeEntry] {
        &self.stop_times
    }

    /// Replace the stop-times, re-sequencing them from 0.
    pub fn set_stop_times(&mut self, mut stop_times: Vec<StopTimeEntry>) {
        for (sequence, stop_time) in stop_times.iter_mut().enumerate() {
            stop_time.sequence = sequence;
        }
        self.total_trip_distance = stop_times
            .last()
            .map(|st| st.distance_along_trip)
            .unwrap_or_default();
        self.stop_times = stop_times;
    }

    pub fn first_departure(&self) -> Option<i32> {
        self.stop_times.first().map(|st| st.departure_time)
    }

    pub fn last_arrival(&self) -> Option<i32> {
        self.stop_times.last().map(|st| st.arrival_time)
    }
}

/// Ordered polyline of a shape with the distance travelled at each point.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapePoints {
    pub shape_id: AgencyAndId,
    pub points: LineString,
    pub dist_traveled: Vec<f64>,
}

impl ShapePoints {
    /// Build from lat/lon pairs, computing distances along the line.
    pub fn from_lat_lons(shape_id: AgencyAndId, lat_lons: &[(f64, f64)]) -> Self {
        let points = LineString::from(
            lat_lons
                .iter()
                .map(|&(lat, lon)| (lon, lat))
                .collect::<Vec<_>>(),
        );
        let mut shape = Self {
            shape_id,
            points,
            dist_traveled: Vec::new(),
        };
        shape.ensure_dist_traveled();
        shape
    }

    pub fn len(&self) -> usize {
        self.points.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.0.is_empty()
    }

    /// Fill in distances travelled when they are missing or inconsistent.
    pub fn ensure_dist_traveled(&mut self) {
        if self.dist_traveled.len() == self.len()
            && self.dist_traveled.iter().skip(1).any(|d| *d > 0.0)
        {
            return;
        }

        let mut total = 0.0;
        let mut distances = Vec::with_capacity(self.len());
        let mut previous: Option<Point> = None;
        for point in self.points.points() {
            if let Some(prev) = previous {
                total += haversine_distance(prev, point);
            }
            distances.push(total);
            previous = Some(point);
        }
        self.dist_traveled = distances;
    }
}
