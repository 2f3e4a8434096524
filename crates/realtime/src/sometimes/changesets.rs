//! Graph edits grouped by entity type.
//!
//! Applying a change-set yields another change-set that undoes it, so the
//! patcher can restore the static schedule before applying the next feed.

use headway_transit::{AgencyAndId, ShapePoints, StopTimeEntry, TripEntry};

/// Replaces a trip's stop-times wholesale.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifyTrip {
    pub trip_id: AgencyAndId,
    pub stop_times: Vec<StopTimeEntry>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TripChangeSet {
    deleted_trips: Vec<AgencyAndId>,
    modified_trips: Vec<ModifyTrip>,
    added_trips: Vec<TripEntry>,
}

impl TripChangeSet {
    pub fn add_deleted_trip(&mut self, trip_id: AgencyAndId) {
        self.deleted_trips.push(trip_id);
    }

    /// Keeps only the first modification recorded for a trip, so a reverse
    /// set always holds the stop-times from before any edit.
    pub fn add_modified_trip(&mut self, modify: ModifyTrip) {
        if !self.contains_modified_trip(&modify.trip_id) {
            self.modified_trips.push(modify);
        }
    }

    pub fn add_added_trip(&mut self, trip: TripEntry) {
        self.added_trips.push(trip);
    }

    pub fn contains_modified_trip(&self, trip_id: &AgencyAndId) -> bool {
        self.modified_trips.iter().any(|m| &m.trip_id == trip_id)
    }

    pub fn deleted_trips(&self) -> &[AgencyAndId] {
        &self.deleted_trips
    }

    pub fn modified_trips(&self) -> &[ModifyTrip] {
        &self.modified_trips
    }

    pub fn added_trips(&self) -> &[TripEntry] {
        &self.added_trips
    }

    pub fn size(&self) -> usize {
        self.deleted_trips.len() + self.modified_trips.len() + self.added_trips.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapeChangeSet {
    added_shapes: Vec<ShapePoints>,
    deleted_shapes: Vec<AgencyAndId>,
}

impl ShapeChangeSet {
    pub fn add_added_shape(&mut self, shape: ShapePoints) {
        self.added_shapes.push(shape);
    }

    pub fn add_deleted_shape(&mut self, shape_id: AgencyAndId) {
        self.deleted_shapes.push(shape_id);
    }

    pub fn added_shapes(&self) -> &[ShapePoints] {
        &self.added_shapes
    }

    pub fn deleted_shapes(&self) -> &[AgencyAndId] {
        &self.deleted_shapes
    }

    pub fn size(&self) -> usize {
        self.added_shapes.len() + self.deleted_shapes.len()
    }
}

/// New values for a stop. `None` leaves the field alone.
#[derive(Clone, Debug, PartialEq)]
pub struct StopChange {
    pub stop_id: AgencyAndId,
    pub stop_name: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
}

impl StopChange {
    pub fn new(stop_id: AgencyAndId) -> Self {
        Self {
            stop_id,
            stop_name: None,
            stop_lat: None,
            stop_lon: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StopChangeSet {
    stop_changes: Vec<StopChange>,
}

impl StopChangeSet {
    pub fn add_stop_change(&mut self, change: StopChange) {
        self.stop_changes.push(change);
    }

    pub fn stop_changes(&self) -> &[StopChange] {
        &self.stop_changes
    }

    pub fn size(&self) -> usize {
        self.stop_changes.len()
    }
}
