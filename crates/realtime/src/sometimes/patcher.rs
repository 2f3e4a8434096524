//! Applies GTFS-Sometimes service changes to the live graph.
//!
//! Every successful edit records its inverse. Before a new feed snapshot is
//! applied the inverses of the previous snapshot are replayed, so the graph
//! only ever carries one feed's worth of changes on top of the static
//! schedule.

use std::slice;
use std::sync::{Arc, Mutex};

use chrono::{Days, NaiveDate, NaiveDateTime};
use headway_transit::{
    sync, BlockIndexEngine, EntityIdResolver, StopNarrative, TransitGraphStore,
};
use tracing::{debug, error, info, warn};

use crate::sometimes::changesets::{
    ModifyTrip, ShapeChangeSet, StopChange, StopChangeSet, TripChangeSet,
};
use crate::sometimes::records::{ServiceChange, ServiceChangeType, Table};
use crate::sometimes::time::TimeService;

/// A service change classified by what it would do to the graph.
#[derive(Clone, Debug, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeOperation {
    /// (bare trip id, bare stop id) pairs.
    DeleteStopTimes(Vec<(String, String)>),
    AddStopTimes,
    AlterStopTimes,
    AddTrip,
    ModifyTrip,
    DeleteTrip,
    AddShape,
    DeleteShape,
    StopChange,
    Unsupported {
        table: Table,
        change_type: ServiceChangeType,
    },
}

impl ChangeOperation {
    pub fn classify(change: &ServiceChange) -> Self {
        use ServiceChangeType::*;

        match (change.table, change.change_type) {
            (Table::StopTimes, Delete) => Self::DeleteStopTimes(
                change
                    .affected_entities
                    .iter()
                    .filter_map(|entity| {
                        Some((entity.trip_id.clone()?, entity.stop_id.clone()?))
                    })
                    .collect(),
            ),
            (Table::StopTimes, Add) => Self::AddStopTimes,
            (Table::StopTimes, Alter) => Self::AlterStopTimes,
            (Table::Trips, Add) => Self::AddTrip,
            (Table::Trips, Alter) => Self::ModifyTrip,
            (Table::Trips, Delete) => Self::DeleteTrip,
            (Table::Shapes, Add) => Self::AddShape,
            (Table::Shapes, Delete) => Self::DeleteShape,
            (Table::Stops, Alter) => Self::StopChange,
            (table, change_type) => Self::Unsupported { table, change_type },
        }
    }
}

/// Counts for one batch of service changes.
///
/// `applied`, `failed` and `not_applicable` count changes; `mutations` counts
/// the graph edits the applied changes made (one DELETE change may remove
/// stop-times from several trips).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub submitted: usize,
    pub applied: usize,
    pub failed: usize,
    pub not_applicable: usize,
    pub mutations: usize,
}

enum Outcome {
    Applied(usize),
    Failed,
    NotApplicable,
}

/// Structural checks on a change, independent of the graph.
pub fn validate_service_change(change: &ServiceChange) -> bool {
    if change.affected_dates.is_empty() {
        debug!("service change on {} has no affected dates", change.table);
        return false;
    }
    let entities = change.affected_entities.len();
    let fields = change.affected_fields.len();
    match change.change_type {
        ServiceChangeType::Add => entities == 0 && fields > 0,
        ServiceChangeType::Alter => entities > 0 && fields == 1,
        ServiceChangeType::Delete => entities > 0 && fields == 0,
    }
}

/// Whether any date descriptor of the change covers `today`. Ranges are
/// inclusive at both ends; a range missing either end is never applicable.
pub fn date_is_applicable(change: &ServiceChange, today: NaiveDate) -> bool {
    for descriptor in &change.affected_dates {
        if descriptor.date == Some(today) {
            return true;
        }
        match (descriptor.from, descriptor.to) {
            (Some(from), Some(to)) => {
                if from <= today && today <= to {
                    return true;
                }
            }
            (Some(from), None) => {
                error!("open-ended date range starting {from} is not supported")
            }
            (None, Some(to)) => error!("date range ending {to} without a start is not supported"),
            (None, None) => {}
        }
    }
    false
}

#[derive(Debug, Default)]
struct PatchState {
    last_timestamp: Option<i64>,
    reapply_time: Option<NaiveDateTime>,
    revert_trips: TripChangeSet,
    revert_shapes: ShapeChangeSet,
    revert_stops: StopChangeSet,
}

pub struct ScheduleChangePatcher {
    graph: Arc<TransitGraphStore>,
    indices: Arc<BlockIndexEngine>,
    resolver: Arc<EntityIdResolver>,
    time: Arc<dyn TimeService>,
    state: Mutex<PatchState>,
}

impl ScheduleChangePatcher {
    pub fn new(
        graph: Arc<TransitGraphStore>,
        indices: Arc<BlockIndexEngine>,
        resolver: Arc<EntityIdResolver>,
        time: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            graph,
            indices,
            resolver,
            time,
            state: Mutex::new(PatchState::default()),
        }
    }

    pub fn handle_service_change(&self, change: &ServiceChange) -> bool {
        self.handle_service_changes(slice::from_ref(change)).applied > 0
    }

    /// Applies each change independently; a failing change never stops the
    /// rest of the batch. Indices are refreshed once if anything changed.
    pub fn handle_service_changes(&self, changes: &[ServiceChange]) -> PatchReport {
        let mut state = sync::lock(&self.state);
        let report = self.apply_changes(&mut state, changes);
        if report.mutations > 0 {
            self.indices.refresh();
        }
        report
    }

    /// Applies a complete feed snapshot in place of the previous one.
    /// Returns `None` when the feed is skipped.
    pub fn apply_feed(&self, timestamp: i64, changes: &[ServiceChange]) -> Option<PatchReport> {
        let mut state = sync::lock(&self.state);
        if !self.should_apply(&state, timestamp, changes) {
            return None;
        }

        let reverted = self.revert(&mut state);
        let report = self.apply_changes(&mut state, changes);
        if reverted + report.mutations > 0 {
            self.indices.refresh();
        }

        state.last_timestamp = Some(timestamp);
        state.reapply_time = self.next_midnight();
        Some(report)
    }

    /// Undoes everything applied since the last revert. Returns the number
    /// of entities restored.
    pub fn revert_previous_changes(&self) -> usize {
        let mut state = sync::lock(&self.state);
        let reverted = self.revert(&mut state);
        if reverted > 0 {
            self.indices.refresh();
        }
        reverted
    }

    /// Size of the pending reverse change-sets.
    pub fn pending_revert_size(&self) -> usize {
        let state = sync::lock(&self.state);
        state.revert_trips.size() + state.revert_shapes.size() + state.revert_stops.size()
    }

    fn should_apply(&self, state: &PatchState, timestamp: i64, changes: &[ServiceChange]) -> bool {
        match state.last_timestamp {
            None if changes.is_empty() => {
                info!("first schedule change feed is empty, ignoring");
                false
            }
            None => {
                info!("first schedule change feed at {timestamp}");
                true
            }
            Some(last) if last < timestamp => {
                info!("schedule change feed updated at {timestamp}");
                true
            }
            Some(last) if last == timestamp => {
                let now = self.time.current_time();
                let due = state.reapply_time.is_some_and(|reapply| now > reapply);
                debug!("schedule change feed unchanged at {timestamp}, reapply due: {due}");
                due
            }
            Some(last) => {
                error!("schedule change feed timestamp went backwards: {timestamp} after {last}");
                false
            }
        }
    }

    fn next_midnight(&self) -> Option<NaiveDateTime> {
        self.time
            .current_date()
            .checked_add_days(Days::new(1))
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    fn apply_changes(&self, state: &mut PatchState, changes: &[ServiceChange]) -> PatchReport {
        let today = self.time.current_date();
        let mut report = PatchReport {
            submitted: changes.len(),
            ..PatchReport::default()
        };

        for change in changes {
            match self.apply_change(state, change, today) {
                Outcome::Applied(mutations) => {
                    report.applied += 1;
                    report.mutations += mutations;
                }
                Outcome::Failed => report.failed += 1,
                Outcome::NotApplicable => report.not_applicable += 1,
            }
        }

        info!(
            "applied {} of {} service changes with {} graph edits ({} failed, {} not applicable)",
            report.applied, report.submitted, report.mutations, report.failed, report.not_applicable
        );
        report
    }

    fn apply_change(&self, state: &mut PatchState, change: &ServiceChange, today: NaiveDate) -> Outcome {
        if !validate_service_change(change) {
            warn!("skipping invalid {} {} change", change.change_type, change.table);
            return Outcome::Failed;
        }
        if !date_is_applicable(change, today) {
            debug!("{} {} change does not apply on {today}", change.change_type, change.table);
            return Outcome::NotApplicable;
        }

        match ChangeOperation::classify(change) {
            ChangeOperation::DeleteStopTimes(stop_times) => {
                match self.delete_stop_times(state, &stop_times) {
                    0 => Outcome::Failed,
                    deleted => Outcome::Applied(deleted),
                }
            }
            operation => {
                error!(
                    "unsupported service change {operation} ({} {})",
                    change.change_type, change.table
                );
                Outcome::Failed
            }
        }
    }

    /// Returns how many stop-times were removed.
    fn delete_stop_times(&self, state: &mut PatchState, stop_times: &[(String, String)]) -> usize {
        let mut deleted = 0;
        for (bare_trip_id, bare_stop_id) in stop_times {
            let trip_id = self.resolver.trip_id(bare_trip_id);
            let stop_id = self.resolver.stop_id(bare_stop_id);
            let Some(trip) = self.graph.trip_for_id(&trip_id) else {
                warn!("cannot delete stop time: trip {trip_id} not found");
                continue;
            };

            if self.graph.delete_stop_time(&trip_id, &stop_id) {
                debug!("deleted stop time at {stop_id} from trip {trip_id}");
                state.revert_trips.add_modified_trip(ModifyTrip {
                    trip_id,
                    stop_times: trip.stop_times().to_vec(),
                });
                deleted += 1;
            } else {
                info!("trip {trip_id} has no stop time at {stop_id}");
            }
        }
        deleted
    }

    fn revert(&self, state: &mut PatchState) -> usize {
        let shapes = std::mem::take(&mut state.revert_shapes);
        let stops = std::mem::take(&mut state.revert_stops);
        let trips = std::mem::take(&mut state.revert_trips);

        let restored_shapes = self.apply_shape_changes(&shapes).size();
        if restored_shapes != shapes.size() {
            error!("reverted {restored_shapes} of {} shape changes", shapes.size());
        }
        let restored_stops = self.apply_stop_changes(&stops).size();
        if restored_stops != stops.size() {
            error!("reverted {restored_stops} of {} stop changes", stops.size());
        }
        let restored_trips = self.apply_trip_changes(&trips).size();
        if restored_trips != trips.size() {
            error!("reverted {restored_trips} of {} trip changes", trips.size());
        }

        let restored = restored_shapes + restored_stops + restored_trips;
        if restored > 0 {
            info!("reverted {restored} previously applied schedule changes");
        }
        restored
    }

    /// Applies a trip change-set and returns the change-set that undoes it.
    pub fn apply_trip_changes(&self, changes: &TripChangeSet) -> TripChangeSet {
        let mut reverse = TripChangeSet::default();

        for trip_id in changes.deleted_trips() {
            let Some(trip) = self.graph.trip_for_id(trip_id) else {
                warn!("cannot delete unknown trip {trip_id}");
                continue;
            };
            if self.graph.delete_trip_entry_for_id(trip_id) {
                reverse.add_added_trip((*trip).clone());
            }
        }

        for modify in changes.modified_trips() {
            let Some(trip) = self.graph.trip_for_id(&modify.trip_id) else {
                warn!("cannot modify unknown trip {}", modify.trip_id);
                continue;
            };
            if self
                .graph
                .replace_stop_times(&modify.trip_id, modify.stop_times.clone())
            {
                reverse.add_modified_trip(ModifyTrip {
                    trip_id: modify.trip_id.clone(),
                    stop_times: trip.stop_times().to_vec(),
                });
            }
        }

        for trip in changes.added_trips() {
            match self.graph.add_trip_entry(trip.clone(), None) {
                Ok(true) => reverse.add_deleted_trip(trip.id.clone()),
                Ok(false) => warn!("trip {} already exists", trip.id),
                Err(e) => error!("cannot add trip {}: {e}", trip.id),
            }
        }

        reverse
    }

    pub fn apply_shape_changes(&self, changes: &ShapeChangeSet) -> ShapeChangeSet {
        let mut reverse = ShapeChangeSet::default();

        for shape in changes.added_shapes() {
            let previous = self.graph.shape(&shape.shape_id);
            self.graph.add_shape(shape.clone());
            match previous {
                Some(previous) => reverse.add_added_shape((*previous).clone()),
                None => reverse.add_deleted_shape(shape.shape_id.clone()),
            }
        }

        for shape_id in changes.deleted_shapes() {
            if let Some(previous) = self.graph.shape(shape_id) {
                if self.graph.remove_shape(shape_id) {
                    reverse.add_added_shape((*previous).clone());
                }
            }
        }

        reverse
    }

    pub fn apply_stop_changes(&self, changes: &StopChangeSet) -> StopChangeSet {
        let mut reverse = StopChangeSet::default();

        for change in changes.stop_changes() {
            let Some(stop) = self.graph.stop_for_id(&change.stop_id) else {
                warn!("cannot change unknown stop {}", change.stop_id);
                continue;
            };
            let mut undo = StopChange::new(change.stop_id.clone());

            if let Some(name) = &change.stop_name {
                undo.stop_name = self
                    .graph
                    .narratives()
                    .stop(&change.stop_id)
                    .map(|narrative| narrative.name.to_string());
                self.graph.narratives().add_stop(
                    change.stop_id.clone(),
                    StopNarrative {
                        name: name.as_str().into(),
                    },
                );
            }

            if change.stop_lat.is_some() || change.stop_lon.is_some() {
                let lat = change.stop_lat.unwrap_or_else(|| stop.lat());
                let lon = change.stop_lon.unwrap_or_else(|| stop.lon());
                if self.graph.move_stop_entry(&change.stop_id, lat, lon).is_some() {
                    undo.stop_lat = Some(stop.lat());
                    undo.stop_lon = Some(stop.lon());
                }
            }

            reverse.add_stop_change(undo);
        }

        reverse
    }
}
