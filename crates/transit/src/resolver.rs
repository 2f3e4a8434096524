//! Resolution of bare feed ids onto graph ids.
//!
//! Realtime feeds usually carry ids without an agency prefix. Candidate
//! agencies are tried in order and the first one under which the entity
//! exists wins. Unresolvable ids degrade to `(default agency, bare id)` with
//! a warning; callers must tolerate ids that point at nothing.

use std::sync::Arc;

use tracing::warn;

use crate::identifiers::AgencyAndId;
use crate::models::calendar::CalendarService;
use crate::models::traits::TransitGraph;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Trip,
    Stop,
    /// Resolves to the parent route collection of the matching route.
    Route,
    Shape,
    Service,
}

pub struct EntityIdResolver {
    graph: Arc<dyn TransitGraph>,
    calendar: Arc<dyn CalendarService>,
    configured_agency_ids: Vec<Arc<str>>,
}

impl EntityIdResolver {
    /// `agency_ids` is the ordered candidate list. When empty, the agencies
    /// known to the graph are tried instead.
    pub fn new(
        graph: Arc<dyn TransitGraph>,
        calendar: Arc<dyn CalendarService>,
        agency_ids: Vec<String>,
        warn_agency_threshold: usize,
    ) -> Self {
        let resolver = Self {
            graph,
            calendar,
            configured_agency_ids: agency_ids.into_iter().map(Arc::from).collect(),
        };

        if resolver.configured_agency_ids.is_empty() {
            let discovered = resolver.graph.agency_ids();
            if discovered.len() > warn_agency_threshold {
                warn!(
                    "no agency ids configured, probing all {} agencies of the graph",
                    discovered.len()
                );
            }
        }
        resolver
    }

    pub fn candidate_agency_ids(&self) -> Vec<Arc<str>> {
        if self.configured_agency_ids.is_empty() {
            self.graph.agency_ids()
        } else {
            self.configured_agency_ids.clone()
        }
    }

    pub fn default_agency_id(&self) -> Arc<str> {
        match self.candidate_agency_ids().into_iter().next() {
            Some(agency_id) => agency_id,
            None => {
                warn!("no agencies known, falling back to an empty agency id");
                Arc::from("")
            }
        }
    }

    pub fn resolve(&self, kind: EntityKind, bare_id: &str) -> AgencyAndId {
        for agency_id in self.candidate_agency_ids() {
            let candidate = AgencyAndId::new(&*agency_id, bare_id);
            if let Some(resolved) = self.lookup(kind, &candidate) {
                return resolved;
            }
        }

        if kind != EntityKind::Service {
            if let Some(resolved) = AgencyAndId::parse(bare_id).and_then(|id| self.lookup(kind, &id)) {
                return resolved;
            }
        }

        let fallback = AgencyAndId::new(&*self.default_agency_id(), bare_id);
        warn!("unable to resolve {kind} id {bare_id:?}, using {fallback}");
        fallback
    }

    fn lookup(&self, kind: EntityKind, id: &AgencyAndId) -> Option<AgencyAndId> {
        match kind {
            EntityKind::Trip => self.graph.trip_for_id(id).map(|_| id.clone()),
            EntityKind::Stop => self.graph.stop_for_id(id).map(|_| id.clone()),
            EntityKind::Route => self.graph.route_for_id(id).map(|route| route.parent_id.clone()),
            EntityKind::Shape => self.graph.shape(id).map(|_| id.clone()),
            EntityKind::Service => self
                .calendar
                .has_service_dates(id)
                .then(|| id.clone()),
        }
    }

    pub fn trip_id(&self, bare_id: &str) -> AgencyAndId {
        self.resolve(EntityKind::Trip, bare_id)
    }

    pub fn stop_id(&self, bare_id: &str) -> AgencyAndId {
        self.resolve(EntityKind::Stop, bare_id)
    }

    /// Id of the route collection containing the route.
    pub fn route_id(&self, bare_id: &str) -> AgencyAndId {
        self.resolve(EntityKind::Route, bare_id)
    }

    pub fn shape_id(&self, bare_id: &str) -> AgencyAndId {
        self.resolve(EntityKind::Shape, bare_id)
    }

    pub fn service_id(&self, bare_id: &str) -> AgencyAndId {
        self.resolve(EntityKind::Service, bare_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TransitGraphStore;
    use crate::models::calendar::{CalendarData, ServiceCalendar, WeekdayFlags};
    use crate::models::entities::{AgencyEntry, StopEntry, TripEntry};
    use crate::models::types::StopTimeEntry;
    use chrono::NaiveDate;

    fn trip(agency: &str, id: &str) -> TripEntry {
        TripEntry::new(
            AgencyAndId::new(agency, id),
            AgencyAndId::new(agency, "routeA"),
            None,
            AgencyAndId::new(agency, "weekday"),
            vec![StopTimeEntry::new(AgencyAndId::new(agency, "stopA"), 1, 0, 0, 0.0)],
        )
    }

    fn resolver(agency_ids: &[&str]) -> EntityIdResolver {
        let graph = TransitGraphStore::new();
        graph.add_agency(AgencyEntry::new("1", "America/New_York"));
        graph.add_agency(AgencyEntry::new("2", "America/New_York"));
        graph
            .add_route_entry(AgencyAndId::new("2", "R10"), AgencyAndId::new("2", "R10C"))
            .unwrap();
        graph.add_trip_entry(trip("1", "T1"), None).unwrap();
        graph.add_trip_entry(trip("2", "T1"), None).unwrap();
        graph.add_trip_entry(trip("2", "T2"), None).unwrap();
        graph.add_stop_entry(StopEntry::new(AgencyAndId::new("2", "S1"), 40.7, -74.0), None);

        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2018, 12, 31).unwrap();
        let calendar = CalendarData::new([ServiceCalendar::new(
            AgencyAndId::new("2", "weekday"),
            start,
            end,
            WeekdayFlags::WEEKDAYS,
        )]);

        EntityIdResolver::new(
            Arc::new(graph),
            Arc::new(calendar),
            agency_ids.iter().map(|s| s.to_string()).collect(),
            3,
        )
    }

    #[test]
    fn test_route_resolves_to_collection() {
        let resolver = resolver(&["1", "2"]);
        assert_eq!(resolver.route_id("R10"), AgencyAndId::new("2", "R10C"));
    }

    #[test]
    fn test_unknown_id_falls_back_to_first_agency() {
        let resolver = resolver(&["1", "2"]);
        assert_eq!(resolver.route_id("R11"), AgencyAndId::new("1", "R11"));
        assert_eq!(resolver.stop_id("S9"), AgencyAndId::new("1", "S9"));
    }

    #[test]
    fn test_first_matching_agency_wins() {
        let resolver = resolver(&["1", "2"]);
        assert_eq!(resolver.trip_id("T1"), AgencyAndId::new("1", "T1"));

        let reversed = self::resolver(&["2", "1"]);
        assert_eq!(reversed.trip_id("T1"), AgencyAndId::new("2", "T1"));
    }

    #[test]
    fn test_composite_id_accepted_when_entity_exists() {
        let resolver = resolver(&["1"]);
        assert_eq!(resolver.trip_id("2_T2"), AgencyAndId::new("2", "T2"));
        assert_eq!(resolver.stop_id("2_S1"), AgencyAndId::new("2", "S1"));
        // Parsed but missing: fallback keeps the raw string as local id
        assert_eq!(resolver.trip_id("2_T9"), AgencyAndId::new("1", "2_T9"));
    }

    #[test]
    fn test_service_ids_use_calendar() {
        let resolver = resolver(&["1", "2"]);
        assert_eq!(resolver.service_id("weekday"), AgencyAndId::new("2", "weekday"));
        // No composite parse for services
        assert_eq!(resolver.service_id("2_weekday"), AgencyAndId::new("1", "2_weekday"));
    }

    #[test]
    fn test_default_agency_from_graph() {
        let resolver = resolver(&[]);
        assert_eq!(&*resolver.default_agency_id(), "1");
        assert_eq!(resolver.candidate_agency_ids().len(), 2);
        assert_eq!(resolver.route_id("R10"), AgencyAndId::new("2", "R10C"));
    }
}
