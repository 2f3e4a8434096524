//! Flag registries fed by realtime feeds and read by query services.
//!
//! Each registry sits on a [`SnapshotMap`]: readers clone an `Arc` of the
//! current map, and a feed publishing a complete new snapshot swaps the whole
//! map at once. No reader ever sees a half-replaced set.

use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use headway_transit::{sync, AgencyAndId};
use serde::Deserialize;
use tracing::debug;

pub struct SnapshotMap<K, V> {
    current: RwLock<Arc<HashMap<K, V>>>,
}

impl<K, V> Default for SnapshotMap<K, V> {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SnapshotMap<K, V> {
    pub fn snapshot(&self) -> Arc<HashMap<K, V>> {
        sync::read(&self.current).clone()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        sync::read(&self.current).contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        sync::read(&self.current).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        sync::read(&self.current).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn replace(&self, entries: HashMap<K, V>) {
        *sync::write(&self.current) = Arc::new(entries);
    }

    /// Copies the map first if a reader still holds the current snapshot.
    pub fn insert(&self, key: K, value: V) {
        let mut current = sync::write(&self.current);
        Arc::make_mut(&mut current).insert(key, value);
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CancelledTrip {
    pub trip_id: AgencyAndId,
    #[serde(default)]
    pub route_id: Option<AgencyAndId>,
    #[serde(default)]
    pub block_id: Option<AgencyAndId>,
    #[serde(default)]
    pub service_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CancelledTrip {
    pub fn new(trip_id: AgencyAndId) -> Self {
        Self {
            trip_id,
            route_id: None,
            block_id: None,
            service_date: None,
            status: None,
        }
    }
}

#[derive(Default)]
pub struct CancelledTripRegistry {
    trips: SnapshotMap<AgencyAndId, CancelledTrip>,
}

impl CancelledTripRegistry {
    pub fn is_trip_cancelled(&self, trip_id: &AgencyAndId) -> bool {
        self.trips.contains_key(trip_id)
    }

    /// Takes a `"{agency}_{id}"` string. Unparseable ids are never cancelled.
    pub fn is_trip_cancelled_str(&self, trip_id: &str) -> bool {
        AgencyAndId::parse(trip_id).is_some_and(|id| self.is_trip_cancelled(&id))
    }

    pub fn cancelled_trip(&self, trip_id: &AgencyAndId) -> Option<CancelledTrip> {
        self.trips.get(trip_id)
    }

    pub fn cancelled_trips(&self) -> Arc<HashMap<AgencyAndId, CancelledTrip>> {
        self.trips.snapshot()
    }

    pub fn update_cancelled_trips(&self, trips: impl IntoIterator<Item = CancelledTrip>) {
        let trips: HashMap<_, _> = trips
            .into_iter()
            .map(|trip| (trip.trip_id.clone(), trip))
            .collect();
        debug!("replacing cancelled trips with {} entries", trips.len());
        self.trips.replace(trips);
    }

    pub fn add_cancelled_trip(&self, trip: CancelledTrip) {
        self.trips.insert(trip.trip_id.clone(), trip);
    }
}

pub trait VehicleFlag {
    const NAME: &'static str;
}

pub enum Kneeling {}

impl VehicleFlag for Kneeling {
    const NAME: &'static str = "kneeling";
}

pub enum Stroller {}

impl VehicleFlag for Stroller {
    const NAME: &'static str = "stroller";
}

/// Set of vehicles carrying flag `F`.
pub struct VehicleFlagRegistry<F> {
    vehicles: SnapshotMap<AgencyAndId, ()>,
    _flag: PhantomData<F>,
}

pub type KneelingVehicleRegistry = VehicleFlagRegistry<Kneeling>;
pub type StrollerVehicleRegistry = VehicleFlagRegistry<Stroller>;

impl<F> Default for VehicleFlagRegistry<F> {
    fn default() -> Self {
        Self {
            vehicles: SnapshotMap::default(),
            _flag: PhantomData,
        }
    }
}

impl<F: VehicleFlag> VehicleFlagRegistry<F> {
    pub fn contains(&self, vehicle_id: &AgencyAndId) -> bool {
        self.vehicles.contains_key(vehicle_id)
    }

    pub fn contains_str(&self, vehicle_id: &str) -> bool {
        AgencyAndId::parse(vehicle_id).is_some_and(|id| self.contains(&id))
    }

    /// Sorted.
    pub fn vehicles(&self) -> Vec<AgencyAndId> {
        let mut vehicles: Vec<_> = self.vehicles.snapshot().keys().cloned().collect();
        vehicles.sort();
        vehicles
    }

    pub fn update(&self, vehicle_ids: impl IntoIterator<Item = AgencyAndId>) {
        let vehicles: HashMap<_, _> = vehicle_ids.into_iter().map(|id| (id, ())).collect();
        debug!("replacing {} vehicles with {} entries", F::NAME, vehicles.len());
        self.vehicles.replace(vehicles);
    }

    pub fn add(&self, vehicle_id: AgencyAndId) {
        self.vehicles.insert(vehicle_id, ());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aid(id: &str) -> AgencyAndId {
        AgencyAndId::new("1", id)
    }

    #[test]
    fn test_cancelled_trips() {
        let registry = CancelledTripRegistry::default();
        registry.add_cancelled_trip(CancelledTrip::new(aid("trip1")));

        assert!(registry.is_trip_cancelled(&aid("trip1")));
        assert!(registry.is_trip_cancelled_str("1_trip1"));
        assert!(!registry.is_trip_cancelled_str("trip1"));
        assert!(!registry.is_trip_cancelled(&aid("trip2")));

        registry.update_cancelled_trips([CancelledTrip::new(aid("trip2"))]);
        assert!(!registry.is_trip_cancelled(&aid("trip1")));
        assert_eq!(registry.cancelled_trips().len(), 1);
        assert!(registry.cancelled_trip(&aid("trip2")).is_some());
    }

    #[test]
    fn test_swap_leaves_reader_snapshot_intact() {
        let registry = KneelingVehicleRegistry::default();
        registry.update([aid("bus1"), aid("bus2")]);
        let before = registry.vehicles.snapshot();

        registry.update([aid("bus3")]);
        registry.add(aid("bus4"));

        assert_eq!(before.len(), 2);
        assert_eq!(registry.vehicles(), vec![aid("bus3"), aid("bus4")]);
        assert!(registry.contains_str("1_bus3"));
        assert!(!registry.contains(&aid("bus1")));
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_sets() {
        let registry = StrollerVehicleRegistry::default();
        let small: Vec<_> = (0..10).map(|i| aid(&format!("bus{i}"))).collect();
        let large: Vec<_> = (0..50).map(|i| aid(&format!("bus{i}"))).collect();
        registry.update(small.clone());

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..200 {
                    registry.update(if round % 2 == 0 { large.clone() } else { small.clone() });
                }
            });
            for _ in 0..200 {
                let size = registry.vehicles().len();
                assert!(size == 10 || size == 50);
            }
        });
    }
}
