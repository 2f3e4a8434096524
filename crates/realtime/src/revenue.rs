use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use headway_transit::{sync, AgencyAndId};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum CacheKey {
    Stop(AgencyAndId),
    StopOnRoute(AgencyAndId, AgencyAndId, String),
}

/// One loaded index together with the answers computed from it. Swapped as a
/// unit, so a memoised answer always belongs to the index it was read from.
#[derive(Default)]
struct RevenueSnapshot {
    stop_route_keys: HashMap<AgencyAndId, HashSet<String>>,
    cache: DashMap<CacheKey, bool>,
}

impl RevenueSnapshot {
    fn memoised(&self, key: CacheKey, compute: impl FnOnce(&Self) -> bool) -> bool {
        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }
        let value = compute(self);
        self.cache.insert(key, value);
        value
    }
}

/// Which stops carry revenue service, per route and direction.
///
/// An index with no entries at all treats every stop as revenue.
#[derive(Default)]
pub struct RevenueSearchIndex {
    snapshot: RwLock<Arc<RevenueSnapshot>>,
}

impl RevenueSearchIndex {
    pub fn route_direction_key(route_id: &AgencyAndId, direction_id: &str) -> String {
        format!("{route_id}_{direction_id}")
    }

    /// Replaces the index. Memoised answers go with the old snapshot.
    pub fn update(&self, stop_route_keys: HashMap<AgencyAndId, HashSet<String>>) {
        info!("loaded revenue index for {} stops", stop_route_keys.len());
        *sync::write(&self.snapshot) = Arc::new(RevenueSnapshot {
            stop_route_keys,
            cache: DashMap::new(),
        });
    }

    fn snapshot(&self) -> Arc<RevenueSnapshot> {
        sync::read(&self.snapshot).clone()
    }

    pub fn stop_has_revenue_service(&self, stop_id: &AgencyAndId) -> bool {
        self.snapshot()
            .memoised(CacheKey::Stop(stop_id.clone()), |snapshot| {
                snapshot.stop_route_keys.is_empty() || snapshot.stop_route_keys.contains_key(stop_id)
            })
    }

    pub fn stop_has_revenue_service_on_route(
        &self,
        stop_id: &AgencyAndId,
        route_id: &AgencyAndId,
        direction_id: &str,
    ) -> bool {
        let key = CacheKey::StopOnRoute(stop_id.clone(), route_id.clone(), direction_id.to_string());
        self.snapshot().memoised(key, |snapshot| {
            snapshot.stop_route_keys.is_empty()
                || snapshot.stop_route_keys.get(stop_id).is_some_and(|keys| {
                    keys.contains(&Self::route_direction_key(route_id, direction_id))
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aid(id: &str) -> AgencyAndId {
        AgencyAndId::new("1", id)
    }

    #[test]
    fn test_empty_index_means_all_revenue() {
        let index = RevenueSearchIndex::default();
        assert!(index.stop_has_revenue_service(&aid("stopA")));
        assert!(index.stop_has_revenue_service_on_route(&aid("stopA"), &aid("B43"), "0"));
    }

    #[test]
    fn test_lookup_and_cache_invalidation() {
        let index = RevenueSearchIndex::default();
        let keys = HashSet::from([RevenueSearchIndex::route_direction_key(&aid("B43"), "0")]);
        index.update(HashMap::from([(aid("stopA"), keys)]));

        assert_eq!(RevenueSearchIndex::route_direction_key(&aid("B43"), "0"), "1_B43_0");
        assert!(index.stop_has_revenue_service(&aid("stopA")));
        assert!(!index.stop_has_revenue_service(&aid("stopB")));
        assert!(index.stop_has_revenue_service_on_route(&aid("stopA"), &aid("B43"), "0"));
        assert!(!index.stop_has_revenue_service_on_route(&aid("stopA"), &aid("B43"), "1"));

        index.update(HashMap::new());
        assert!(index.stop_has_revenue_service(&aid("stopB")));
        assert!(index.stop_has_revenue_service_on_route(&aid("stopA"), &aid("B43"), "1"));
    }

    #[test]
    fn test_answers_from_a_replaced_index_stay_with_it() {
        let index = RevenueSearchIndex::default();
        let keys = HashSet::from([RevenueSearchIndex::route_direction_key(&aid("B43"), "0")]);
        index.update(HashMap::from([(aid("stopA"), keys)]));

        // a reader still holding the old snapshot finishes after the swap
        let stale = index.snapshot();
        index.update(HashMap::new());
        assert!(!stale.memoised(CacheKey::Stop(aid("stopB")), |snapshot| {
            snapshot.stop_route_keys.contains_key(&aid("stopB"))
        }));

        assert!(index.stop_has_revenue_service(&aid("stopB")));
        assert_eq!(index.snapshot().cache.len(), 1);
    }
}
