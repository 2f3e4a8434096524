//! Block indices over the static graph.
//!
//! The engine keeps one immutable [`BlockIndices`] snapshot. A query that
//! finds the graph version moved on rebuilds a fresh snapshot and swaps it in;
//! readers holding the previous snapshot keep a consistent view.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use tracing::debug;

use crate::blocks::indices::{
    create_stop_time_indices, create_trip_indices, BlockStopTimeIndex, BlockTripIndex,
};
use crate::graph::TransitGraphStore;
use crate::identifiers::AgencyAndId;
use crate::sync;

#[derive(Debug, Default)]
pub struct BlockIndices {
    pub version: u64,
    trip_indices: Vec<Arc<BlockTripIndex>>,
    by_agency: HashMap<Arc<str>, Vec<Arc<BlockTripIndex>>>,
    by_route_collection: HashMap<AgencyAndId, Vec<Arc<BlockTripIndex>>>,
    by_block: HashMap<AgencyAndId, Vec<Arc<BlockTripIndex>>>,
    by_stop: HashMap<AgencyAndId, Vec<Arc<BlockStopTimeIndex>>>,
}

impl BlockIndices {
    pub fn build(graph: &TransitGraphStore, version: u64) -> Self {
        let blocks = graph.all_blocks();
        let trip_indices = create_trip_indices(&blocks);

        let mut by_agency: HashMap<Arc<str>, Vec<Arc<BlockTripIndex>>> = HashMap::new();
        let mut by_route_collection: HashMap<AgencyAndId, Vec<Arc<BlockTripIndex>>> = HashMap::new();
        let mut by_block: HashMap<AgencyAndId, Vec<Arc<BlockTripIndex>>> = HashMap::new();

        for index in &trip_indices {
            let block_id = index.block_id();
            by_agency
                .entry(Arc::from(block_id.agency_id()))
                .or_default()
                .push(index.clone());
            by_block.entry(block_id.clone()).or_default().push(index.clone());

            let mut collections: Vec<AgencyAndId> = index
                .route_ids()
                .map(|route_id| {
                    graph
                        .route_for_id(route_id)
                        .map(|route| route.parent_id.clone())
                        .unwrap_or_else(|| route_id.clone())
                })
                .collect();
            collections.sort();
            collections.dedup();
            for collection_id in collections {
                by_route_collection
                    .entry(collection_id)
                    .or_default()
                    .push(index.clone());
            }
        }

        let by_stop = create_stop_time_indices(
            blocks.iter().flat_map(|block| block.configurations.iter()),
        );

        Self {
            version,
            trip_indices,
            by_agency,
            by_route_collection,
            by_block,
            by_stop,
        }
    }
}

pub struct BlockIndexEngine {
    graph: Arc<TransitGraphStore>,
    current: RwLock<Arc<BlockIndices>>,
    rebuild_lock: Mutex<()>,
}

impl BlockIndexEngine {
    pub fn new(graph: Arc<TransitGraphStore>) -> Self {
        let version = graph.version();
        let indices = BlockIndices::build(&graph, version);
        Self {
            graph,
            current: RwLock::new(Arc::new(indices)),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn indexed_version(&self) -> u64 {
        sync::read(&self.current).version
    }

    /// Current snapshot, rebuilt first if the graph has changed.
    pub fn indices(&self) -> Arc<BlockIndices> {
        let current = sync::read(&self.current).clone();
        if current.version == self.graph.version() {
            return current;
        }
        self.refresh()
    }

    /// Rebuilds the snapshot unless it already matches the graph version.
    pub fn refresh(&self) -> Arc<BlockIndices> {
        let _guard = sync::lock(&self.rebuild_lock);

        let version = self.graph.version();
        let current = sync::read(&self.current).clone();
        if current.version == version {
            return current;
        }

        let started = Instant::now();
        let rebuilt = Arc::new(BlockIndices::build(&self.graph, version));
        *sync::write(&self.current) = rebuilt.clone();
        debug!(
            "rebuilt block indices for graph version {version}: {} trip indices, {} stops in {:?}",
            rebuilt.trip_indices.len(),
            rebuilt.by_stop.len(),
            started.elapsed()
        );
        rebuilt
    }

    pub fn block_trip_indices(&self) -> Vec<Arc<BlockTripIndex>> {
        self.indices().trip_indices.clone()
    }

    pub fn block_trip_indices_for_agency(&self, agency_id: &str) -> Vec<Arc<BlockTripIndex>> {
        self.indices()
            .by_agency
            .get(agency_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn block_trip_indices_for_route_collection(
        &self,
        route_collection_id: &AgencyAndId,
    ) -> Vec<Arc<BlockTripIndex>> {
        self.indices()
            .by_route_collection
            .get(route_collection_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn block_trip_indices_for_block(&self, block_id: &AgencyAndId) -> Vec<Arc<BlockTripIndex>> {
        self.indices()
            .by_block
            .get(block_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stop_time_indices_for_stop(&self, stop_id: &AgencyAndId) -> Vec<Arc<BlockStopTimeIndex>> {
        self.indices()
            .by_stop
            .get(stop_id)
            .cloned()
            .unwrap_or_default()
    }
}
