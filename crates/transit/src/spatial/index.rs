//! R-tree nodes for the stop spatial index.
//!
//! The tree is keyed on raw lon/lat, so bounding-box queries are exact and
//! no geodesic refinement is needed.

use std::sync::Arc;

use geo::Rect;
use rstar::{RTree, RTreeObject, AABB};

use crate::models::entities::StopEntry;

#[derive(Clone, Debug)]
pub struct StopNode {
    pub stop: Arc<StopEntry>,
    point: [f64; 2],
}

impl StopNode {
    pub fn new(stop: Arc<StopEntry>) -> Self {
        let point = [stop.location.x(), stop.location.y()];
        Self { stop, point }
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

/// Build a fresh tree over the given stops.
pub fn build_stop_tree<'a>(stops: impl IntoIterator<Item = &'a Arc<StopEntry>>) -> RTree<StopNode> {
    RTree::bulk_load(stops.into_iter().cloned().map(StopNode::new).collect())
}

/// Stops whose location falls inside `bounds` (x = lon, y = lat).
pub fn stops_in_bounds(tree: &RTree<StopNode>, bounds: Rect) -> Vec<Arc<StopEntry>> {
    let min = bounds.min();
    let max = bounds.max();
    let envelope = AABB::from_corners([min.x, min.y], [max.x, max.y]);
    tree.locate_in_envelope(&envelope)
        .map(|node| node.stop.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::AgencyAndId;
    use geo::coord;

    #[test]
    fn test_stops_in_bounds() {
        let stops = vec![
            Arc::new(StopEntry::new(AgencyAndId::new("1", "inside"), 40.70, -74.00)),
            Arc::new(StopEntry::new(AgencyAndId::new("1", "outside"), 41.50, -74.00)),
        ];
        let tree = build_stop_tree(&stops);

        let bounds = Rect::new(coord! { x: -74.1, y: 40.6 }, coord! { x: -73.9, y: 40.8 });
        let found = stops_in_bounds(&tree, bounds);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.id(), "inside");
    }
}
