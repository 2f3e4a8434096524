//! Geodesic helpers for stop searches and shape distances.

use geo::{coord, HaversineDistance, Point, Rect};

const METRES_PER_DEGREE_LAT: f64 = 111_320.0;

/// Great-circle distance in metres.
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    p1.haversine_distance(&p2)
}

/// A lon/lat box that contains every point within `radius` metres of
/// `center`. Callers refine with [`haversine_distance`].
pub fn bounds_around(center: Point, radius: f64) -> Rect {
    let lat_delta = radius / METRES_PER_DEGREE_LAT;
    let lon_scale = center.y().to_radians().cos().abs().max(1e-6);
    let lon_delta = (radius / (METRES_PER_DEGREE_LAT * lon_scale)).min(180.0);
    Rect::new(
        coord! { x: center.x() - lon_delta, y: center.y() - lat_delta },
        coord! { x: center.x() + lon_delta, y: center.y() + lat_delta },
    )
}
