//! Camera heading from a panorama toward a target point.
//!
//! Uses the initial great-circle bearing on a sphere; the distances involved
//! (a panorama is normally within tens of metres of its query point) make the
//! spherical model exact enough.

use crate::types::{Coordinates, ViewType};

/// Extra rotation applied for footpath captures.
///
/// Empirical and uncalibrated: it has not been checked against real panorama
/// imagery, so treat it as a tunable (see `LOCI_FOOTPATH_OFFSET_DEG`).
pub const FOOTPATH_HEADING_OFFSET_DEG: f64 = 90.0;

/// Wrap an angle in degrees into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Initial bearing from `from` to `to`, degrees clockwise from north, in [0, 360).
pub fn initial_bearing(from: Coordinates, to: Coordinates) -> f64 {
    let from_lat = from.lat.to_radians();
    let to_lat = to.lat.to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let x = d_lon.sin() * to_lat.cos();
    let y = from_lat.cos() * to_lat.sin() - from_lat.sin() * to_lat.cos() * d_lon.cos();

    normalize_degrees(x.atan2(y).to_degrees() + 360.0)
}

/// Heading for the image request, using the default footpath offset.
pub fn calculate_heading(pano: Coordinates, target: Coordinates, view_type: ViewType) -> f64 {
    calculate_heading_with_offset(pano, target, view_type, FOOTPATH_HEADING_OFFSET_DEG)
}

/// Heading for the image request with an explicit footpath offset.
pub fn calculate_heading_with_offset(
    pano: Coordinates,
    target: Coordinates,
    view_type: ViewType,
    footpath_offset_deg: f64,
) -> f64 {
    let heading = initial_bearing(pano, target);
    match view_type {
        ViewType::RoadView => heading,
        ViewType::FootpathView => normalize_degrees(heading + footpath_offset_deg),
    }
}
