//! Planar geometry for the map cache.
//!
//! All rectangles live in Web Mercator meters (EPSG:3857), the same space the
//! viewport is expressed in. Activities carry WGS84 coordinates and are
//! projected on the way into the store.

mod projection;
mod rect;

pub use projection::{
    clamp_to_world, mercator_to_wgs84, rect_corners, wgs84_to_mercator, world_bounds, LngLat,
    MAX_LATITUDE,
};
pub use rect::{area, intersection, snap_to_grid, subdivide, GeoRect};

use thiserror::Error;

/// Precondition violations for grid operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("grid unit must be positive and finite, got {unit}")]
    InvalidUnit { unit: f64 },

    #[error("rect {width}x{height} is not a multiple of grid unit {unit}")]
    NotAligned { width: f64, height: f64, unit: f64 },
}
