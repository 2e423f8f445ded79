use serde::{Deserialize, Serialize};

use super::{intersection, GeoRect};

/// Web Mercator half-extent in meters.
const EARTH_MERCATOR_MAX: f64 = 20037508.34;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;
const X_TO_LON_FACTOR: f64 = 180.0 / EARTH_MERCATOR_MAX;
const Y_TO_LAT_FACTOR: f64 = std::f64::consts::PI / EARTH_MERCATOR_MAX;

/// A WGS84 position, serialized as `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LngLat(pub f64, pub f64);

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self(lng, lat)
    }

    pub fn lng(&self) -> f64 {
        self.0
    }

    pub fn lat(&self) -> f64 {
        self.1
    }

    /// Projected (x, y) in Web Mercator meters.
    pub fn to_mercator(&self) -> (f64, f64) {
        wgs84_to_mercator(self.lat(), self.lng())
    }

    pub fn from_mercator(x: f64, y: f64) -> Self {
        let (lat, lng) = mercator_to_wgs84(x, y);
        Self(lng, lat)
    }
}

/// Convert WGS84 (lat, lon) to Web Mercator (x, y) in meters, clamping latitude.
#[inline]
pub fn wgs84_to_mercator(lat: f64, lon: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = lon * LON_TO_X_FACTOR;
    let lat_rad = lat.to_radians();
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR;
    (x, y)
}

/// Convert Web Mercator (x, y) in meters to WGS84 (lat, lon)
#[inline]
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x * X_TO_LON_FACTOR;
    let lat =
        (std::f64::consts::PI / 2.0 - 2.0 * ((-y * Y_TO_LAT_FACTOR).exp()).atan()).to_degrees();
    (lat, lon)
}

/// North-east and south-west corners of a projected rect.
pub fn rect_corners(rect: &GeoRect) -> (LngLat, LngLat) {
    let north_east = LngLat::from_mercator(rect.max_x(), rect.max_y());
    let south_west = LngLat::from_mercator(rect.min_x(), rect.min_y());
    (north_east, south_west)
}

/// The whole projected world.
pub fn world_bounds() -> GeoRect {
    GeoRect::from_corners(
        -EARTH_MERCATOR_MAX,
        -EARTH_MERCATOR_MAX,
        EARTH_MERCATOR_MAX,
        EARTH_MERCATOR_MAX,
    )
}

/// Part of `rect` inside the projected world; empty when it lies entirely outside.
pub fn clamp_to_world(rect: &GeoRect) -> GeoRect {
    intersection(rect, &world_bounds())
}
