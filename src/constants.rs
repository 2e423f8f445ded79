use once_cell::sync::Lazy;
use std::path::PathBuf;

pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("ACTIVITY_MAP_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"))
});

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("config.yaml"));
pub static DATABASE_PATH: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("map_cache.sqlite"));
pub static VIDEO_CACHE_DIR: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("video_cache"));

/// Seconds a fetched region stays valid for coverage checks.
pub const DEFAULT_REGION_EXPIRY_SECONDS: i64 = 90;
/// Fraction of a fetch rect that must already be covered to skip the fetch.
pub const DEFAULT_INTERSECTION_THRESHOLD: f64 = 0.5;

pub const DEFAULT_FETCH_THROTTLE_MS: u64 = 1000;
pub const DEFAULT_DISPLAY_THROTTLE_MS: u64 = 1500;
pub const DEFAULT_ANNOTATION_LIMIT: usize = 30;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_API_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str = "ActivityMap/0.1";

pub const DEFAULT_VIDEO_QUEUE_CAPACITY: usize = 15;
pub const DEFAULT_VIDEO_CACHE_MAX_BYTES: u64 = 512 * 1024 * 1024;

/// Grid cell side lengths (Web Mercator meters) per area level.
pub const AREA_UNIT_A: f64 = 5_000.0;
pub const AREA_UNIT_B: f64 = 50_000.0;
pub const AREA_UNIT_C: f64 = 500_000.0;

/// Largest raw rect area (square meters) still assigned to level A / B.
pub const AREA_LEVEL_A_MAX: f64 = 50_000.0 * 50_000.0;
pub const AREA_LEVEL_B_MAX: f64 = 500_000.0 * 500_000.0;
