use crate::constants::{
    DATABASE_PATH, DEFAULT_ANNOTATION_LIMIT, DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECONDS,
    DEFAULT_DISPLAY_THROTTLE_MS, DEFAULT_FETCH_THROTTLE_MS, DEFAULT_INTERSECTION_THRESHOLD,
    DEFAULT_REGION_EXPIRY_SECONDS, DEFAULT_USER_AGENT, DEFAULT_VIDEO_CACHE_MAX_BYTES,
    DEFAULT_VIDEO_QUEUE_CAPACITY, VIDEO_CACHE_DIR,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_database_path() -> PathBuf {
    DATABASE_PATH.clone()
}

fn default_pool_size() -> u32 {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: i64,
    #[serde(default = "default_intersection_threshold")]
    pub intersection_threshold: f64,
}

fn default_expiry_seconds() -> i64 {
    DEFAULT_REGION_EXPIRY_SECONDS
}

fn default_intersection_threshold() -> f64 {
    DEFAULT_INTERSECTION_THRESHOLD
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: default_expiry_seconds(),
            intersection_threshold: default_intersection_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "default_fetch_throttle_ms")]
    pub fetch_throttle_ms: u64,
    #[serde(default = "default_display_throttle_ms")]
    pub display_throttle_ms: u64,
    #[serde(default = "default_annotation_limit")]
    pub annotation_limit: usize,
    #[serde(default = "default_proximity_clustering")]
    pub proximity_clustering: bool,
}

fn default_fetch_throttle_ms() -> u64 {
    DEFAULT_FETCH_THROTTLE_MS
}

fn default_display_throttle_ms() -> u64 {
    DEFAULT_DISPLAY_THROTTLE_MS
}

fn default_annotation_limit() -> usize {
    DEFAULT_ANNOTATION_LIMIT
}

fn default_proximity_clustering() -> bool {
    true
}

impl ViewportConfig {
    pub fn fetch_throttle(&self) -> Duration {
        Duration::from_millis(self.fetch_throttle_ms)
    }

    pub fn display_throttle(&self) -> Duration {
        Duration::from_millis(self.display_throttle_ms)
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            fetch_throttle_ms: default_fetch_throttle_ms(),
            display_throttle_ms: default_display_throttle_ms(),
            annotation_limit: default_annotation_limit(),
            proximity_clustering: default_proximity_clustering(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_API_TIMEOUT_SECONDS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerConfig {
    /// Concurrent background jobs. Zero means one per CPU.
    #[serde(default)]
    pub num_cpus: usize,
}

impl WorkerConfig {
    pub fn concurrency(&self) -> usize {
        if self.num_cpus > 0 {
            self.num_cpus
        } else {
            num_cpus::get()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCacheConfig {
    #[serde(default = "default_video_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_video_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_video_directory() -> PathBuf {
    VIDEO_CACHE_DIR.clone()
}

fn default_video_max_bytes() -> u64 {
    DEFAULT_VIDEO_CACHE_MAX_BYTES
}

fn default_queue_capacity() -> usize {
    DEFAULT_VIDEO_QUEUE_CAPACITY
}

impl Default for VideoCacheConfig {
    fn default() -> Self {
        Self {
            directory: default_video_directory(),
            max_bytes: default_video_max_bytes(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub video_cache: VideoCacheConfig,
}

pub fn load_config(config_path: &Path) -> Config {
    if !config_path.exists() {
        return Config::default();
    }

    match fs::read_to_string(config_path) {
        Ok(content) => match serde_yaml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config {:?}: {}", config_path, e);
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}

pub fn save_default_config(config_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).map_err(|e| std::io::Error::other(e.to_string()))?;
    fs::write(config_path, yaml)
}
