use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{ActivityApi, HttpActivityApi};
use crate::config::Config;
use crate::coverage::FetchCoverageDecider;
use crate::database::{create_pool, get_connection, init_database, DbPool};
use crate::error::AppResult;
use crate::geo::GeoRect;
use crate::models::{ActivityScope, CameraChange, Event, TimeWindow};
use crate::store::MapCache;
use crate::video_cache::VideoDiskCache;
use crate::viewport::{spawn_controller, ControllerDeps, ControllerHandle, MapOutputs};

/// Everything the map screen needs, wired once at startup.
pub struct MapApp {
    pub pool: DbPool,
    pub handle: ControllerHandle,
    pub controller: JoinHandle<()>,
    pub video_cache: VideoDiskCache,
    pub video_worker: JoinHandle<()>,
}

pub fn open_database(config: &Config) -> AppResult<DbPool> {
    let pool = create_pool(&config.database.path, config.database.pool_size)?;
    let conn = get_connection(&pool)?;
    init_database(&conn)?;
    Ok(pool)
}

/// Build the app against the HTTP activity API. Must run inside a tokio runtime.
pub fn start(config: &Config) -> AppResult<(MapApp, MapOutputs)> {
    let pool = open_database(config)?;
    let api = Arc::new(HttpActivityApi::new(&config.api)?);
    start_with_api(config, pool, api)
}

pub fn start_with_api(
    config: &Config,
    pool: DbPool,
    api: Arc<dyn ActivityApi>,
) -> AppResult<(MapApp, MapOutputs)> {
    let cache = MapCache::new(pool.clone());
    let deps = ControllerDeps {
        decider: FetchCoverageDecider::new(cache.regions.clone(), &config.cache),
        cache,
        api,
        concurrency: config.workers.concurrency(),
    };
    let (handle, outputs, controller) = spawn_controller(deps, &config.viewport);

    let http = reqwest::Client::builder()
        .user_agent(&config.api.user_agent)
        .connect_timeout(Duration::from_secs(config.api.timeout_seconds))
        .build()?;
    let video_cache = VideoDiskCache::new(&config.video_cache, http)?;
    let video_worker = video_cache.spawn_worker();

    info!(
        "Map cache ready (expiry {}s, threshold {}, {} workers)",
        config.cache.expiry_seconds,
        config.cache.intersection_threshold,
        config.workers.concurrency()
    );

    let app = MapApp {
        pool,
        handle,
        controller,
        video_cache,
        video_worker,
    };
    Ok((app, outputs))
}

/// One line of driver input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DriverCommand {
    Camera {
        rect: GeoRect,
        #[serde(default = "default_scale")]
        scale: f64,
    },
    Pan {
        rect: GeoRect,
    },
    Scope {
        scope: ActivityScope,
    },
    TimeWindow {
        window: TimeWindow,
    },
    Events {
        events: Vec<Event>,
    },
    Video {
        url: String,
        #[serde(default)]
        priority: i32,
    },
}

fn default_scale() -> f64 {
    1.0
}

impl DriverCommand {
    pub fn parse(line: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(line)?)
    }

    pub async fn apply(self, app: &MapApp) -> AppResult<()> {
        match self {
            DriverCommand::Camera { rect, scale } => {
                app.handle.camera_changed(CameraChange { rect, scale })
            }
            DriverCommand::Pan { rect } => app.handle.pan_to(rect),
            DriverCommand::Scope { scope } => app.handle.set_scope(scope),
            DriverCommand::TimeWindow { window } => app.handle.set_time_window(window),
            DriverCommand::Events { events } => app.handle.set_events(events),
            DriverCommand::Video { url, priority } => {
                let asset = app.video_cache.get_asset(&url, priority).await?;
                info!("Video asset for {}: {:?}", url, asset);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchRequest;
    use crate::config::{DatabaseConfig, VideoCacheConfig};
    use crate::models::Activity;
    use async_trait::async_trait;

    struct EmptyApi;

    #[async_trait]
    impl ActivityApi for EmptyApi {
        async fn fetch_activities(&self, _request: &FetchRequest) -> AppResult<Vec<Activity>> {
            Ok(Vec::new())
        }
    }

    fn temp_config(dir: &std::path::Path) -> Config {
        Config {
            database: DatabaseConfig {
                path: dir.join("map.sqlite"),
                ..DatabaseConfig::default()
            },
            video_cache: VideoCacheConfig {
                directory: dir.join("videos"),
                ..VideoCacheConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_parse_commands() {
        let camera = DriverCommand::parse(
            r#"{"type":"camera","rect":{"x":0,"y":0,"width":5000,"height":5000}}"#,
        )
        .unwrap();
        assert_eq!(
            camera,
            DriverCommand::Camera {
                rect: GeoRect::new(0.0, 0.0, 5_000.0, 5_000.0),
                scale: 1.0
            }
        );

        let scope = DriverCommand::parse(r#"{"type":"scope","scope":"FOLLOWINGS"}"#).unwrap();
        assert_eq!(
            scope,
            DriverCommand::Scope {
                scope: ActivityScope::Followings
            }
        );

        let window =
            DriverCommand::parse(r#"{"type":"timeWindow","window":"month"}"#).unwrap();
        assert_eq!(
            window,
            DriverCommand::TimeWindow {
                window: TimeWindow::Month
            }
        );

        assert!(DriverCommand::parse(r#"{"type":"zoom"}"#).is_err());
    }

    #[tokio::test]
    async fn test_start_with_api_wires_controller_and_video_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(dir.path());
        let pool = open_database(&config).unwrap();

        let (app, _outputs) = start_with_api(&config, pool, Arc::new(EmptyApi)).unwrap();
        DriverCommand::Camera {
            rect: GeoRect::new(0.0, 0.0, 5_000.0, 5_000.0),
            scale: 1.0,
        }
        .apply(&app)
        .await
        .unwrap();

        let stats = app.handle.stats().await.unwrap();
        assert_eq!(stats.fetch_attempts, 1);
        assert!(dir.path().join("videos").is_dir());

        app.video_worker.abort();
    }
}
