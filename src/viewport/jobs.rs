use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::api::{ActivityApi, FetchRequest};
use crate::clustering::{cluster_activities, precision_for_span, ClusterOptions};
use crate::config::ViewportConfig;
use crate::coverage::{CoverageDecision, FetchCoverageDecider};
use crate::error::{AppError, AppResult};
use crate::geo::GeoRect;
use crate::models::{ActivityScope, Annotations, Event, TimeWindow};
use crate::store::{CommitSummary, MapCache};

/// Collaborators the controller drives. Built once at startup.
#[derive(Clone)]
pub struct ControllerDeps {
    pub cache: MapCache,
    pub decider: FetchCoverageDecider,
    pub api: Arc<dyn ActivityApi>,
    /// Concurrent blocking jobs (store I/O and clustering).
    pub concurrency: usize,
}

#[derive(Debug)]
pub(super) enum FetchOutcome {
    Skipped,
    Committed(CommitSummary),
    /// Fetched for a scope or time window that has since been switched away from.
    Discarded,
}

pub(super) struct JobContext {
    cache: MapCache,
    decider: FetchCoverageDecider,
    api: Arc<dyn ActivityApi>,
    semaphore: Semaphore,
    annotation_limit: usize,
    proximity_clustering: bool,
}

impl JobContext {
    pub(super) fn new(deps: ControllerDeps, config: &ViewportConfig) -> Arc<Self> {
        Arc::new(Self {
            cache: deps.cache,
            decider: deps.decider,
            api: deps.api,
            semaphore: Semaphore::new(deps.concurrency.max(1)),
            annotation_limit: config.annotation_limit,
            proximity_clustering: config.proximity_clustering,
        })
    }

    /// Run `f` on the blocking pool once a worker slot is free.
    async fn blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        tokio::task::spawn_blocking(f).await?
    }

    pub(super) fn generation(&self) -> u64 {
        self.cache.generation.current()
    }

    /// Invalidate fetches still in flight. Their results will not be committed.
    pub(super) fn advance_generation(&self) -> u64 {
        self.cache.generation.advance()
    }
}

/// Decide coverage for `rect`, fetch when needed, then commit activities and cells
/// together unless the cache generation moved past `generation` meanwhile.
pub(super) async fn fetch_cycle(
    ctx: Arc<JobContext>,
    rect: GeoRect,
    scope: ActivityScope,
    window: TimeWindow,
    generation: u64,
) -> AppResult<FetchOutcome> {
    let now = Utc::now();
    let decider = ctx.decider.clone();
    let decision = ctx.blocking(move || decider.decide(&rect, now)).await?;

    let plan = match decision {
        CoverageDecision::Skip { .. } => return Ok(FetchOutcome::Skipped),
        CoverageDecision::Fetch(plan) => plan,
    };

    let request = FetchRequest::for_rect(&plan.fetch_rect, window.since(now), scope);
    info!(
        "Fetching {} activities for level {:?} rect {:.0}x{:.0}",
        scope.as_str(),
        plan.level,
        plan.fetch_rect.width,
        plan.fetch_rect.height
    );
    let activities = ctx.api.fetch_activities(&request).await?;
    let cells = plan.uncovered_cells()?;

    let cache = ctx.cache.clone();
    let level = plan.level;
    let committed = ctx
        .blocking(move || {
            cache.commit_fetch_in(generation, &activities, &cells, level, Utc::now())
        })
        .await?;
    Ok(committed.map_or(FetchOutcome::Discarded, FetchOutcome::Committed))
}

/// Re-read the store for `rect` and cluster the result.
pub(super) async fn recompute(
    ctx: Arc<JobContext>,
    rect: GeoRect,
    window: TimeWindow,
    events: Arc<Vec<Event>>,
) -> AppResult<Annotations> {
    let options = ClusterOptions {
        limit: ctx.annotation_limit,
        proximity_precision: ctx
            .proximity_clustering
            .then(|| precision_for_span(rect.width)),
    };
    let since = window.since(Utc::now());
    let cache = ctx.cache.clone();

    ctx.blocking(move || {
        let activities = cache.activities.query(&rect, since)?;
        debug!("Clustering {} activities", activities.len());
        Ok(cluster_activities(activities, &events, &options))
    })
    .await
}

pub(super) async fn clear_all(ctx: Arc<JobContext>) -> AppResult<()> {
    let cache = ctx.cache.clone();
    ctx.blocking(move || cache.clear_all()).await
}

pub(super) async fn clear_regions(ctx: Arc<JobContext>) -> AppResult<usize> {
    let cache = ctx.cache.clone();
    ctx.blocking(move || cache.regions.delete_all()).await
}
