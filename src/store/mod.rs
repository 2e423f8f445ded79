//! Persistent caches behind the map view.
//!
//! Both stores share one SQLite pool. `MapCache` bundles them so a fetch
//! cycle's activities and covered regions commit in a single transaction.

mod activity_cache;
mod region_cache;

pub use activity_cache::ActivityCacheStore;
pub use region_cache::RegionCacheStore;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::TransactionBehavior;
use tracing::debug;

use crate::database::{get_connection, DbPool};
use crate::error::AppResult;
use crate::geo::GeoRect;
use crate::models::{Activity, AreaLevel};

/// Rows written by one committed fetch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub activities_added: usize,
    pub regions_added: usize,
}

/// Bumped when cached data stops matching what new fetches ask for (scope or
/// time-window switch). A fetch started under an older value must not commit.
#[derive(Clone, Default)]
pub struct CacheGeneration(Arc<AtomicU64>);

impl CacheGeneration {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Clone)]
pub struct MapCache {
    pool: DbPool,
    pub regions: RegionCacheStore,
    pub activities: ActivityCacheStore,
    pub generation: CacheGeneration,
}

impl MapCache {
    pub fn new(pool: DbPool) -> Self {
        Self {
            regions: RegionCacheStore::new(pool.clone()),
            activities: ActivityCacheStore::new(pool.clone()),
            generation: CacheGeneration::default(),
            pool,
        }
    }

    /// Persist a successful fetch: new activities plus the covered cells, atomically.
    pub fn commit_fetch(
        &self,
        activities: &[Activity],
        cells: &[GeoRect],
        level: AreaLevel,
        now: DateTime<Utc>,
    ) -> AppResult<CommitSummary> {
        let summary = self.commit(None, activities, cells, level, now)?;
        Ok(summary.unwrap_or_default())
    }

    /// Like [`MapCache::commit_fetch`], but writes nothing and returns `None` when the
    /// cache generation has moved past `started_in`.
    pub fn commit_fetch_in(
        &self,
        started_in: u64,
        activities: &[Activity],
        cells: &[GeoRect],
        level: AreaLevel,
        now: DateTime<Utc>,
    ) -> AppResult<Option<CommitSummary>> {
        self.commit(Some(started_in), activities, cells, level, now)
    }

    fn commit(
        &self,
        started_in: Option<u64>,
        activities: &[Activity],
        cells: &[GeoRect],
        level: AreaLevel,
        now: DateTime<Utc>,
    ) -> AppResult<Option<CommitSummary>> {
        let mut conn = get_connection(&self.pool)?;
        // Holding the write lock from the id lookup on keeps concurrent commits
        // and clears serialized.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(started_in) = started_in {
            let current = self.generation.current();
            if started_in != current {
                debug!(
                    "Discarding fetch from cache generation {} (now {})",
                    started_in, current
                );
                return Ok(None);
            }
        }

        let to_add = activity_cache::new_activities(&tx, activities)?;
        let activities_added = activity_cache::insert_activities(&tx, &to_add)?;
        let regions_added = region_cache::insert_cells(&tx, cells, level, now)?;
        tx.commit()?;

        debug!(
            "Committed fetch: {} new activities, {} new regions at level {:?}",
            activities_added, regions_added, level
        );
        Ok(Some(CommitSummary {
            activities_added,
            regions_added,
        }))
    }

    /// Drop everything cached for the current scope in one transaction.
    pub fn clear_all(&self) -> AppResult<()> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let regions = region_cache::delete_all_with(&tx)?;
        let activities = activity_cache::delete_all_with(&tx)?;
        tx.commit()?;

        debug!("Cleared {} regions and {} activities", regions, activities);
        Ok(())
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(index: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, ms))
}
