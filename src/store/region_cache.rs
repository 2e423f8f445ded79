use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use super::{from_millis, to_millis};
use crate::database::{execute_query, fetch_all, get_connection, queries, DbPool};
use crate::error::AppResult;
use crate::geo::GeoRect;
use crate::models::{AreaLevel, FetchedRegion};

/// Previously fetched grid cells, bucketed by area level.
#[derive(Clone)]
pub struct RegionCacheStore {
    pool: DbPool,
}

impl RegionCacheStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record `cells` as fetched at `now`. Cells whose center matches an existing
    /// cell at the same level are skipped. Returns the number of rows written.
    pub fn insert(&self, cells: &[GeoRect], level: AreaLevel, now: DateTime<Utc>) -> AppResult<usize> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction()?;
        let inserted = insert_cells(&tx, cells, level, now)?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn list_by_level(&self, level: AreaLevel) -> AppResult<Vec<FetchedRegion>> {
        let conn = get_connection(&self.pool)?;
        list_with(&conn, level)
    }

    /// Remove regions at `level` saved more than `expiry_seconds` before `now`.
    pub fn delete_expired(
        &self,
        level: AreaLevel,
        now: DateTime<Utc>,
        expiry_seconds: i64,
    ) -> AppResult<usize> {
        let cutoff = to_millis(now - Duration::seconds(expiry_seconds));

        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction()?;
        let removed = execute_query(&tx, queries::regions::DELETE_EXPIRED, &[&level, &cutoff])?;
        tx.commit()?;

        if removed > 0 {
            debug!("Expired {} regions at level {:?}", removed, level);
        }
        Ok(removed)
    }

    pub fn delete_all(&self) -> AppResult<usize> {
        let conn = get_connection(&self.pool)?;
        delete_all_with(&conn)
    }
}

pub(super) fn delete_all_with(conn: &Connection) -> AppResult<usize> {
    execute_query(conn, queries::regions::DELETE_ALL, &[])
}

pub(super) fn list_with(conn: &Connection, level: AreaLevel) -> AppResult<Vec<FetchedRegion>> {
    fetch_all(conn, queries::regions::SELECT_BY_LEVEL, &[&level], |row| {
        Ok(FetchedRegion {
            id: row.get(0)?,
            level: row.get(1)?,
            rect: GeoRect::new(row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?),
            saved_at: from_millis(6, row.get(6)?)?,
        })
    })
}

pub(super) fn insert_cells(
    conn: &Connection,
    cells: &[GeoRect],
    level: AreaLevel,
    now: DateTime<Utc>,
) -> AppResult<usize> {
    if cells.is_empty() {
        return Ok(0);
    }

    let mut seen: HashSet<(u64, u64)> = list_with(conn, level)?
        .iter()
        .map(|region| center_key(&region.rect))
        .collect();

    let saved_at = to_millis(now);
    let mut stmt = conn.prepare_cached(queries::regions::INSERT)?;
    let mut inserted = 0;
    for cell in cells {
        if !seen.insert(center_key(cell)) {
            continue;
        }
        stmt.execute(params![level, cell.x, cell.y, cell.width, cell.height, saved_at])?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Exact center identity. Adding 0.0 folds -0.0 into 0.0.
fn center_key(rect: &GeoRect) -> (u64, u64) {
    let (cx, cy) = rect.center();
    ((cx + 0.0).to_bits(), (cy + 0.0).to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{count_rows, create_test_db, fixed_now};

    fn cell(col: i32, row: i32) -> GeoRect {
        let unit = AreaLevel::A.area_unit();
        GeoRect::new(col as f64 * unit, row as f64 * unit, unit, unit)
    }

    #[test]
    fn test_insert_and_list_by_level() {
        let db = create_test_db();
        let store = RegionCacheStore::new(db.pool.clone());

        let inserted = store
            .insert(&[cell(0, 0), cell(1, 0)], AreaLevel::A, fixed_now())
            .unwrap();
        assert_eq!(inserted, 2);

        store
            .insert(&[GeoRect::new(0.0, 0.0, 50_000.0, 50_000.0)], AreaLevel::B, fixed_now())
            .unwrap();

        let level_a = store.list_by_level(AreaLevel::A).unwrap();
        assert_eq!(level_a.len(), 2);
        assert!(level_a.iter().all(|r| r.level == AreaLevel::A));
        assert_eq!(level_a[0].rect, cell(0, 0));
        assert_eq!(level_a[0].saved_at, fixed_now());

        assert_eq!(store.list_by_level(AreaLevel::B).unwrap().len(), 1);
        assert!(store.list_by_level(AreaLevel::C).unwrap().is_empty());
    }

    #[test]
    fn test_insert_skips_matching_centers() {
        let db = create_test_db();
        let store = RegionCacheStore::new(db.pool.clone());

        store.insert(&[cell(0, 0)], AreaLevel::A, fixed_now()).unwrap();
        let inserted = store
            .insert(&[cell(0, 0), cell(0, 1), cell(0, 1)], AreaLevel::A, fixed_now())
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(count_rows(&db.pool, "fetched_regions"), 2);
    }

    #[test]
    fn test_same_cell_at_other_level_is_not_a_duplicate() {
        let db = create_test_db();
        let store = RegionCacheStore::new(db.pool.clone());

        store.insert(&[cell(0, 0)], AreaLevel::A, fixed_now()).unwrap();
        let inserted = store.insert(&[cell(0, 0)], AreaLevel::B, fixed_now()).unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn test_delete_expired_removes_only_stale_rows() {
        let db = create_test_db();
        let store = RegionCacheStore::new(db.pool.clone());
        let now = fixed_now();

        store
            .insert(&[cell(0, 0)], AreaLevel::A, now - Duration::seconds(100))
            .unwrap();
        store
            .insert(&[cell(1, 0)], AreaLevel::A, now - Duration::seconds(10))
            .unwrap();
        store
            .insert(&[cell(0, 0)], AreaLevel::B, now - Duration::seconds(500))
            .unwrap();

        let removed = store.delete_expired(AreaLevel::A, now, 90).unwrap();
        assert_eq!(removed, 1);

        let remaining = store.list_by_level(AreaLevel::A).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].rect, cell(1, 0));
        assert!(remaining.iter().all(|r| !r.is_expired(now, 90)));

        // Other levels are untouched.
        assert_eq!(store.list_by_level(AreaLevel::B).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_expired_boundary_is_kept() {
        let db = create_test_db();
        let store = RegionCacheStore::new(db.pool.clone());
        let now = fixed_now();

        store
            .insert(&[cell(0, 0)], AreaLevel::A, now - Duration::seconds(90))
            .unwrap();
        assert_eq!(store.delete_expired(AreaLevel::A, now, 90).unwrap(), 0);
    }

    #[test]
    fn test_delete_all() {
        let db = create_test_db();
        let store = RegionCacheStore::new(db.pool.clone());
        store.insert(&[cell(0, 0)], AreaLevel::A, fixed_now()).unwrap();
        store.insert(&[cell(0, 0)], AreaLevel::C, fixed_now()).unwrap();

        assert_eq!(store.delete_all().unwrap(), 2);
        assert_eq!(count_rows(&db.pool, "fetched_regions"), 0);
    }
}
