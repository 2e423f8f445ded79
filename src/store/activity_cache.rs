use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use tracing::debug;

use super::{from_millis, to_millis};
use crate::database::{fetch_all, fetch_one, get_connection, placeholders, queries, DbPool};
use crate::error::AppResult;
use crate::geo::{GeoRect, LngLat};
use crate::models::{Activity, ActivityCounts, ActivityUser};

/// SQLite caps bound parameters per statement; stay well below it.
const ID_LOOKUP_CHUNK: usize = 500;

/// Fetched activities keyed by id, with their users and places.
#[derive(Clone)]
pub struct ActivityCacheStore {
    pool: DbPool,
}

impl ActivityCacheStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert activities whose ids are not yet stored. Existing activities are left
    /// untouched. Returns the number of activities added.
    pub fn save(&self, activities: &[Activity]) -> AppResult<usize> {
        if activities.is_empty() {
            return Ok(0);
        }

        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let to_add = new_activities(&tx, activities)?;
        let inserted = insert_activities(&tx, &to_add)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Activities located inside `rect` (projected) created at or after `since`,
    /// newest first.
    pub fn query(&self, rect: &GeoRect, since: DateTime<Utc>) -> AppResult<Vec<Activity>> {
        let conn = get_connection(&self.pool)?;
        fetch_all(
            &conn,
            queries::activities::SELECT_IN_RECT_SINCE,
            &[
                &rect.min_x(),
                &rect.max_x(),
                &rect.min_y(),
                &rect.max_y(),
                &to_millis(since),
            ],
            |row| {
                Ok(Activity {
                    id: row.get(0)?,
                    place_id: row.get(1)?,
                    place_name: row.get(2)?,
                    coordinates: LngLat::new(row.get(3)?, row.get(4)?),
                    user: ActivityUser {
                        id: row.get(5)?,
                        name: row.get(6)?,
                        profile_image: row.get(7)?,
                    },
                    created_at: from_millis(8, row.get(8)?)?,
                    counts: ActivityCounts {
                        checkins: row.get(9)?,
                        reviews: row.get(10)?,
                    },
                })
            },
        )
    }

    pub fn count(&self) -> AppResult<i64> {
        let conn = get_connection(&self.pool)?;
        let count = fetch_one(&conn, queries::activities::COUNT, &[], |row| row.get(0))?;
        Ok(count.unwrap_or(0))
    }

    /// Remove all activities along with their users and places.
    pub fn delete_all(&self) -> AppResult<usize> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn.transaction()?;
        let removed = delete_all_with(&tx)?;
        tx.commit()?;
        Ok(removed)
    }
}

pub(super) fn delete_all_with(conn: &Connection) -> AppResult<usize> {
    let removed = conn.execute(queries::activities::DELETE_ALL, [])?;
    conn.execute(queries::activities::DELETE_ALL_PLACES, [])?;
    conn.execute(queries::activities::DELETE_ALL_USERS, [])?;
    Ok(removed)
}

/// Activities from `activities` whose ids are neither stored nor repeated earlier in the batch.
pub(super) fn new_activities<'a>(
    conn: &Connection,
    activities: &'a [Activity],
) -> AppResult<Vec<&'a Activity>> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(activities.len());
    let unique: Vec<&Activity> = activities
        .iter()
        .filter(|a| seen.insert(a.id.as_str()))
        .collect();

    let mut existing: HashSet<String> = HashSet::new();
    for chunk in unique.chunks(ID_LOOKUP_CHUNK) {
        let sql = format!(
            "{} ({})",
            queries::activities::SELECT_IDS_IN,
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter().map(|a| a.id.as_str())), |row| {
            row.get::<_, String>(0)
        })?;
        for id in rows {
            existing.insert(id?);
        }
    }

    let to_add: Vec<&Activity> = unique
        .into_iter()
        .filter(|a| !existing.contains(&a.id))
        .collect();

    if !existing.is_empty() {
        debug!("Skipping {} already cached activities", existing.len());
    }
    Ok(to_add)
}

/// Upsert users and places referenced by `to_add`, then insert the activities.
pub(super) fn insert_activities(conn: &Connection, to_add: &[&Activity]) -> AppResult<usize> {
    if to_add.is_empty() {
        return Ok(0);
    }

    let users: IndexMap<&str, &ActivityUser> =
        to_add.iter().map(|a| (a.user.id.as_str(), &a.user)).collect();
    let mut stmt = conn.prepare_cached(queries::users::UPSERT)?;
    for user in users.values() {
        stmt.execute(params![user.id, user.name, user.profile_image])?;
    }

    let mut places: IndexMap<&str, &Activity> = IndexMap::new();
    for activity in to_add {
        places.entry(activity.place_id.as_str()).or_insert(activity);
    }
    let mut stmt = conn.prepare_cached(queries::places::UPSERT)?;
    for activity in places.values() {
        stmt.execute(params![
            activity.place_id,
            activity.place_name,
            activity.coordinates.lng(),
            activity.coordinates.lat(),
        ])?;
    }

    let mut stmt = conn.prepare_cached(queries::activities::INSERT)?;
    let mut inserted = 0;
    for activity in to_add {
        let (x, y) = activity.projected();
        inserted += stmt.execute(params![
            activity.id,
            activity.place_id,
            activity.user.id,
            activity.coordinates.lng(),
            activity.coordinates.lat(),
            x,
            y,
            to_millis(activity.created_at),
            activity.counts.checkins,
            activity.counts.reviews,
        ])?;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::wgs84_to_mercator;
    use crate::test_utils::{
        count_rows, create_test_db, fixed_now, make_activity, make_activity_by,
    };
    use chrono::Duration;

    fn rect_around(lng: f64, lat: f64, half_size: f64) -> GeoRect {
        let (x, y) = wgs84_to_mercator(lat, lng);
        GeoRect::new(x - half_size, y - half_size, half_size * 2.0, half_size * 2.0)
    }

    #[test]
    fn test_save_is_idempotent() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());
        let batch = vec![
            make_activity("a1", "p1", 139.70, 35.68),
            make_activity("a2", "p2", 139.71, 35.69),
        ];

        assert_eq!(store.save(&batch).unwrap(), 2);
        let once = store.count().unwrap();
        assert_eq!(store.save(&batch).unwrap(), 0);
        assert_eq!(store.count().unwrap(), once);
    }

    #[test]
    fn test_parallel_saves_of_same_batch_insert_once() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());
        let batch: Vec<Activity> = (0..150)
            .map(|i| make_activity(&format!("a{}", i), "p1", 139.70, 35.68))
            .collect();

        let barrier = std::sync::Arc::new(std::sync::Barrier::new(3));
        let savers: Vec<_> = (0..3)
            .map(|_| {
                let store = store.clone();
                let batch = batch.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.save(&batch)
                })
            })
            .collect();

        let added: usize = savers
            .into_iter()
            .map(|s| s.join().unwrap().expect("save failed"))
            .sum();
        assert_eq!(added, 150);
        assert_eq!(count_rows(&db.pool, "activities"), 150);
    }

    #[test]
    fn test_save_dedups_against_existing_and_links_place() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());

        store
            .save(&[make_activity("a1", "p1", 139.70, 35.68)])
            .unwrap();
        let added = store
            .save(&[
                make_activity("a1", "p1", 139.70, 35.68),
                make_activity("a2", "p1", 139.70, 35.68),
            ])
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(store.count().unwrap(), 2);

        let conn = db.pool.get().unwrap();
        let linked: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM activities WHERE place_id = 'p1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(linked, 2);
        assert_eq!(count_rows(&db.pool, "places"), 1);
    }

    #[test]
    fn test_save_dedups_within_batch() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());
        let added = store
            .save(&[
                make_activity("a1", "p1", 139.70, 35.68),
                make_activity("a1", "p1", 139.70, 35.68),
            ])
            .unwrap();
        assert_eq!(added, 1);
    }

    #[test]
    fn test_existing_activity_is_never_rewritten() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());

        store
            .save(&[make_activity("a1", "p1", 139.70, 35.68)])
            .unwrap();

        let mut moved = make_activity("a1", "p1", 10.0, 10.0);
        moved.counts.checkins = 99;
        store.save(&[moved]).unwrap();

        let found = store
            .query(&rect_around(139.70, 35.68, 1_000.0), fixed_now() - Duration::days(1))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].counts.checkins, 1);
    }

    #[test]
    fn test_user_is_refreshed_by_later_batch() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());

        store
            .save(&[make_activity_by("a1", "p1", "u9", 139.70, 35.68)])
            .unwrap();

        let mut newer = make_activity_by("a2", "p2", "u9", 139.70, 35.68);
        newer.user.name = "Renamed".to_string();
        newer.user.profile_image = Some("https://img/u9.png".to_string());
        store.save(&[newer]).unwrap();

        let found = store
            .query(&rect_around(139.70, 35.68, 1_000.0), fixed_now() - Duration::days(1))
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|a| a.user.name == "Renamed"));
        assert_eq!(count_rows(&db.pool, "users"), 1);
    }

    #[test]
    fn test_save_empty_is_noop() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());
        assert_eq!(store.save(&[]).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_query_filters_by_rect_and_since() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());

        let mut old = make_activity("old", "p1", 139.70, 35.68);
        old.created_at = fixed_now() - Duration::days(10);
        let near = make_activity("near", "p1", 139.70, 35.68);
        let far = make_activity("far", "p2", -0.12, 51.50);
        store.save(&[old, near, far]).unwrap();

        let rect = rect_around(139.70, 35.68, 5_000.0);
        let found = store.query(&rect, fixed_now() - Duration::days(1)).unwrap();
        let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["near"]);
        assert_eq!(found[0].place_name.as_deref(), Some("Place p1"));
        assert_eq!(found[0].created_at, fixed_now());

        let with_old = store.query(&rect, fixed_now() - Duration::days(30)).unwrap();
        assert_eq!(with_old.len(), 2);
        assert_eq!(with_old[0].id, "near");
    }

    #[test]
    fn test_delete_all() {
        let db = create_test_db();
        let store = ActivityCacheStore::new(db.pool.clone());
        store
            .save(&[make_activity("a1", "p1", 139.70, 35.68)])
            .unwrap();

        assert_eq!(store.delete_all().unwrap(), 1);
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(count_rows(&db.pool, "places"), 0);
        assert_eq!(count_rows(&db.pool, "users"), 0);
    }
}
