#![cfg(test)]

use crate::database::{create_pool, init_database, DbPool};
use crate::geo::LngLat;
use crate::models::{Activity, ActivityCounts, ActivityUser};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

/// A pool over a throwaway database file. The file lives as long as this value.
pub struct TestDb {
    pub pool: DbPool,
    _dir: TempDir,
}

/// Create a temp-file SQLite database pool with full schema applied
pub fn create_test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pool = create_pool(&dir.path().join("test.sqlite"), 4)
        .expect("Failed to create test database pool");

    let conn = pool.get().expect("Failed to get connection from pool");
    init_database(&conn).expect("Failed to initialize test database schema");

    TestDb { pool, _dir: dir }
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Test fixture: an activity at `place_id` by user `u1`, created at `fixed_now()`.
pub fn make_activity(id: &str, place_id: &str, lng: f64, lat: f64) -> Activity {
    Activity {
        id: id.to_string(),
        place_id: place_id.to_string(),
        place_name: Some(format!("Place {}", place_id)),
        coordinates: LngLat::new(lng, lat),
        user: ActivityUser {
            id: "u1".to_string(),
            name: "Test User".to_string(),
            profile_image: None,
        },
        created_at: fixed_now(),
        counts: ActivityCounts {
            checkins: 1,
            reviews: 0,
        },
    }
}

pub fn make_activity_by(id: &str, place_id: &str, user_id: &str, lng: f64, lat: f64) -> Activity {
    let mut activity = make_activity(id, place_id, lng, lat);
    activity.user.id = user_id.to_string();
    activity.user.name = format!("User {}", user_id);
    activity
}

pub fn count_rows(pool: &DbPool, table: &str) -> i64 {
    let conn = pool.get().expect("Failed to get connection");
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("Failed to count rows")
}
