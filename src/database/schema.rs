use crate::error::AppResult;
use rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS fetched_regions (
    id INTEGER PRIMARY KEY AUTOINCREMENT
  , level INTEGER NOT NULL
  , x REAL NOT NULL
  , y REAL NOT NULL
  , width REAL NOT NULL
  , height REAL NOT NULL
  , saved_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fetched_regions_level ON fetched_regions(level, saved_at);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY
  , name TEXT NOT NULL
  , profile_image TEXT
);

CREATE TABLE IF NOT EXISTS places (
    id TEXT PRIMARY KEY
  , name TEXT
  , lng REAL NOT NULL
  , lat REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY
  , place_id TEXT NOT NULL
  , user_id TEXT NOT NULL
  , lng REAL NOT NULL
  , lat REAL NOT NULL
  , x REAL NOT NULL
  , y REAL NOT NULL
  , created_at INTEGER NOT NULL
  , checkins INTEGER NOT NULL DEFAULT 0
  , reviews INTEGER NOT NULL DEFAULT 0
  , FOREIGN KEY (place_id) REFERENCES places(id) ON DELETE CASCADE
  , FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_activities_xy ON activities(x, y);
CREATE INDEX IF NOT EXISTS idx_activities_created_at ON activities(created_at);
CREATE INDEX IF NOT EXISTS idx_activities_place ON activities(place_id);
"#;

pub fn init_database(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
