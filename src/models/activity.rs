use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::LngLat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCounts {
    #[serde(default)]
    pub checkins: i64,
    #[serde(default)]
    pub reviews: i64,
}

/// A check-in style point on the map, tied to one user and one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub place_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    pub coordinates: LngLat,
    pub user: ActivityUser,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub counts: ActivityCounts,
}

impl Activity {
    pub fn projected(&self) -> (f64, f64) {
        self.coordinates.to_mercator()
    }
}

/// A point of interest that can anchor a cluster even without activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub place_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub coordinates: LngLat,
}

/// Whose activities the map shows. Cached coverage is only valid within one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityScope {
    #[default]
    Global,
    Followings,
}

impl ActivityScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityScope::Global => "GLOBAL",
            ActivityScope::Followings => "FOLLOWINGS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl TimeWindow {
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Day => Duration::days(1),
            TimeWindow::Week => Duration::weeks(1),
            TimeWindow::Month => Duration::days(30),
            TimeWindow::Year => Duration::days(365),
        }
    }

    /// Lower bound on `created_at` for activities shown in this window.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}
