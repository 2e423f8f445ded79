//! Remote activity feed for a bounding box.

mod http;

pub use http::HttpActivityApi;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::geo::{rect_corners, GeoRect, LngLat};
use crate::models::{Activity, ActivityScope};

/// Parameters of one map fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub north_east: LngLat,
    pub south_west: LngLat,
    pub start_date: DateTime<Utc>,
    pub scope: ActivityScope,
}

impl FetchRequest {
    pub fn for_rect(rect: &GeoRect, start_date: DateTime<Utc>, scope: ActivityScope) -> Self {
        let (north_east, south_west) = rect_corners(rect);
        Self {
            north_east,
            south_west,
            start_date,
            scope,
        }
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("neLat", self.north_east.lat().to_string()),
            ("neLng", self.north_east.lng().to_string()),
            ("swLat", self.south_west.lat().to_string()),
            ("swLng", self.south_west.lng().to_string()),
            (
                "startDate",
                self.start_date.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("scope", self.scope.as_str().to_string()),
        ]
    }
}

#[async_trait]
pub trait ActivityApi: Send + Sync {
    async fn fetch_activities(&self, request: &FetchRequest) -> AppResult<Vec<Activity>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ActivitiesBody {
    List(Vec<Activity>),
    Wrapped { activities: Vec<Activity> },
}

/// Accepts either a bare array or `{"activities": [...]}`.
pub fn decode_activities(body: &[u8]) -> AppResult<Vec<Activity>> {
    match serde_json::from_slice::<ActivitiesBody>(body) {
        Ok(ActivitiesBody::List(activities)) => Ok(activities),
        Ok(ActivitiesBody::Wrapped { activities }) => Ok(activities),
        Err(e) => Err(AppError::Decode(e.to_string())),
    }
}
