use chrono::{DateTime, Duration, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::constants::{
    AREA_LEVEL_A_MAX, AREA_LEVEL_B_MAX, AREA_UNIT_A, AREA_UNIT_B, AREA_UNIT_C,
};
use crate::geo::GeoRect;

/// Granularity bucket for region caching. `A` is the finest grid, `C` the coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AreaLevel {
    A,
    B,
    C,
}

impl AreaLevel {
    pub const ALL: [AreaLevel; 3] = [AreaLevel::A, AreaLevel::B, AreaLevel::C];

    /// Side length of one cache cell at this level.
    pub fn area_unit(&self) -> f64 {
        match self {
            AreaLevel::A => AREA_UNIT_A,
            AreaLevel::B => AREA_UNIT_B,
            AreaLevel::C => AREA_UNIT_C,
        }
    }

    pub fn for_area(area: f64) -> Self {
        if area <= AREA_LEVEL_A_MAX {
            AreaLevel::A
        } else if area <= AREA_LEVEL_B_MAX {
            AreaLevel::B
        } else {
            AreaLevel::C
        }
    }

    pub fn for_rect(rect: &GeoRect) -> Self {
        Self::for_area(rect.area())
    }

    fn code(&self) -> i64 {
        match self {
            AreaLevel::A => 0,
            AreaLevel::B => 1,
            AreaLevel::C => 2,
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(AreaLevel::A),
            1 => Some(AreaLevel::B),
            2 => Some(AreaLevel::C),
            _ => None,
        }
    }
}

impl ToSql for AreaLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for AreaLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        AreaLevel::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

/// A grid cell whose activities were fetched at `saved_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRegion {
    pub id: i64,
    pub rect: GeoRect,
    pub saved_at: DateTime<Utc>,
    pub level: AreaLevel,
}

impl FetchedRegion {
    pub fn is_expired(&self, now: DateTime<Utc>, expiry_seconds: i64) -> bool {
        now - self.saved_at > Duration::seconds(expiry_seconds)
    }
}
