//! Decides whether a viewport needs a network fetch or is already covered by
//! recently fetched regions.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::AppResult;
use crate::geo::{area, intersection, snap_to_grid, subdivide, GeoRect, GridError};
use crate::models::{AreaLevel, FetchedRegion};
use crate::store::RegionCacheStore;

#[derive(Debug, Clone, PartialEq)]
pub enum CoverageDecision {
    /// Existing regions cover more than the threshold of the snapped rect.
    Skip { covered_area: f64 },
    Fetch(FetchPlan),
}

/// A snapped rect to request from the API, with the cached cells that already overlap it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    pub fetch_rect: GeoRect,
    pub level: AreaLevel,
    pub overlapping: Vec<FetchedRegion>,
}

impl FetchPlan {
    /// Grid cells of `fetch_rect` whose centers are not already cached.
    pub fn uncovered_cells(&self) -> Result<Vec<GeoRect>, GridError> {
        let cells = subdivide(&self.fetch_rect, self.level.area_unit())?;
        let cached: Vec<(f64, f64)> = self.overlapping.iter().map(|r| r.rect.center()).collect();
        Ok(cells
            .into_iter()
            .filter(|cell| !cached.contains(&cell.center()))
            .collect())
    }
}

#[derive(Clone)]
pub struct FetchCoverageDecider {
    regions: RegionCacheStore,
    expiry_seconds: i64,
    intersection_threshold: f64,
}

impl FetchCoverageDecider {
    pub fn new(regions: RegionCacheStore, config: &CacheConfig) -> Self {
        Self {
            regions,
            expiry_seconds: config.expiry_seconds,
            intersection_threshold: config.intersection_threshold,
        }
    }

    /// Decide for `rect` at the level implied by its raw area.
    pub fn decide(&self, rect: &GeoRect, now: DateTime<Utc>) -> AppResult<CoverageDecision> {
        self.decide_at_level(rect, AreaLevel::for_rect(rect), now)
    }

    /// Expired regions at `level` are deleted as a side effect.
    pub fn decide_at_level(
        &self,
        rect: &GeoRect,
        level: AreaLevel,
        now: DateTime<Utc>,
    ) -> AppResult<CoverageDecision> {
        let fetch_rect = snap_to_grid(rect, level.area_unit());

        let (expired, valid): (Vec<FetchedRegion>, Vec<FetchedRegion>) = self
            .regions
            .list_by_level(level)?
            .into_iter()
            .partition(|region| region.is_expired(now, self.expiry_seconds));

        if !expired.is_empty() {
            self.regions
                .delete_expired(level, now, self.expiry_seconds)?;
        }

        let (covered_area, overlapping) = measure_coverage(&fetch_rect, valid);

        if covered_area > area(&fetch_rect) * self.intersection_threshold {
            debug!(
                "Coverage {:.0}/{:.0} at level {:?}, skipping fetch",
                covered_area,
                area(&fetch_rect),
                level
            );
            return Ok(CoverageDecision::Skip { covered_area });
        }

        Ok(CoverageDecision::Fetch(FetchPlan {
            fetch_rect,
            level,
            overlapping,
        }))
    }
}

/// Total intersection area of `regions` with `fetch_rect`, and the regions that touch it.
pub fn measure_coverage(
    fetch_rect: &GeoRect,
    regions: Vec<FetchedRegion>,
) -> (f64, Vec<FetchedRegion>) {
    let mut total = 0.0;
    let mut overlapping = Vec::new();
    for region in regions {
        let overlap = area(&intersection(fetch_rect, &region.rect));
        if overlap > 0.0 {
            total += overlap;
            overlapping.push(region);
        }
    }
    (total, overlapping)
}
