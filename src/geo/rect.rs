use serde::{Deserialize, Serialize};

use super::GridError;

/// Relative tolerance when checking that a rect is a whole number of cells.
const ALIGNMENT_EPSILON: f64 = 1e-9;

/// Axis-aligned rectangle in projected map units. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl GeoRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn from_corners(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Overlap of two rects; a zero-sized rect when they are disjoint.
pub fn intersection(a: &GeoRect, b: &GeoRect) -> GeoRect {
    let min_x = a.min_x().max(b.min_x());
    let min_y = a.min_y().max(b.min_y());
    let max_x = a.max_x().min(b.max_x());
    let max_y = a.max_y().min(b.max_y());

    if max_x <= min_x || max_y <= min_y {
        return GeoRect::default();
    }

    GeoRect::from_corners(min_x, min_y, max_x, max_y)
}

pub fn area(rect: &GeoRect) -> f64 {
    rect.area()
}

/// Expand `rect` outwards so its corners sit on multiples of `unit`.
pub fn snap_to_grid(rect: &GeoRect, unit: f64) -> GeoRect {
    debug_assert!(unit > 0.0, "grid unit must be positive");

    let min_col = (rect.min_x() / unit).floor();
    let min_row = (rect.min_y() / unit).floor();
    let max_col = (rect.max_x() / unit).ceil();
    let max_row = (rect.max_y() / unit).ceil();

    GeoRect::new(
        min_col * unit,
        min_row * unit,
        (max_col - min_col) * unit,
        (max_row - min_row) * unit,
    )
}

/// Split a grid-aligned rect into `unit`-sized cells, row by row from the minimum corner.
pub fn subdivide(rect: &GeoRect, unit: f64) -> Result<Vec<GeoRect>, GridError> {
    if !(unit.is_finite() && unit > 0.0) {
        return Err(GridError::InvalidUnit { unit });
    }

    let cols = whole_cells(rect.width, unit);
    let rows = whole_cells(rect.height, unit);
    let (Some(cols), Some(rows)) = (cols, rows) else {
        return Err(GridError::NotAligned {
            width: rect.width,
            height: rect.height,
            unit,
        });
    };

    let mut cells = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            cells.push(GeoRect::new(
                rect.x + col as f64 * unit,
                rect.y + row as f64 * unit,
                unit,
                unit,
            ));
        }
    }
    Ok(cells)
}

fn whole_cells(length: f64, unit: f64) -> Option<usize> {
    let count = (length / unit).round();
    let tolerance = ALIGNMENT_EPSILON * length.abs().max(unit);
    if (count * unit - length).abs() > tolerance {
        return None;
    }
    Some(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(outer: &GeoRect, inner: &GeoRect) -> bool {
        inner.min_x() >= outer.min_x()
            && inner.min_y() >= outer.min_y()
            && inner.max_x() <= outer.max_x()
            && inner.max_y() <= outer.max_y()
    }

    fn is_multiple(value: f64, unit: f64) -> bool {
        let k = (value / unit).round();
        (k * unit - value).abs() < 1e-6
    }

    #[test]
    fn test_intersection_overlapping() {
        let a = GeoRect::new(0.0, 0.0, 10.0, 10.0);
        let b = GeoRect::new(5.0, 5.0, 10.0, 10.0);
        let i = intersection(&a, &b);
        assert_eq!(i, GeoRect::new(5.0, 5.0, 5.0, 5.0));
        assert_eq!(area(&i), 25.0);
    }

    #[test]
    fn test_intersection_disjoint_is_zero_area() {
        let a = GeoRect::new(0.0, 0.0, 10.0, 10.0);
        let b = GeoRect::new(20.0, 20.0, 5.0, 5.0);
        let i = intersection(&a, &b);
        assert_eq!(area(&i), 0.0);
        assert!(i.is_empty());
    }

    #[test]
    fn test_intersection_touching_edges_is_zero_area() {
        let a = GeoRect::new(0.0, 0.0, 10.0, 10.0);
        let b = GeoRect::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(area(&intersection(&a, &b)), 0.0);
    }

    #[test]
    fn test_negative_extent_is_clamped() {
        let r = GeoRect::new(1.0, 1.0, -4.0, 3.0);
        assert_eq!(r.width, 0.0);
        assert_eq!(r.area(), 0.0);
    }

    #[test]
    fn test_snap_to_grid_contains_and_aligns() {
        let unit = 5_000.0;
        let samples = [
            GeoRect::new(1234.5, -9876.25, 3210.0, 777.0),
            GeoRect::new(-12_345.0, 40_001.0, 15_000.0, 15_000.0),
            GeoRect::new(0.0, 0.0, 5_000.0, 5_000.0),
            GeoRect::new(-1.0, -1.0, 2.0, 2.0),
            GeoRect::new(987_654.3, 123_456.7, 48_000.0, 31_000.0),
        ];

        for rect in samples {
            let snapped = snap_to_grid(&rect, unit);
            assert!(contains(&snapped, &rect), "{:?} !⊇ {:?}", snapped, rect);
            assert!(is_multiple(snapped.x, unit));
            assert!(is_multiple(snapped.y, unit));
            assert!(is_multiple(snapped.width, unit));
            assert!(is_multiple(snapped.height, unit));
        }
    }

    #[test]
    fn test_snap_to_grid_keeps_aligned_rect() {
        let rect = GeoRect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(snap_to_grid(&rect, 10.0), rect);
    }

    #[test]
    fn test_subdivide_row_major() {
        let rect = GeoRect::new(0.0, 0.0, 20.0, 20.0);
        let cells = subdivide(&rect, 10.0).unwrap();
        assert_eq!(
            cells,
            vec![
                GeoRect::new(0.0, 0.0, 10.0, 10.0),
                GeoRect::new(10.0, 0.0, 10.0, 10.0),
                GeoRect::new(0.0, 10.0, 10.0, 10.0),
                GeoRect::new(10.0, 10.0, 10.0, 10.0),
            ]
        );
    }

    #[test]
    fn test_subdivide_of_snapped_rect_is_exact_partition() {
        let unit = 5_000.0;
        let rect = GeoRect::new(-7_300.0, 12_100.0, 23_456.0, 9_999.0);
        let snapped = snap_to_grid(&rect, unit);
        let cells = subdivide(&snapped, unit).unwrap();

        let total: f64 = cells.iter().map(area).sum();
        assert!((total - snapped.area()).abs() < 1e-3);

        for (i, a) in cells.iter().enumerate() {
            assert!(contains(&snapped, a));
            for b in cells.iter().skip(i + 1) {
                assert_eq!(area(&intersection(a, b)), 0.0);
            }
        }
    }

    #[test]
    fn test_subdivide_rejects_misaligned_rect() {
        let rect = GeoRect::new(0.0, 0.0, 15.0, 10.0);
        let err = subdivide(&rect, 10.0).unwrap_err();
        assert!(matches!(err, GridError::NotAligned { .. }));
    }

    #[test]
    fn test_subdivide_rejects_invalid_unit() {
        let rect = GeoRect::new(0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            subdivide(&rect, 0.0),
            Err(GridError::InvalidUnit { .. })
        ));
    }

    #[test]
    fn test_subdivide_empty_rect() {
        let cells = subdivide(&GeoRect::default(), 10.0).unwrap();
        assert!(cells.is_empty());
    }
}
