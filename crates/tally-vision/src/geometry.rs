use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Axis, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl From<[i64; 2]> for Point {
    fn from(p: [i64; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoxError {
    #[error("non-finite box coordinate")]
    NonFinite,
    #[error("inverted box (x1 > x2 or y1 > y2)")]
    Inverted,
    #[error("box coordinate beyond +/-{} px", MAX_COORD)]
    OutOfRange,
}

/// Largest accepted pixel coordinate magnitude, for boxes and ROI vertices.
pub const MAX_COORD: i64 = i32::MAX as i64;

/// Pixel-rounded detection box. Always x1 <= x2 and y1 <= y2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BBox {
    /// Rounds detector coordinates to whole pixels (ties to even).
    pub fn from_raw(raw: &[f64; 4]) -> Result<Self, BoxError> {
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(BoxError::NonFinite);
        }
        if raw.iter().any(|v| v.abs() > MAX_COORD as f64) {
            return Err(BoxError::OutOfRange);
        }
        let [x1, y1, x2, y2] = raw.map(|v| v.round_ties_even() as i64);
        if x1 > x2 || y1 > y2 {
            return Err(BoxError::Inverted);
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Center used for ROI membership, rounded to the nearest pixel (ties to even).
    pub fn center(&self) -> Point {
        let half = |a: i64, b: i64| ((a as i128 + b as i128) as f64 / 2.0).round_ties_even() as i64;
        Point { x: half(self.x1, self.x2), y: half(self.y1, self.y2) }
    }

    /// Center projected onto the movement axis (floor of the midpoint).
    pub fn axis_position(&self, axis: Axis) -> i64 {
        let mid = |a: i64, b: i64| (a as i128 + b as i128).div_euclid(2) as i64;
        match axis {
            Axis::Vertical => mid(self.y1, self.y2),
            Axis::Horizontal => mid(self.x1, self.x2),
        }
    }
}

/// Closed ROI polygon, at least three vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    points: Vec<Point>,
}

impl Region {
    pub fn new(points: Vec<Point>) -> Result<Self, ConfigError> {
        if points.len() < 3 {
            return Err(ConfigError::RegionTooSmall(points.len()));
        }
        if let Some(p) = points.iter().find(|p| p.x.abs() > MAX_COORD || p.y.abs() > MAX_COORD) {
            return Err(ConfigError::RegionOutOfRange { x: p.x, y: p.y });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn contains_box(&self, b: &BBox) -> bool {
        self.contains_point(b.center())
    }

    /// Boundary counts as inside; interior uses the even-odd rule so
    /// self-intersecting outlines behave predictably.
    pub fn contains_point(&self, p: Point) -> bool {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[j];
            let b = self.points[i];
            if on_segment(p, a, b) {
                return true;
            }
            if (a.y > p.y) != (b.y > p.y) && crosses_right(p, a, b) {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Region-membership test for one box, see [`Region::contains_box`].
pub fn contains(region: &Region, b: &BBox) -> bool {
    region.contains_box(b)
}

fn cross(o: Point, a: Point, b: Point) -> i128 {
    let d = |u: i64, v: i64| u as i128 - v as i128;
    d(a.x, o.x) * d(b.y, o.y) - d(a.y, o.y) * d(b.x, o.x)
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    cross(a, b, p) == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

// Whether the edge a-b crosses the horizontal ray going right from p.
// Caller guarantees a.y and b.y straddle p.y, so dy != 0.
fn crosses_right(p: Point, a: Point, b: Point) -> bool {
    let d = |u: i64, v: i64| u as i128 - v as i128;
    let dy = d(b.y, a.y);
    let lhs = d(p.x, a.x) * dy;
    let rhs = d(b.x, a.x) * d(p.y, a.y);
    if dy > 0 { lhs < rhs } else { lhs > rhs }
}
