//! Geometry on the unit square: positions, distances, stepwise movement and ETAs.
//!
//! All coordinates live in `[0, 1]²`. Movement is clamped to that square, which
//! never increases the distance to a target that is itself inside the square.

use serde::{Deserialize, Serialize};

/// Lower bound applied to speeds before dividing, so a zero speed yields a large but finite ETA.
pub const MIN_SPEED: f64 = 1e-6;

/// A position on the normalized map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates to `[0, 1]`.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }

    /// Shift by `(dx, dy)` and clamp to the unit square.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy).clamped()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Advance `from` by `step` along the unit vector towards `target`, clamped to `[0, 1]²`.
///
/// Returns `from` unchanged when it already equals `target`. The step is not
/// shortened near the target, so a point within `step` of the target lands on the
/// far side of it at distance `step - d`.
pub fn move_toward(from: Point, target: Point, step: f64) -> Point {
    let dx = target.x - from.x;
    let dy = target.y - from.y;
    let dist = dx.hypot(dy);
    if dist == 0.0 {
        return from;
    }
    Point::new(from.x + dx / dist * step, from.y + dy / dist * step).clamped()
}

/// Travel time from `from` to `target` at `speed` distance units per time unit.
pub fn eta(from: Point, target: Point, speed: f64) -> f64 {
    distance(from, target) / speed.max(MIN_SPEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let d = distance(Point::new(0.0, 0.0), Point::new(0.3, 0.4));
        assert!((d - 0.5).abs() < 1e-12);
    }

    #[test]
    fn move_toward_advances_by_step() {
        let next = move_toward(Point::new(0.0, 0.0), Point::new(1.0, 0.0), 0.01);
        assert!((next.x - 0.01).abs() < 1e-12);
        assert_eq!(next.y, 0.0);
    }

    #[test]
    fn move_toward_same_point_is_noop() {
        let p = Point::new(0.4, 0.4);
        assert_eq!(move_toward(p, p, 0.5), p);
    }

    #[test]
    fn move_toward_clamps_to_unit_square() {
        let next = move_toward(Point::new(0.995, 0.5), Point::new(1.0, 0.5), 0.012);
        assert_eq!(next.x, 1.0);
    }

    #[test]
    fn move_toward_overshoots_when_close() {
        let target = Point::new(0.5, 0.5);
        let next = move_toward(Point::new(0.495, 0.5), target, 0.012);
        assert!((distance(next, target) - 0.007).abs() < 1e-9);
    }

    #[test]
    fn eta_guards_zero_speed() {
        let t = eta(Point::new(0.0, 0.0), Point::new(0.0, 1.0), 0.0);
        assert!(t.is_finite());
        assert!(t > 1e5);
    }

    #[test]
    fn eta_divides_by_speed() {
        let t = eta(Point::new(0.0, 0.0), Point::new(0.0, 0.4), 0.2);
        assert!((t - 2.0).abs() < 1e-12);
    }
}
