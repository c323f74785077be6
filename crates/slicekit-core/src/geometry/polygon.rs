//! Immutable 2D polygon on the build platform.
//!
//! Coordinates are platform (x, z) in scene space, stored as `f32` to match
//! the interpreter's path arrays. Reductions (hull orientation, area, SAT
//! projections) are carried out in `f64`.

use glam::{DVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Number of segments used for approximated circles.
pub const CIRCLE_SEGMENTS: usize = 32;

/// A point on the platform plane: `x` is platform X, `y` is scene Z.
pub type Point2D = Vec2;

/// Simple polygon given by its vertices in insertion order.
///
/// The empty polygon is a valid identity for [`Polygon2D::minkowski_hull`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon2D {
    points: Vec<Point2D>,
}

impl Polygon2D {
    /// Create a polygon from vertices
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    /// Create a polygon from `(x, y)` tuples
    pub fn from_coords(coords: &[(f32, f32)]) -> Self {
        Self {
            points: coords.iter().copied().map(Point2D::from).collect(),
        }
    }

    /// The empty polygon
    pub fn empty() -> Self {
        Self::default()
    }

    /// Axis-aligned rectangle from two opposite corners
    pub fn rectangle(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self::from_coords(&[
            (min_x, min_y),
            (min_x, max_y),
            (max_x, max_y),
            (max_x, min_y),
        ])
    }

    /// Regular 32-gon inscribed in a circle of `radius` around the origin,
    /// first vertex at `(radius, 0)`
    pub fn approximated_circle(radius: f32) -> Self {
        let step = std::f64::consts::TAU / CIRCLE_SEGMENTS as f64;
        let r = radius as f64;
        let points = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let angle = step * i as f64;
                Point2D::new((r * angle.cos()) as f32, (r * angle.sin()) as f32)
            })
            .collect();
        Self { points }
    }

    /// Vertices in insertion order
    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when there are no vertices
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Copy shifted by `(dx, dy)`
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|&p| p + Vec2::new(dx, dy))
                .collect(),
        }
    }

    /// Convex hull of all pairwise vertex sums.
    ///
    /// With a circle as `other` this grows the polygon by the circle radius.
    /// An empty operand acts as the identity.
    pub fn minkowski_hull(&self, other: &Polygon2D) -> Polygon2D {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        let mut sums = Vec::with_capacity(self.len() * other.len());
        for a in &self.points {
            for b in &other.points {
                sums.push(*a + *b);
            }
        }
        Polygon2D::new(convex_hull(sums))
    }

    /// Separating axis test against `other`.
    ///
    /// Returns `None` when the polygons are disjoint (touching counts as
    /// disjoint), otherwise the shortest translation that moves `self` out
    /// of `other`. Both polygons are treated as convex; fewer than three
    /// vertices on either side yields `None`.
    pub fn intersects_polygon(&self, other: &Polygon2D) -> Option<(f32, f32)> {
        if self.len() < 3 || other.len() < 3 {
            return None;
        }

        let mut best: Option<(f64, DVec2)> = None;
        for axis in self.edge_normals().chain(other.edge_normals()) {
            let (a_min, a_max) = self.project(axis);
            let (b_min, b_max) = other.project(axis);
            if a_max <= b_min || b_max <= a_min {
                return None;
            }

            // Push self towards whichever side needs the smaller move.
            let push_negative = a_max - b_min;
            let push_positive = b_max - a_min;
            let (depth, sign) = if push_negative < push_positive {
                (push_negative, -1.0)
            } else {
                (push_positive, 1.0)
            };
            if best.is_none_or(|(d, _)| depth < d) {
                best = Some((depth, axis * depth * sign));
            }
        }

        best.map(|(_, push)| (push.x as f32, push.y as f32))
    }

    /// Axis-aligned bounds as `(min, max)`, `None` when empty
    pub fn bounds(&self) -> Option<(Point2D, Point2D)> {
        let first = *self.points.first()?;
        Some(
            self.points[1..]
                .iter()
                .fold((first, first), |(min, max), &p| (min.min(p), max.max(p))),
        )
    }

    /// Signed area (positive for counter-clockwise order)
    pub fn signed_area(&self) -> f64 {
        if self.len() < 3 {
            return 0.0;
        }
        let n = self.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.points[i].as_dvec2();
                let b = self.points[(i + 1) % n].as_dvec2();
                a.perp_dot(b)
            })
            .sum();
        twice / 2.0
    }

    /// True when every turn has the same orientation
    pub fn is_convex(&self) -> bool {
        let n = self.len();
        if n < 3 {
            return true;
        }
        let mut sign = 0.0f64;
        for i in 0..n {
            let turn = cross(self.points[i], self.points[(i + 1) % n], self.points[(i + 2) % n]);
            if turn.abs() <= 1e-9 {
                continue;
            }
            if sign == 0.0 {
                sign = turn.signum();
            } else if turn.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Unit normals of every non-degenerate edge
    fn edge_normals(&self) -> impl Iterator<Item = DVec2> + '_ {
        let n = self.points.len();
        (0..n).filter_map(move |i| {
            let edge = self.points[(i + 1) % n].as_dvec2() - self.points[i].as_dvec2();
            let length = edge.length();
            (length > f64::EPSILON).then(|| edge.perp() / length)
        })
    }

    fn project(&self, axis: DVec2) -> (f64, f64) {
        self.points
            .iter()
            .map(|p| p.as_dvec2().dot(axis))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }
}

/// Z component of `(a - o) x (b - o)`.
fn cross(o: Point2D, a: Point2D, b: Point2D) -> f64 {
    let o = o.as_dvec2();
    (a.as_dvec2() - o).perp_dot(b.as_dvec2() - o)
}

/// Monotone chain hull, counter-clockwise, collinear points dropped.
fn convex_hull(mut points: Vec<Point2D>) -> Vec<Point2D> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let mut lower: Vec<Point2D> = Vec::with_capacity(points.len());
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point2D> = Vec::with_capacity(points.len());
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f32) -> Polygon2D {
        Polygon2D::rectangle(0.0, 0.0, size, size)
    }

    #[test]
    fn test_approximated_circle() {
        let circle = Polygon2D::approximated_circle(6.5);
        assert_eq!(circle.len(), CIRCLE_SEGMENTS);
        assert_eq!(circle.points()[0], Point2D::new(6.5, 0.0));
        for p in circle.points() {
            let r = p.length();
            assert!((r - 6.5).abs() < 1e-4);
        }
        assert!(circle.is_convex());
    }

    #[test]
    fn test_translate() {
        let moved = square(10.0).translate(5.0, -5.0);
        assert_eq!(moved.points()[0], Point2D::new(5.0, -5.0));
        assert_eq!(moved.len(), 4);
        assert!(Polygon2D::empty().translate(1.0, 1.0).is_empty());
    }

    #[test]
    fn test_minkowski_identity() {
        let sq = square(10.0);
        assert_eq!(sq.minkowski_hull(&Polygon2D::empty()), sq);
        assert_eq!(Polygon2D::empty().minkowski_hull(&sq), sq);
    }

    #[test]
    fn test_minkowski_grows_by_radius() {
        let grown = square(10.0).minkowski_hull(&Polygon2D::approximated_circle(2.0));
        let (min, max) = grown.bounds().expect("non-empty");
        assert!((min.x + 2.0).abs() < 1e-4);
        assert!((min.y + 2.0).abs() < 1e-4);
        assert!((max.x - 12.0).abs() < 1e-4);
        assert!((max.y - 12.0).abs() < 1e-4);
        assert!(grown.is_convex());
        assert!(grown.signed_area() > 100.0);
    }

    #[test]
    fn test_minkowski_hull_drops_interior_points() {
        let concave = Polygon2D::from_coords(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (5.0, 2.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ]);
        let point = Polygon2D::from_coords(&[(0.0, 0.0)]);
        let hull = concave.minkowski_hull(&point);
        assert_eq!(hull.len(), 4);
        assert!(hull.is_convex());
    }

    #[test]
    fn test_disjoint_polygons() {
        let a = square(10.0);
        let b = square(10.0).translate(20.0, 0.0);
        assert_eq!(a.intersects_polygon(&b), None);

        // Shared edge only.
        let c = square(10.0).translate(10.0, 0.0);
        assert_eq!(a.intersects_polygon(&c), None);
    }

    #[test]
    fn test_overlap_returns_minimum_translation() {
        let a = square(10.0);
        let b = square(10.0).translate(8.0, 1.0);
        let (dx, dy) = a.intersects_polygon(&b).expect("overlapping");
        assert!((dx + 2.0).abs() < 1e-4, "dx = {dx}");
        assert!(dy.abs() < 1e-4, "dy = {dy}");

        let separated = a.translate(dx, dy);
        assert_eq!(separated.intersects_polygon(&b), None);
    }

    #[test]
    fn test_degenerate_inputs() {
        let a = square(10.0);
        let line = Polygon2D::from_coords(&[(0.0, 0.0), (5.0, 5.0)]);
        assert_eq!(a.intersects_polygon(&line), None);
        assert_eq!(Polygon2D::empty().intersects_polygon(&a), None);
        assert!(Polygon2D::empty().bounds().is_none());
        assert_eq!(line.signed_area(), 0.0);
    }

    #[test]
    fn test_circle_intersection() {
        let tower = Polygon2D::approximated_circle(10.0).translate(70.0, -70.0);
        let blob = Polygon2D::approximated_circle(6.5).translate(70.0, -70.0);
        assert!(tower.intersects_polygon(&blob).is_some());

        let far = Polygon2D::approximated_circle(6.5).translate(-70.0, 70.0);
        assert!(tower.intersects_polygon(&far).is_none());
    }
}
