use proptest::prelude::*;
use slicekit_core::{Point2D, Polygon2D};

fn polygon_strategy() -> impl Strategy<Value = Polygon2D> {
    prop::collection::vec((-100.0f32..100.0, -100.0f32..100.0), 0..12)
        .prop_map(|coords| Polygon2D::from_coords(&coords))
}

proptest! {
    #[test]
    fn minkowski_hull_is_convex(p in polygon_strategy(), q in polygon_strategy()) {
        let hull = p.minkowski_hull(&q);
        if !p.is_empty() && !q.is_empty() {
            prop_assert!(hull.is_convex());
        }
    }

    #[test]
    fn minkowski_hull_contains_pairwise_sums_bounds(
        p in polygon_strategy(),
        q in polygon_strategy(),
    ) {
        prop_assume!(!p.is_empty() && !q.is_empty());
        let hull = p.minkowski_hull(&q);
        let (lo, hi) = hull.bounds().expect("non-empty hull");
        for a in p.points() {
            for b in q.points() {
                let s = Point2D::new(a.x + b.x, a.y + b.y);
                prop_assert!(s.x >= lo.x - 1e-3 && s.x <= hi.x + 1e-3);
                prop_assert!(s.y >= lo.y - 1e-3 && s.y <= hi.y + 1e-3);
            }
        }
    }

    #[test]
    fn translate_is_invertible(p in polygon_strategy(), dx in -50.0f32..50.0, dy in -50.0f32..50.0) {
        let back = p.translate(dx, dy).translate(-dx, -dy);
        for (a, b) in p.points().iter().zip(back.points()) {
            prop_assert!((a.x - b.x).abs() < 1e-3);
            prop_assert!((a.y - b.y).abs() < 1e-3);
        }
    }

    #[test]
    fn separation_vector_separates(dx in -15.0f32..15.0, dy in -15.0f32..15.0) {
        let a = Polygon2D::approximated_circle(10.0);
        let b = Polygon2D::rectangle(-5.0, -5.0, 5.0, 5.0).translate(dx, dy);
        if let Some((mx, my)) = a.intersects_polygon(&b) {
            let len = (mx * mx + my * my).sqrt();
            prop_assume!(len > 1e-3);
            // Nudge past the touching position.
            let scale = (len + 0.01) / len;
            let moved = a.translate(mx * scale, my * scale);
            prop_assert!(moved.intersects_polygon(&b).is_none());
        }
    }
}
