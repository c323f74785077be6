//! Geometry primitives shared by the build volume and arrangement engines.

mod bbox;
mod polygon;

pub use bbox::{BoundingBox3D, Vec3};
pub use polygon::{Point2D, Polygon2D, CIRCLE_SEGMENTS};
