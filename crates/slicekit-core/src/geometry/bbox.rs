//! Axis-aligned boxes over [`glam::Vec3`]. Y is the up axis: X points
//! right and Z towards the front of the machine.

use serde::{Deserialize, Serialize};

pub use glam::Vec3;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox3D {
    /// Minimum corner.
    pub minimum: Vec3,
    /// Maximum corner.
    pub maximum: Vec3,
}

impl BoundingBox3D {
    /// Box from two corners, normalised so `minimum <= maximum`
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            minimum: a.min(b),
            maximum: a.max(b),
        }
    }

    /// Box centred on the origin in X/Z resting on `y = 0`
    pub fn from_footprint(width: f32, depth: f32, height: f32) -> Self {
        Self::new(
            Vec3::new(-width / 2.0, 0.0, -depth / 2.0),
            Vec3::new(width / 2.0, height, depth / 2.0),
        )
    }

    /// Extent along X
    pub fn width(&self) -> f32 {
        self.maximum.x - self.minimum.x
    }

    /// Extent along Z
    pub fn depth(&self) -> f32 {
        self.maximum.z - self.minimum.z
    }

    /// Extent along Y
    pub fn height(&self) -> f32 {
        self.maximum.y - self.minimum.y
    }

    pub fn left(&self) -> f32 {
        self.minimum.x
    }

    pub fn right(&self) -> f32 {
        self.maximum.x
    }

    pub fn bottom(&self) -> f32 {
        self.minimum.y
    }

    pub fn top(&self) -> f32 {
        self.maximum.y
    }

    pub fn back(&self) -> f32 {
        self.minimum.z
    }

    pub fn front(&self) -> f32 {
        self.maximum.z
    }

    /// Centre point
    pub fn center(&self) -> Vec3 {
        (self.minimum + self.maximum) * 0.5
    }

    /// Extents along X, Y and Z
    pub fn size(&self) -> Vec3 {
        self.maximum - self.minimum
    }

    /// Copy shifted by `offset`
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            minimum: self.minimum + offset,
            maximum: self.maximum + offset,
        }
    }

    /// Copy with a different bottom Y
    pub fn with_bottom(&self, bottom: f32) -> Self {
        let mut out = *self;
        out.minimum.y = bottom;
        out
    }

    /// True when `other` lies entirely inside this box (boundaries included)
    pub fn contains_box(&self, other: &BoundingBox3D) -> bool {
        other.minimum.cmpge(self.minimum).all() && other.maximum.cmple(self.maximum).all()
    }

    /// True when the boxes overlap with positive volume
    pub fn intersects(&self, other: &BoundingBox3D) -> bool {
        self.minimum.cmplt(other.maximum).all() && other.minimum.cmplt(self.maximum).all()
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox3D) -> Self {
        Self {
            minimum: self.minimum.min(other.minimum),
            maximum: self.maximum.max(other.maximum),
        }
    }
}
