//! # SliceKit Core
//!
//! Core types shared across SliceKit crates: the unified error types, the
//! event bus, geometry primitives and the scene arena.

pub mod error;
pub mod event_bus;
pub mod geometry;
pub mod scene;

pub use error::{ConfigurationError, Error, GcodeError, GeometryError, PluginError, Result};

pub use event_bus::{
    AppEvent, BuildVolumeEvent, EventBus, EventBusError, EventCategory, EventFilter, FileEvent,
    SceneEvent, SettingValue, SettingsEvent, SlicerEvent, SubscriptionId,
};

pub use geometry::{BoundingBox3D, Point2D, Polygon2D, Vec3, CIRCLE_SEGMENTS};
pub use scene::{NodeId, NodeKind, Scene, SceneObject};
