//! Error types for arrangement.

use slicekit_core::{GeometryError, NodeId};
use thiserror::Error;

/// Errors raised while building or applying an arrangement
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArrangeError {
    /// A node referenced by the arrangement is not in the scene.
    #[error("{0} is not in the scene")]
    UnknownNode(NodeId),

    /// The build volume has no bounding box yet.
    #[error("Build volume has not been built")]
    VolumeNotBuilt,

    /// Geometry problem reported by the arranger.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

pub type ArrangeResult<T> = std::result::Result<T, ArrangeError>;
