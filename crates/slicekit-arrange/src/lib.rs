//! # SliceKit Arrange
//!
//! Places scene objects on the build platform with a grid-snapping
//! arranger. Arranging is pure: it returns an [`OperationBatch`] that the
//! caller applies to the scene in one step.

pub mod error;
pub mod grid;
pub mod operation;

pub use error::{ArrangeError, ArrangeResult};
pub use grid::{Arrangement, GridArrange, Platform};
pub use operation::{OperationBatch, TranslateOperation};

use slicekit_buildvolume::BuildVolume;
use slicekit_core::{AppEvent, EventBus, NodeId, Scene, SceneEvent};

/// Arrange `nodes` on the volume's platform around the `fixed` nodes.
///
/// Empty input gives an empty batch, even before the volume is built.
pub fn arrange(
    scene: &Scene,
    nodes: &[NodeId],
    volume: &BuildVolume,
    fixed: &[NodeId],
) -> ArrangeResult<Arrangement> {
    if nodes.is_empty() {
        return Ok(Arrangement::default());
    }
    let platform = Platform::from_volume(volume)?;
    Ok(GridArrange::new(scene, nodes, &platform, fixed)?.arrange())
}

/// Re-arrange every root node of the scene and apply the result.
///
/// Returns the number of objects left beside the platform.
pub fn arrange_all(scene: &mut Scene, volume: &BuildVolume, bus: Option<&EventBus>) -> ArrangeResult<usize> {
    let nodes: Vec<NodeId> = scene.roots().collect();
    let arrangement = arrange(scene, &nodes, volume, &[])?;
    arrangement.batch.apply(scene)?;

    if let Some(bus) = bus {
        let event = AppEvent::Scene(SceneEvent::Arranged {
            placed: arrangement.placed,
            leftover: arrangement.leftover,
        });
        if bus.publish(event).is_err() {
            tracing::trace!("Arrange event had no subscribers");
        }
    }
    if let Some(error) = arrangement.error() {
        tracing::debug!("Arrange all: {}", error);
    }
    Ok(arrangement.leftover)
}
