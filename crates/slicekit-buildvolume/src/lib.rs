//! # SliceKit Build Volume
//!
//! Printable space of the configured machine. From a snapshot of the
//! profile this crate derives the platform's disallowed areas (border
//! strips, prime blobs, prime tower, machine and nozzle exclusions), the
//! raft thickness, extra Z clearance and the printable bounding box, and it
//! flags scene nodes that fall outside of it.
//!
//! Setting changes reach the volume through the event bus and are
//! coalesced by [`SettingDebouncer`] before a rebuild.

pub mod debounce;
pub mod disallowed;
pub mod settings;
pub mod volume;

pub use debounce::SettingDebouncer;
pub use disallowed::DisallowedAreas;
pub use settings::{AdhesionType, ChangeGroups, ExtruderVolumeSettings, MachineShape, VolumeSettings};
pub use volume::{BuildVolume, SharedBuildVolume, VolumeState};
