//! # Event Bus Module
//!
//! Publish/subscribe plumbing between the profile store, the build volume
//! and the file/slicer workers.
//!
//! - Publishers emit typed events without knowing subscribers
//! - Subscribers filter by category or by setting key
//! - Synchronous handlers run on the publishing thread; async consumers
//!   poll a broadcast receiver
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use slicekit_core::event_bus::{EventBus, EventFilter, SettingValue};
//!
//! let bus = Arc::new(EventBus::new());
//! let id = bus.subscribe(EventFilter::setting_keys(["raft_airgap"]), |event| {
//!     tracing::debug!("{}", event.description());
//! });
//! bus.publish_setting_changed("raft_airgap", "value", SettingValue::Float(0.3));
//! bus.unsubscribe(id);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
