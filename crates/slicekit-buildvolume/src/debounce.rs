//! Coalescing of setting changes into build volume rebuilds.
//!
//! The bus handler runs on whatever thread published the change, often
//! while that thread holds the profile lock, so it only forwards the
//! setting name into a channel. A background task collects names until
//! the stream has been quiet for the configured interval and then applies
//! them in one rebuild.

use std::sync::Arc;
use std::time::Duration;

use slicekit_core::{AppEvent, EventBus, EventCategory, EventFilter, SettingsEvent, SubscriptionId};
use slicekit_settings::SharedProfile;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::volume::SharedBuildVolume;

#[derive(Debug)]
enum Change {
    Setting(String),
    Reload,
}

#[derive(Debug, Default)]
struct Pending {
    count: usize,
    reload: bool,
}

impl Pending {
    fn record(&mut self, change: Change, volume: &SharedBuildVolume) {
        self.count += 1;
        match change {
            Change::Setting(name) => volume.write().setting_changed(&name),
            Change::Reload => self.reload = true,
        }
    }

    fn apply(&self, profile: &SharedProfile, volume: &SharedBuildVolume) {
        let profile = profile.read();
        let mut volume = volume.write();
        if self.reload {
            tracing::debug!("Reloading build volume after {} change(s)", self.count);
            volume.load_profile(&profile);
        } else {
            let rebuilt = volume.apply_pending(&profile);
            tracing::debug!("Applied {} setting change(s), rebuilt: {}", self.count, rebuilt);
        }
    }
}

/// Running debounce task; dropping it leaves the task running until the
/// bus is dropped, call [`SettingDebouncer::stop`] to end it
pub struct SettingDebouncer {
    bus: Arc<EventBus>,
    subscription: SubscriptionId,
    task: JoinHandle<()>,
}

impl SettingDebouncer {
    /// Subscribe to setting events and start the rebuild task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        bus: Arc<EventBus>,
        profile: SharedProfile,
        volume: SharedBuildVolume,
        interval: Duration,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Change>();

        let subscription = bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Settings]),
            move |event| {
                let change = match event {
                    AppEvent::Settings(SettingsEvent::Changed { key, property, .. })
                        if property == "value" =>
                    {
                        Change::Setting(key)
                    }
                    AppEvent::Settings(SettingsEvent::Loaded { .. })
                    | AppEvent::Settings(SettingsEvent::ProfileReset) => Change::Reload,
                    _ => return,
                };
                if tx.send(change).is_err() {
                    tracing::trace!("Build volume debouncer already stopped");
                }
            },
        );

        let task = tokio::spawn(async move {
            tracing::debug!("Build volume debouncer started ({:?})", interval);
            let mut closed = false;

            while !closed {
                let Some(first) = rx.recv().await else {
                    break;
                };

                let mut pending = Pending::default();
                pending.record(first, &volume);

                loop {
                    tokio::select! {
                        next = rx.recv() => match next {
                            Some(change) => pending.record(change, &volume),
                            None => {
                                closed = true;
                                break;
                            }
                        },
                        _ = tokio::time::sleep(interval) => break,
                    }
                }

                pending.apply(&profile, &volume);
            }

            tracing::debug!("Build volume debouncer stopped");
        });

        Self {
            bus,
            subscription,
            task,
        }
    }

    /// Unsubscribe, flush what is already queued and wait for the task
    pub async fn stop(self) {
        self.bus.unsubscribe(self.subscription);
        if let Err(e) = self.task.await {
            tracing::warn!("Build volume debouncer ended abnormally: {}", e);
        }
    }
}
