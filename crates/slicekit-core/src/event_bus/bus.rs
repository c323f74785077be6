//! Event Bus implementation.
//!
//! Components receive an `Arc<EventBus>` at construction; there is no
//! process-wide instance. Handlers are called in subscription order.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{AppEvent, EventCategory, SettingValue, SettingsEvent};

/// Default capacity of the async receiver channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.0.simple().to_string();
        write!(f, "sub-{}", &id[..8])
    }
}

/// Which events a subscriber wants
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventFilter {
    #[default]
    All,
    /// Events of any of these categories
    Categories(Vec<EventCategory>),
    /// Setting changes for these keys only
    SettingKeys(Vec<String>),
}

impl EventFilter {
    pub fn setting_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventFilter::SettingKeys(keys.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, event: &AppEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
            EventFilter::SettingKeys(keys) => match event {
                AppEvent::Settings(settings) => settings
                    .changed_key()
                    .is_some_and(|key| keys.iter().any(|k| k == key)),
                _ => false,
            },
        }
    }
}

type EventHandler = Arc<dyn Fn(AppEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: EventHandler,
}

/// Errors from [`EventBus::publish`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventBusError {
    /// Neither handlers nor receivers saw the event
    #[error("No active subscribers")]
    NoSubscribers,
}

/// Publish/subscribe hub for settings, build volume, scene, file and
/// slicer events
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus whose async receivers buffer up to `capacity` events before lagging
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Deliver an event to matching handlers, then to async receivers.
    ///
    /// Returns how many handlers and receivers saw it.
    ///
    /// Handlers are cloned out of the table before they run, so a handler
    /// may subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: AppEvent) -> Result<usize, EventBusError> {
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.filter.matches(&event))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in &handlers {
            handler(event.clone());
        }

        let receivers = if self.sender.receiver_count() > 0 {
            self.sender.send(event).unwrap_or(0)
        } else {
            0
        };

        match handlers.len() + receivers {
            0 => Err(EventBusError::NoSubscribers),
            n => Ok(n),
        }
    }

    /// Publish a `(setting, property)` change notification
    ///
    /// Having nobody listen is not an error for setting changes.
    pub fn publish_setting_changed(&self, key: &str, property: &str, value: SettingValue) {
        let event = AppEvent::Settings(SettingsEvent::Changed {
            key: key.to_string(),
            property: property.to_string(),
            value,
        });
        if self.publish(event).is_err() {
            tracing::trace!("Setting change for {} had no subscribers", key);
        }
    }

    /// Register a handler; it runs on the publishing thread and must not
    /// block or take locks the publisher may hold.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(AppEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler: Arc::new(handler),
        });
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Receiver for consumers running in a tokio task
    pub fn receiver(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Returns `false` when the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        let removed = subscriptions.len() != before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}
