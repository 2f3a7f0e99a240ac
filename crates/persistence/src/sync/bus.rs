//! Synchronous, in-process event bus.
//!
//! Listeners run one after another, in registration order, on the task that
//! publishes. A listener error is logged and counted; it never reaches the
//! publisher and never stops delivery to the remaining listeners.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::error::SyncResult;
use crate::types::EntityKind;

use super::event::ChangeEvent;

/// Selects the events a listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Every event.
    All,
    /// Events about one entity kind.
    Kind(EntityKind),
}

impl EventType {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            EventType::All => true,
            EventType::Kind(kind) => event.kind() == *kind,
        }
    }
}

/// Reacts to committed changes.
#[async_trait]
pub trait ChangeListener: Send + Sync {
    /// A name for logs and statistics.
    fn name(&self) -> &str;

    async fn on_event(&self, event: &ChangeEvent) -> SyncResult<()>;
}

/// Delivery statistics for one listener.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenerStats {
    pub listener: String,
    /// Events handled successfully.
    pub delivered: u64,
    /// Events whose handling failed.
    pub failed: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Outcome of one [`EventBus::publish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub delivered: usize,
    pub failed: usize,
}

struct Subscription {
    event_type: EventType,
    listener: Arc<dyn ChangeListener>,
    stats: ListenerStats,
}

/// Delivers [`ChangeEvent`]s to subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.read().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. Listeners are called in registration order.
    pub fn subscribe(&self, event_type: EventType, listener: Arc<dyn ChangeListener>) {
        let stats = ListenerStats {
            listener: listener.name().to_string(),
            ..ListenerStats::default()
        };
        self.subscriptions.write().push(Subscription {
            event_type,
            listener,
            stats,
        });
    }

    /// Delivers `event` to every matching listener before returning.
    pub async fn publish(&self, event: &ChangeEvent) -> PublishOutcome {
        // The lock is not held across listener calls.
        let targets: Vec<(usize, Arc<dyn ChangeListener>)> = self
            .subscriptions
            .read()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.event_type.matches(event))
            .map(|(position, s)| (position, Arc::clone(&s.listener)))
            .collect();

        let mut outcome = PublishOutcome::default();
        for (position, listener) in targets {
            let result = listener.on_event(event).await;

            let mut subscriptions = self.subscriptions.write();
            let stats = &mut subscriptions[position].stats;
            match result {
                Ok(()) => {
                    stats.delivered += 1;
                    stats.last_success = Some(Utc::now());
                    outcome.delivered += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    stats.last_error = Some(e.to_string());
                    outcome.failed += 1;
                    error!(
                        listener = %listener.name(),
                        event = event.name(),
                        kind = %event.kind(),
                        id = %event.entity_id(),
                        error = %e,
                        "Index synchronization failed"
                    );
                }
            }
        }

        debug!(
            event = event.name(),
            kind = %event.kind(),
            id = %event.entity_id(),
            delivered = outcome.delivered,
            failed = outcome.failed,
            "Published change event"
        );
        outcome
    }

    /// Statistics for every listener, in registration order.
    pub fn stats(&self) -> Vec<ListenerStats> {
        self.subscriptions
            .read()
            .iter()
            .map(|s| s.stats.clone())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}
