use crate::error::Error;
use crate::step::StepContext;
use async_trait::async_trait;
use events::{DomainEvent, EventEnvelope, EventName};
use log::*;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Attempts a run gets before it is marked failed, unless the subscriber says otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// A durable handler bound to one event name.
///
/// `handle` may be invoked more than once for the same event (retries, replays,
/// lease expiry). Work that must not repeat goes through [`StepContext::run`].
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Stable identifier, persisted with every run.
    fn id(&self) -> &'static str;

    fn trigger(&self) -> EventName;

    /// Narrows `trigger` further; events rejected here get no run for this
    /// subscriber.
    fn accepts(&self, _event: &DomainEvent) -> bool {
        true
    }

    fn max_attempts(&self) -> u32 {
        DEFAULT_MAX_ATTEMPTS
    }

    /// Returns a JSON summary of what the run did, stored with the completed run.
    async fn handle(&self, event: &EventEnvelope, steps: &StepContext) -> Result<Value, Error>;
}

/// Subscribers keyed by id. Built once at startup and shared read-only.
#[derive(Clone, Default)]
pub struct Registry {
    subscribers: HashMap<&'static str, Arc<dyn Subscriber>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. A later registration with the same id replaces the earlier one.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        let id = subscriber.id();
        if self.subscribers.insert(id, subscriber).is_some() {
            warn!("Subscriber {id} registered twice; keeping the last registration");
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Subscriber>> {
        self.subscribers.get(id).cloned()
    }

    /// Subscribers triggered by `name`, ordered by id.
    pub fn for_event(&self, name: EventName) -> Vec<Arc<dyn Subscriber>> {
        let mut matching: Vec<_> = self
            .subscribers
            .values()
            .filter(|subscriber| subscriber.trigger() == name)
            .cloned()
            .collect();
        matching.sort_by_key(|subscriber| subscriber.id());
        matching
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
