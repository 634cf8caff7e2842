use crate::error::Error;
use crate::event::{DomainEvent, EventEnvelope};
use crate::Id;
use async_trait::async_trait;
use log::*;
use serde_json::Value;
use std::sync::Arc;

/// Anything that can durably accept a validated event.
///
/// The worker crate provides the Postgres-backed queue; tests use an
/// in-memory recorder.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn enqueue(&self, envelope: &EventEnvelope) -> Result<(), Error>;
}

/// The single entry point application code uses to emit events.
///
/// Validation runs before the queue is touched, so an invalid event never
/// produces a side effect.
#[derive(Clone)]
pub struct EventEmitter {
    queue: Arc<dyn EventQueue>,
}

impl EventEmitter {
    pub fn new(queue: Arc<dyn EventQueue>) -> Self {
        Self { queue }
    }

    /// Validates and enqueues a typed event, returning the envelope that was stored.
    pub async fn emit(&self, event: DomainEvent) -> Result<EventEnvelope, Error> {
        self.emit_with_id(Id::new_v4(), event).await
    }

    /// Like [`EventEmitter::emit`] with a caller-chosen event id. Emitting
    /// twice with the same id delivers the event once.
    pub async fn emit_with_id(&self, id: Id, event: DomainEvent) -> Result<EventEnvelope, Error> {
        event.validate().inspect_err(|err| {
            warn!("Refusing to emit {}: {err}", event.name());
        })?;

        let envelope = EventEnvelope::with_id(id, event);
        self.queue.enqueue(&envelope).await.inspect_err(|err| {
            error!("Failed to enqueue {} ({}): {err}", envelope.name(), envelope.id);
        })?;

        debug!("Emitted {} ({})", envelope.name(), envelope.id);
        Ok(envelope)
    }

    /// Validates a raw name/payload pair against the registry and enqueues it.
    pub async fn emit_json(&self, name: &str, payload: Value) -> Result<EventEnvelope, Error> {
        let event = DomainEvent::from_parts(name, payload).inspect_err(|err| {
            warn!("Refusing to emit {name}: {err}");
        })?;
        self.emit(event).await
    }
}
