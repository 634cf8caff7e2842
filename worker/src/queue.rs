use crate::ledger::{NewRun, RunLedger};
use crate::subscriber::Registry;
use async_trait::async_trait;
use events::{EventEnvelope, EventQueue};
use log::*;
use std::sync::{Arc, OnceLock};

/// [`EventQueue`] that persists each event together with one pending run per
/// subscriber registered for its name.
///
/// Subscribers that emit events need an emitter before the registry exists, so
/// the registry may be bound after construction with [`DurableQueue::bind`].
pub struct DurableQueue {
    ledger: Arc<dyn RunLedger>,
    registry: OnceLock<Arc<Registry>>,
}

impl DurableQueue {
    pub fn new(ledger: Arc<dyn RunLedger>, registry: Arc<Registry>) -> Self {
        let queue = Self::unbound(ledger);
        queue.bind(registry);
        queue
    }

    /// A queue that rejects events until a registry is bound.
    pub fn unbound(ledger: Arc<dyn RunLedger>) -> Self {
        Self {
            ledger,
            registry: OnceLock::new(),
        }
    }

    /// Binds the registry used to schedule runs. Only the first call has an effect.
    pub fn bind(&self, registry: Arc<Registry>) {
        if self.registry.set(registry).is_err() {
            warn!("DurableQueue registry already bound; ignoring");
        }
    }
}

#[async_trait]
impl EventQueue for DurableQueue {
    async fn enqueue(&self, envelope: &EventEnvelope) -> Result<(), events::Error> {
        let registry = self
            .registry
            .get()
            .ok_or_else(|| events::Error::queue("no subscriber registry bound to the queue"))?;

        let runs: Vec<NewRun> = registry
            .for_event(envelope.name())
            .iter()
            .filter(|subscriber| subscriber.accepts(&envelope.event))
            .map(|subscriber| NewRun {
                subscriber_id: subscriber.id().to_string(),
                max_attempts: i32::try_from(subscriber.max_attempts().max(1)).unwrap_or(i32::MAX),
            })
            .collect();

        if runs.is_empty() {
            debug!("No subscribers for {}; storing event only", envelope.name());
        }

        self.ledger
            .enqueue(envelope, &runs)
            .await
            .map_err(events::Error::queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use crate::subscriber::tests::Noop;
    use events::{EventEmitter, EventName, Id};
    use serde_json::json;

    #[tokio::test]
    async fn emitting_schedules_one_run_per_matching_subscriber() {
        let ledger = Arc::new(MemoryLedger::new());
        let registry = Arc::new(
            Registry::new()
                .with_subscriber(Arc::new(Noop {
                    id: "manager-alerts",
                    trigger: EventName::AttemptScored,
                }))
                .with_subscriber(Arc::new(Noop {
                    id: "coach/on-attempt-scored",
                    trigger: EventName::AttemptScored,
                }))
                .with_subscriber(Arc::new(Noop {
                    id: "assignment-created",
                    trigger: EventName::AssignmentCreated,
                })),
        );
        let emitter = EventEmitter::new(Arc::new(DurableQueue::new(ledger.clone(), registry)));

        let envelope = emitter
            .emit_json(
                "attempt.scored",
                json!({
                    "attemptId": Id::new_v4(),
                    "userId": Id::new_v4(),
                    "orgId": Id::new_v4(),
                    "scenarioId": Id::new_v4(),
                    "score": 64,
                    "scoreBreakdown": {},
                    "kpis": {},
                    "criticalFailures": []
                }),
            )
            .await
            .unwrap();

        let mut scheduled: Vec<_> = ledger
            .runs_for_event(envelope.id)
            .into_iter()
            .map(|run| run.subscriber_id)
            .collect();
        scheduled.sort();

        assert_eq!(scheduled, vec!["coach/on-attempt-scored", "manager-alerts"]);
    }

    #[tokio::test]
    async fn unbound_queue_rejects_events() {
        let ledger = Arc::new(MemoryLedger::new());
        let emitter = EventEmitter::new(Arc::new(DurableQueue::unbound(ledger.clone())));

        let err = emitter
            .emit_json(
                "recording.uploaded",
                json!({
                    "orgId": Id::new_v4(),
                    "fileUrl": "s3://recordings/1.wav",
                    "uploadedBy": Id::new_v4()
                }),
            )
            .await
            .unwrap_err();

        assert!(!err.is_validation());
        assert!(ledger.runs().is_empty());
    }

    #[tokio::test]
    async fn invalid_event_schedules_nothing() {
        let ledger = Arc::new(MemoryLedger::new());
        let registry = Arc::new(Registry::new().with_subscriber(Arc::new(Noop {
            id: "manager-alerts",
            trigger: EventName::AttemptScored,
        })));
        let emitter = EventEmitter::new(Arc::new(DurableQueue::new(ledger.clone(), registry)));

        let result = emitter
            .emit_json("attempt.scored", json!({"score": 64}))
            .await;

        assert!(result.unwrap_err().is_validation());
        assert!(ledger.runs().is_empty());
    }
}
