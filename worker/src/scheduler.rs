//! Cron ticks as events.
//!
//! ```text
//! JobScheduler (per cron expression)
//!     │
//!     └─► emit schedule.fired { schedule, firedAt }
//!             └─► subscribers that accept that schedule name
//! ```
//!
//! Every node runs the scheduler. The tick's event id is derived from the
//! schedule name and the minute it fired, so the ledger stores one event per
//! tick no matter how many nodes emit it.

use crate::error::Error;
use chrono::{DateTime, Utc};
use entity_api::Id;
use events::payload::ScheduleFired;
use events::{DomainEvent, EventEmitter, EventEnvelope};
use log::*;
use tokio_cron_scheduler::Job;

pub use tokio_cron_scheduler::JobScheduler;

const TICK_NAMESPACE: Id = Id::from_u128(0x6f1c_2a4e_93b7_4d05_8e1f_b2c4_7d90_a316);

/// A named cron expression (six fields, seconds first).
#[derive(Debug, Clone, PartialEq)]
pub struct CronSchedule {
    pub name: &'static str,
    pub cron: String,
}

impl CronSchedule {
    pub fn new(name: &'static str, cron: impl Into<String>) -> Self {
        Self {
            name,
            cron: cron.into(),
        }
    }
}

/// Starts one cron job per schedule. The returned scheduler must be kept
/// alive and shut down on exit.
pub async fn start_scheduler(
    emitter: EventEmitter,
    schedules: &[CronSchedule],
) -> Result<JobScheduler, Error> {
    let scheduler = JobScheduler::new().await?;

    for schedule in schedules {
        let name = schedule.name;
        let job_emitter = emitter.clone();
        let job = Job::new_async(schedule.cron.as_str(), move |_uuid, _lock| {
            let emitter = job_emitter.clone();
            Box::pin(async move {
                if let Err(e) = fire(&emitter, name, Utc::now()).await {
                    error!("Scheduled task {name} failed to fire: {e}");
                }
            })
        })?;
        scheduler.add(job).await?;
        info!("Scheduled {} ({})", schedule.name, schedule.cron);
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Emits the tick for `schedule` at `at`.
pub async fn fire(
    emitter: &EventEmitter,
    schedule: &str,
    at: DateTime<Utc>,
) -> Result<EventEnvelope, events::Error> {
    debug!("Firing scheduled task {schedule}");
    let event = DomainEvent::ScheduleFired(ScheduleFired {
        schedule: schedule.to_string(),
        fired_at: at.to_rfc3339(),
    });
    emitter.emit_with_id(tick_id(schedule, at), event).await
}

fn tick_id(schedule: &str, at: DateTime<Utc>) -> Id {
    let slot = format!("{schedule}@{}", at.format("%Y-%m-%dT%H:%M"));
    Id::new_v5(&TICK_NAMESPACE, slot.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use crate::step::StepContext;
    use crate::subscriber::{Registry, Subscriber};
    use crate::DurableQueue;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use events::EventName;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct OnTick(&'static str);

    #[async_trait]
    impl Subscriber for OnTick {
        fn id(&self) -> &'static str {
            self.0
        }

        fn trigger(&self) -> EventName {
            EventName::ScheduleFired
        }

        fn accepts(&self, event: &DomainEvent) -> bool {
            matches!(event, DomainEvent::ScheduleFired(tick) if tick.schedule == self.0)
        }

        async fn handle(&self, _event: &EventEnvelope, _steps: &StepContext) -> Result<Value, Error> {
            Ok(json!({}))
        }
    }

    fn emitter_over(ledger: Arc<MemoryLedger>) -> EventEmitter {
        let registry = Arc::new(
            Registry::new()
                .with_subscriber(Arc::new(OnTick("detect-inactive-users")))
                .with_subscriber(Arc::new(OnTick("send-daily-digest"))),
        );
        EventEmitter::new(Arc::new(DurableQueue::new(ledger, registry)))
    }

    #[tokio::test]
    async fn ticks_from_several_nodes_in_the_same_minute_store_one_event() {
        let ledger = Arc::new(MemoryLedger::new());
        let emitter = emitter_over(ledger.clone());
        let first = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 2).unwrap();

        let a = fire(&emitter, "detect-inactive-users", first).await.unwrap();
        let b = fire(&emitter, "detect-inactive-users", second).await.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(ledger.event_count(), 1);
        assert_eq!(ledger.runs().len(), 1);
    }

    #[tokio::test]
    async fn tick_runs_only_the_subscriber_for_that_schedule() {
        let ledger = Arc::new(MemoryLedger::new());
        let emitter = emitter_over(ledger.clone());
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();

        let tick = fire(&emitter, "send-daily-digest", at).await.unwrap();

        let scheduled: Vec<_> = ledger
            .runs_for_event(tick.id)
            .into_iter()
            .map(|run| run.subscriber_id)
            .collect();
        assert_eq!(scheduled, vec!["send-daily-digest"]);
    }

    #[tokio::test]
    async fn next_day_is_a_new_tick() {
        let ledger = Arc::new(MemoryLedger::new());
        let emitter = emitter_over(ledger.clone());

        fire(&emitter, "send-daily-digest", Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap())
            .await
            .unwrap();
        fire(&emitter, "send-daily-digest", Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap())
            .await
            .unwrap();

        assert_eq!(ledger.event_count(), 2);
    }
}
