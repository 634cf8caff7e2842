//! Polling executor for subscriber runs.
//!
//! ```text
//! Runtime
//!     │
//!     ├─► claim due runs (RunLedger::claim_due)
//!     ├─► spawn one task per run, bounded by a semaphore
//!     │       └─► Subscriber::handle(event, StepContext)
//!     └─► complete / reschedule with backoff / fail
//! ```

use crate::backoff::Backoff;
use crate::ledger::{ClaimedRun, RunLedger};
use crate::subscriber::Registry;
use chrono::Utc;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum number of runs executing at once
    pub concurrency: usize,
    /// Maximum number of runs claimed per poll
    pub batch_size: u64,
    /// How long to sleep when nothing is due
    pub poll_interval: Duration,
    /// Delay between failed attempts of a run
    pub backoff: Backoff,
    /// How often a running handler extends its lease; keep well under the
    /// ledger's lease
    pub heartbeat_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            concurrency: 16,
            batch_size: 32,
            poll_interval: Duration::from_millis(500),
            backoff: Backoff::default(),
            heartbeat_interval: Duration::from_secs(60),
        }
    }
}

/// What happened to a single run attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Rescheduled { attempt: u32 },
    Failed { error: String },
}

#[derive(Clone)]
pub struct Runtime {
    ledger: Arc<dyn RunLedger>,
    registry: Arc<Registry>,
    config: RuntimeConfig,
    permits: Arc<Semaphore>,
}

impl Runtime {
    pub fn new(ledger: Arc<dyn RunLedger>, registry: Arc<Registry>, config: RuntimeConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            ledger,
            registry,
            config,
            permits,
        }
    }

    pub fn ledger(&self) -> Arc<dyn RunLedger> {
        Arc::clone(&self.ledger)
    }

    /// Polls and executes runs until `shutdown` is cancelled, then waits for
    /// in-flight runs to finish.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Subscriber runtime starting: {} subscriber(s), concurrency {}",
            self.registry.len(),
            self.config.concurrency
        );

        let mut in_flight = JoinSet::new();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            // Reap finished tasks so the set does not grow without bound.
            while in_flight.try_join_next().is_some() {}

            let capacity = self.permits.available_permits() as u64;
            let claimed = if capacity == 0 {
                Vec::new()
            } else {
                match self
                    .ledger
                    .claim_due(capacity.min(self.config.batch_size))
                    .await
                {
                    Ok(runs) => runs,
                    Err(e) => {
                        error!("Failed to claim subscriber runs: {e}");
                        Vec::new()
                    }
                }
            };

            if claimed.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
                continue;
            }

            debug!("Claimed {} run(s)", claimed.len());
            for run in claimed {
                let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                    break;
                };
                let runtime = self.clone();
                in_flight.spawn(async move {
                    runtime.execute(run).await;
                    drop(permit);
                });
            }
        }

        if !in_flight.is_empty() {
            info!("Waiting for {} in-flight run(s) to finish", in_flight.len());
        }
        while in_flight.join_next().await.is_some() {}

        info!("Subscriber runtime stopped");
    }

    /// Claims one batch of due runs and executes them concurrently, returning
    /// once every claimed run has been settled.
    pub async fn run_once(&self) -> Result<Vec<RunOutcome>, crate::Error> {
        let claimed = self.ledger.claim_due(self.config.batch_size).await?;
        Ok(futures::future::join_all(claimed.into_iter().map(|run| self.execute(run))).await)
    }

    async fn execute(&self, run: ClaimedRun) -> RunOutcome {
        let run_id = run.run_id;
        let event_name = run.event.name();

        let Some(subscriber) = self.registry.get(&run.subscriber_id) else {
            let error = format!("unknown subscriber: {}", run.subscriber_id);
            error!("Run {run_id} for {event_name}: {error}");
            self.settle_failure(run_id, &error).await;
            return RunOutcome::Failed { error };
        };

        let steps = crate::StepContext::new(run_id, run.attempt, Arc::clone(&self.ledger));
        debug!(
            "Run {run_id}: {} handling {event_name} (attempt {}/{})",
            run.subscriber_id, run.attempt, run.max_attempts
        );

        let handled = {
            let work = subscriber.handle(&run.event, &steps);
            tokio::pin!(work);
            let period = self.config.heartbeat_interval.max(Duration::from_millis(1));
            let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    result = &mut work => break result,
                    _ = heartbeat.tick() => self.heartbeat(run_id).await,
                }
            }
        };

        match handled {
            Ok(output) => {
                if let Err(e) = self.ledger.complete(run_id, output).await {
                    error!("Run {run_id}: failed to record completion: {e}");
                }
                RunOutcome::Completed
            }
            Err(e) if run.attempt >= run.max_attempts => {
                let error = e.to_string();
                error!(
                    "Run {run_id}: {} exhausted {} attempt(s) on {event_name}: {error}",
                    run.subscriber_id, run.max_attempts
                );
                self.settle_failure(run_id, &error).await;
                RunOutcome::Failed { error }
            }
            Err(e) => {
                let delay = self.config.backoff.delay(run.attempt);
                let next_attempt_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                warn!(
                    "Run {run_id}: {} attempt {} failed, retrying in {delay:?}: {e}",
                    run.subscriber_id, run.attempt
                );
                if let Err(ledger_err) = self
                    .ledger
                    .reschedule(run_id, &e.to_string(), next_attempt_at)
                    .await
                {
                    error!("Run {run_id}: failed to reschedule: {ledger_err}");
                }
                RunOutcome::Rescheduled {
                    attempt: run.attempt,
                }
            }
        }
    }

    async fn heartbeat(&self, run_id: entity_api::Id) {
        match self.ledger.extend_lease(run_id).await {
            Ok(true) => trace!("Run {run_id}: lease extended"),
            Ok(false) => warn!("Run {run_id}: lease lost while the handler was still running"),
            Err(e) => warn!("Run {run_id}: failed to extend lease: {e}"),
        }
    }

    async fn settle_failure(&self, run_id: entity_api::Id, error: &str) {
        if let Err(e) = self.ledger.fail(run_id, error).await {
            error!("Run {run_id}: failed to record failure: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use crate::{DurableQueue, Error, StepContext, Subscriber};
    use async_trait::async_trait;
    use entity_api::run_status::RunStatus;
    use events::{EventEmitter, EventEnvelope, EventName, Id};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts executions of its first step and fails its second step until
    /// `failures_before_success` attempts have failed.
    struct Flaky {
        first_step_runs: AtomicU32,
        second_step_runs: AtomicU32,
        failures_before_success: u32,
        max_attempts: u32,
    }

    impl Flaky {
        fn new(failures_before_success: u32, max_attempts: u32) -> Self {
            Self {
                first_step_runs: AtomicU32::new(0),
                second_step_runs: AtomicU32::new(0),
                failures_before_success,
                max_attempts,
            }
        }
    }

    #[async_trait]
    impl Subscriber for Flaky {
        fn id(&self) -> &'static str {
            "flaky"
        }

        fn trigger(&self) -> EventName {
            EventName::UserInactive
        }

        fn max_attempts(&self) -> u32 {
            self.max_attempts
        }

        async fn handle(&self, _event: &EventEnvelope, steps: &StepContext) -> Result<Value, Error> {
            let loaded: u32 = steps
                .run("load", || async {
                    Ok::<_, Error>(self.first_step_runs.fetch_add(1, Ordering::SeqCst) + 1)
                })
                .await?;

            let sent: u32 = steps
                .run("send", || async {
                    let n = self.second_step_runs.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= self.failures_before_success {
                        Err(Error::handler(format!("transient failure #{n}")))
                    } else {
                        Ok(n)
                    }
                })
                .await?;

            Ok(json!({"loaded": loaded, "sent": sent}))
        }
    }

    fn runtime_with(subscriber: Arc<Flaky>) -> (Runtime, Arc<MemoryLedger>, EventEmitter) {
        let ledger = Arc::new(MemoryLedger::new());
        let registry = Arc::new(Registry::new().with_subscriber(subscriber));
        let emitter = EventEmitter::new(Arc::new(DurableQueue::new(
            ledger.clone(),
            registry.clone(),
        )));
        let runtime = Runtime::new(
            ledger.clone(),
            registry,
            RuntimeConfig {
                backoff: Backoff::immediate(),
                ..RuntimeConfig::default()
            },
        );
        (runtime, ledger, emitter)
    }

    fn inactive() -> Value {
        json!({
            "userId": Id::new_v4(),
            "orgId": Id::new_v4(),
            "lastAttemptAt": "2026-10-01T09:00:00Z",
            "daysSinceLastAttempt": 16
        })
    }

    #[tokio::test]
    async fn completed_step_is_not_re_executed_on_retry() {
        let subscriber = Arc::new(Flaky::new(1, 3));
        let (runtime, ledger, emitter) = runtime_with(subscriber.clone());
        emitter.emit_json("user.inactive", inactive()).await.unwrap();

        let first = runtime.run_once().await.unwrap();
        assert_eq!(first, vec![RunOutcome::Rescheduled { attempt: 1 }]);

        let second = runtime.run_once().await.unwrap();
        assert_eq!(second, vec![RunOutcome::Completed]);

        assert_eq!(subscriber.first_step_runs.load(Ordering::SeqCst), 1);
        assert_eq!(subscriber.second_step_runs.load(Ordering::SeqCst), 2);

        let run = &ledger.runs()[0];
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.attempt_count, 2);
        assert_eq!(run.output, Some(json!({"loaded": 1, "sent": 2})));
    }

    #[tokio::test]
    async fn exhausting_attempts_marks_the_run_failed_with_last_error() {
        let subscriber = Arc::new(Flaky::new(u32::MAX, 2));
        let (runtime, ledger, emitter) = runtime_with(subscriber);
        emitter.emit_json("user.inactive", inactive()).await.unwrap();

        runtime.run_once().await.unwrap();
        let outcome = runtime.run_once().await.unwrap();
        assert!(matches!(outcome[0], RunOutcome::Failed { .. }));

        // Nothing left to claim.
        assert!(runtime.run_once().await.unwrap().is_empty());

        let failed = ledger.failed_runs(10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempt_count, 2);
        assert!(failed[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("transient failure #2"));
    }

    #[tokio::test]
    async fn replayed_run_resumes_after_completed_steps() {
        let subscriber = Arc::new(Flaky::new(1, 1));
        let (runtime, ledger, emitter) = runtime_with(subscriber.clone());
        emitter.emit_json("user.inactive", inactive()).await.unwrap();

        runtime.run_once().await.unwrap();
        let failed = ledger.failed_runs(10).await.unwrap();
        assert_eq!(failed.len(), 1);

        let replayed = ledger.replay(failed[0].id).await.unwrap();
        assert_eq!(replayed.status, RunStatus::Pending);

        assert_eq!(runtime.run_once().await.unwrap(), vec![RunOutcome::Completed]);
        assert_eq!(subscriber.first_step_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replay_of_completed_run_is_rejected() {
        let subscriber = Arc::new(Flaky::new(0, 1));
        let (runtime, ledger, emitter) = runtime_with(subscriber);
        emitter.emit_json("user.inactive", inactive()).await.unwrap();
        runtime.run_once().await.unwrap();

        let run_id = ledger.runs()[0].id;
        let err = ledger.replay(run_id).await.unwrap_err();
        assert_eq!(err.error_kind, crate::WorkerErrorKind::NotReplayable);

        let err = ledger.replay(Id::new_v4()).await.unwrap_err();
        assert_eq!(err.error_kind, crate::WorkerErrorKind::RunNotFound);
    }

    /// Sleeps through its only step, longer than the ledger lease.
    struct Slow(Duration);

    #[async_trait]
    impl Subscriber for Slow {
        fn id(&self) -> &'static str {
            "slow"
        }

        fn trigger(&self) -> EventName {
            EventName::UserInactive
        }

        async fn handle(&self, _event: &EventEnvelope, steps: &StepContext) -> Result<Value, Error> {
            let pause = self.0;
            steps
                .run("sleep", || async move {
                    tokio::time::sleep(pause).await;
                    Ok::<_, Error>(json!({"slept_ms": pause.as_millis() as u64}))
                })
                .await
        }
    }

    #[tokio::test]
    async fn heartbeat_keeps_a_slow_run_from_being_reclaimed() {
        let ledger = Arc::new(MemoryLedger::with_lease(Duration::from_millis(40)));
        let registry =
            Arc::new(Registry::new().with_subscriber(Arc::new(Slow(Duration::from_millis(150)))));
        let emitter = EventEmitter::new(Arc::new(DurableQueue::new(
            ledger.clone(),
            registry.clone(),
        )));
        let runtime = Runtime::new(
            ledger.clone(),
            registry,
            RuntimeConfig {
                backoff: Backoff::immediate(),
                heartbeat_interval: Duration::from_millis(10),
                ..RuntimeConfig::default()
            },
        );
        emitter.emit_json("user.inactive", inactive()).await.unwrap();

        let running = tokio::spawn({
            let runtime = runtime.clone();
            async move { runtime.run_once().await }
        });

        // Well past the lease; without heartbeats the run would be claimable.
        tokio::time::sleep(Duration::from_millis(90)).await;
        assert!(ledger.claim_due(10).await.unwrap().is_empty());

        let outcomes = running.await.unwrap().unwrap();
        assert_eq!(outcomes, vec![RunOutcome::Completed]);
        let run = &ledger.runs()[0];
        assert_eq!(run.attempt_count, 1);
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn run_loop_drains_and_stops_on_shutdown() {
        let subscriber = Arc::new(Flaky::new(0, 1));
        let (runtime, ledger, emitter) = runtime_with(subscriber);
        emitter.emit_json("user.inactive", inactive()).await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(runtime.run(shutdown.clone()));

        for _ in 0..50 {
            if ledger.runs()[0].status == RunStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(ledger.runs()[0].status, RunStatus::Completed);
    }
}
