//! In-process ledger for tests and single-node local runs. Nothing survives a restart.

use crate::error::{Error, WorkerErrorKind};
use crate::ledger::{ClaimedRun, NewRun, RunLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use entity_api::run_status::RunStatus;
use entity_api::{subscriber_runs, Id};
use events::EventEnvelope;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_LEASE: Duration = Duration::from_secs(300);

pub struct MemoryLedger {
    events: DashMap<Id, EventEnvelope>,
    runs: DashMap<Id, subscriber_runs::Model>,
    checkpoints: DashMap<(Id, String), Value>,
    lease: Duration,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::with_lease(DEFAULT_LEASE)
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger whose claimed runs become claimable again after `lease`
    /// unless the lease is extended.
    pub fn with_lease(lease: Duration) -> Self {
        Self {
            events: DashMap::new(),
            runs: DashMap::new(),
            checkpoints: DashMap::new(),
            lease,
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn lease_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::from_std(self.lease).unwrap_or(chrono::Duration::minutes(5))
    }

    /// Snapshot of every run, oldest first.
    pub fn runs(&self) -> Vec<subscriber_runs::Model> {
        let mut runs: Vec<_> = self.runs.iter().map(|entry| entry.value().clone()).collect();
        runs.sort_by_key(|run| run.created_at);
        runs
    }

    pub fn runs_for_event(&self, event_id: Id) -> Vec<subscriber_runs::Model> {
        self.runs()
            .into_iter()
            .filter(|run| run.event_id == event_id)
            .collect()
    }

    pub fn checkpoint_count(&self, run_id: Id) -> usize {
        self.checkpoints
            .iter()
            .filter(|entry| entry.key().0 == run_id)
            .count()
    }

    fn update<F>(&self, run_id: Id, apply: F) -> Result<subscriber_runs::Model, Error>
    where
        F: FnOnce(&mut subscriber_runs::Model),
    {
        let mut run = self.runs.get_mut(&run_id).ok_or_else(|| Error {
            source: None,
            error_kind: WorkerErrorKind::Ledger,
        })?;
        apply(&mut run);
        run.updated_at = Utc::now().into();
        Ok(run.clone())
    }
}

#[async_trait]
impl RunLedger for MemoryLedger {
    async fn enqueue(&self, event: &EventEnvelope, runs: &[NewRun]) -> Result<(), Error> {
        self.events.entry(event.id).or_insert_with(|| event.clone());

        for new_run in runs {
            let exists = self.runs.iter().any(|entry| {
                entry.event_id == event.id && entry.subscriber_id == new_run.subscriber_id
            });
            if exists {
                continue;
            }

            let now = Utc::now();
            let id = Id::new_v4();
            self.runs.insert(
                id,
                subscriber_runs::Model {
                    id,
                    event_id: event.id,
                    subscriber_id: new_run.subscriber_id.clone(),
                    status: RunStatus::Pending,
                    attempt_count: 0,
                    max_attempts: new_run.max_attempts,
                    last_error: None,
                    output: None,
                    next_attempt_at: now.into(),
                    locked_until: None,
                    created_at: now.into(),
                    updated_at: now.into(),
                },
            );
        }
        Ok(())
    }

    async fn claim_due(&self, limit: u64) -> Result<Vec<ClaimedRun>, Error> {
        let now = Utc::now();
        let claimable = |run: &subscriber_runs::Model| match run.status {
            RunStatus::Pending => run.next_attempt_at <= now,
            RunStatus::Running => run.locked_until.is_some_and(|until| until < now),
            _ => false,
        };

        let due: Vec<Id> = self
            .runs()
            .into_iter()
            .filter(|run| claimable(run))
            .map(|run| run.id)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();

        let mut claimed = Vec::with_capacity(due.len());
        for run_id in due {
            let Some(mut run) = self.runs.get_mut(&run_id) else {
                continue;
            };
            // Re-check under the shard lock; another caller may have claimed it.
            if !claimable(&run) {
                continue;
            }
            run.status = RunStatus::Running;
            run.attempt_count += 1;
            run.locked_until = Some(self.lease_end(now).into());
            run.updated_at = now.into();
            let (subscriber_id, attempt, max_attempts, event_id) = (
                run.subscriber_id.clone(),
                run.attempt_count,
                run.max_attempts,
                run.event_id,
            );
            drop(run);

            if let Some(event) = self.events.get(&event_id) {
                claimed.push(ClaimedRun {
                    run_id,
                    subscriber_id,
                    attempt: u32::try_from(attempt).unwrap_or(u32::MAX),
                    max_attempts: u32::try_from(max_attempts).unwrap_or(1),
                    event: event.clone(),
                });
            }
        }

        Ok(claimed)
    }

    async fn extend_lease(&self, run_id: Id) -> Result<bool, Error> {
        let Some(mut run) = self.runs.get_mut(&run_id) else {
            return Ok(false);
        };
        if run.status != RunStatus::Running {
            return Ok(false);
        }
        let now = Utc::now();
        run.locked_until = Some(self.lease_end(now).into());
        run.updated_at = now.into();
        Ok(true)
    }

    async fn complete(&self, run_id: Id, output: Value) -> Result<(), Error> {
        self.update(run_id, |run| {
            run.status = RunStatus::Completed;
            run.output = Some(output);
            run.last_error = None;
            run.locked_until = None;
        })?;
        Ok(())
    }

    async fn reschedule(
        &self,
        run_id: Id,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.update(run_id, |run| {
            run.status = RunStatus::Pending;
            run.last_error = Some(error.to_string());
            run.next_attempt_at = next_attempt_at.into();
            run.locked_until = None;
        })?;
        Ok(())
    }

    async fn fail(&self, run_id: Id, error: &str) -> Result<(), Error> {
        self.update(run_id, |run| {
            run.status = RunStatus::Failed;
            run.last_error = Some(error.to_string());
            run.locked_until = None;
        })?;
        Ok(())
    }

    async fn load_checkpoint(&self, run_id: Id, step: &str) -> Result<Option<Value>, Error> {
        Ok(self
            .checkpoints
            .get(&(run_id, step.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn save_checkpoint(&self, run_id: Id, step: &str, output: Value) -> Result<(), Error> {
        self.checkpoints
            .entry((run_id, step.to_string()))
            .or_insert(output);
        Ok(())
    }

    async fn failed_runs(&self, limit: u64) -> Result<Vec<subscriber_runs::Model>, Error> {
        let mut failed: Vec<_> = self
            .runs()
            .into_iter()
            .filter(|run| run.status == RunStatus::Failed)
            .collect();
        failed.sort_by_key(|run| std::cmp::Reverse(run.updated_at));
        failed.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(failed)
    }

    async fn replay(&self, run_id: Id) -> Result<subscriber_runs::Model, Error> {
        let status = self
            .runs
            .get(&run_id)
            .map(|run| run.status)
            .ok_or_else(|| Error {
                source: None,
                error_kind: WorkerErrorKind::RunNotFound,
            })?;

        if status != RunStatus::Failed {
            return Err(Error {
                source: None,
                error_kind: WorkerErrorKind::NotReplayable,
            });
        }

        self.update(run_id, |run| {
            run.status = RunStatus::Pending;
            run.attempt_count = 0;
            run.next_attempt_at = Utc::now().into();
            run.locked_until = None;
        })
    }
}
