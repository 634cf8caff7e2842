//! Persistence of runs and step checkpoints.

use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity_api::{domain_event, step_checkpoint, subscriber_run, subscriber_runs, Id};
use events::{DomainEvent, EventEnvelope};
use log::*;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub use entity_api::subscriber_run::NewRun;

/// A run leased to this worker, with its event decoded.
#[derive(Debug, Clone)]
pub struct ClaimedRun {
    pub run_id: Id,
    pub subscriber_id: String,
    /// 1-based attempt number of this execution
    pub attempt: u32,
    pub max_attempts: u32,
    pub event: EventEnvelope,
}

/// Storage behind the runtime.
///
/// Implementations must make `claim_due` exclusive: a run is handed to at most
/// one caller until it is completed, rescheduled, failed or its lease expires.
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Stores the event and schedules `runs` for it, atomically.
    async fn enqueue(&self, event: &EventEnvelope, runs: &[NewRun]) -> Result<(), Error>;

    async fn claim_due(&self, limit: u64) -> Result<Vec<ClaimedRun>, Error>;

    /// Pushes a running run's lease forward. `false` means the run is no
    /// longer running under this lease.
    async fn extend_lease(&self, run_id: Id) -> Result<bool, Error>;

    async fn complete(&self, run_id: Id, output: Value) -> Result<(), Error>;

    async fn reschedule(
        &self,
        run_id: Id,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    async fn fail(&self, run_id: Id, error: &str) -> Result<(), Error>;

    async fn load_checkpoint(&self, run_id: Id, step: &str) -> Result<Option<Value>, Error>;

    async fn save_checkpoint(&self, run_id: Id, step: &str, output: Value) -> Result<(), Error>;

    async fn failed_runs(&self, limit: u64) -> Result<Vec<subscriber_runs::Model>, Error>;

    async fn replay(&self, run_id: Id) -> Result<subscriber_runs::Model, Error>;
}

/// Ledger over the `domain_events`, `subscriber_runs` and `step_checkpoints` tables.
pub struct PostgresLedger {
    db: Arc<DatabaseConnection>,
    lease: Duration,
}

impl PostgresLedger {
    pub fn new(db: Arc<DatabaseConnection>, lease: Duration) -> Self {
        Self { db, lease }
    }

    fn lease(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.lease).unwrap_or(chrono::Duration::minutes(5))
    }
}

#[async_trait]
impl RunLedger for PostgresLedger {
    async fn enqueue(&self, event: &EventEnvelope, runs: &[NewRun]) -> Result<(), Error> {
        let txn = self.db.begin().await.map_err(entity_api::error::Error::from)?;

        domain_event::create(
            &txn,
            event.id,
            event.name().as_str(),
            event.event.data(),
            event.emitted_at,
        )
        .await?;
        subscriber_run::create_pending(&txn, event.id, runs).await?;

        txn.commit().await.map_err(entity_api::error::Error::from)?;
        Ok(())
    }

    async fn claim_due(&self, limit: u64) -> Result<Vec<ClaimedRun>, Error> {
        let runs =
            subscriber_run::claim_due(self.db.as_ref(), Utc::now(), self.lease(), limit).await?;

        let mut claimed = Vec::with_capacity(runs.len());
        for run in runs {
            let stored = domain_event::find_by_id(self.db.as_ref(), run.event_id).await?;

            match DomainEvent::from_parts(&stored.name, stored.payload) {
                Ok(event) => claimed.push(ClaimedRun {
                    run_id: run.id,
                    subscriber_id: run.subscriber_id,
                    attempt: u32::try_from(run.attempt_count).unwrap_or(u32::MAX),
                    max_attempts: u32::try_from(run.max_attempts).unwrap_or(1),
                    event: EventEnvelope {
                        id: stored.id,
                        event,
                        emitted_at: stored.emitted_at.with_timezone(&Utc),
                    },
                }),
                Err(err) => {
                    error!("Run {} references undecodable event {}: {err}", run.id, stored.id);
                    subscriber_run::fail(self.db.as_ref(), run.id, &err.to_string()).await?;
                }
            }
        }

        Ok(claimed)
    }

    async fn extend_lease(&self, run_id: Id) -> Result<bool, Error> {
        let locked_until = Utc::now() + self.lease();
        Ok(subscriber_run::extend_lease(self.db.as_ref(), run_id, locked_until).await?)
    }

    async fn complete(&self, run_id: Id, output: Value) -> Result<(), Error> {
        subscriber_run::complete(self.db.as_ref(), run_id, output).await?;
        Ok(())
    }

    async fn reschedule(
        &self,
        run_id: Id,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        subscriber_run::reschedule(self.db.as_ref(), run_id, error, next_attempt_at).await?;
        Ok(())
    }

    async fn fail(&self, run_id: Id, error: &str) -> Result<(), Error> {
        subscriber_run::fail(self.db.as_ref(), run_id, error).await?;
        Ok(())
    }

    async fn load_checkpoint(&self, run_id: Id, step: &str) -> Result<Option<Value>, Error> {
        Ok(step_checkpoint::find(self.db.as_ref(), run_id, step).await?)
    }

    async fn save_checkpoint(&self, run_id: Id, step: &str, output: Value) -> Result<(), Error> {
        step_checkpoint::save(self.db.as_ref(), run_id, step, output).await?;
        Ok(())
    }

    async fn failed_runs(&self, limit: u64) -> Result<Vec<subscriber_runs::Model>, Error> {
        Ok(subscriber_run::find_failed(self.db.as_ref(), limit).await?)
    }

    async fn replay(&self, run_id: Id) -> Result<subscriber_runs::Model, Error> {
        Ok(subscriber_run::replay(self.db.as_ref(), run_id).await?)
    }
}
