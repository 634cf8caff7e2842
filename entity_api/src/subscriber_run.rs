//! The retry ledger behind the worker runtime.
//!
//! A run is claimed by moving it to `running` with a lease (`locked_until`).
//! A run whose lease expired without completing is claimable again, which is
//! how a crashed worker's runs are recovered.

use super::error::{EntityApiErrorKind, Error};
use chrono::{DateTime, Duration, Utc};
use entity::run_status::RunStatus;
use entity::subscriber_runs::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    sea_query::{Expr, LockBehavior, LockType, OnConflict},
    ActiveValue::Set,
    Condition, ConnectionTrait, QueryOrder, QuerySelect, TransactionTrait,
};

/// A subscriber that must run once for an event.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub subscriber_id: String,
    pub max_attempts: i32,
}

/// Schedules one `pending` run per subscriber. Re-scheduling the same
/// (event, subscriber) pair is a no-op.
pub async fn create_pending(
    db: &impl ConnectionTrait,
    event_id: Id,
    runs: &[NewRun],
) -> Result<u64, Error> {
    if runs.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let models = runs.iter().map(|run| ActiveModel {
        id: Set(Id::new_v4()),
        event_id: Set(event_id),
        subscriber_id: Set(run.subscriber_id.clone()),
        status: Set(RunStatus::Pending),
        attempt_count: Set(0),
        max_attempts: Set(run.max_attempts),
        last_error: Set(None),
        output: Set(None),
        next_attempt_at: Set(now.into()),
        locked_until: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    });

    let inserted = Entity::insert_many(models)
        .on_conflict(
            OnConflict::columns([Column::EventId, Column::SubscriberId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    debug!("Scheduled {inserted} run(s) for event {event_id}");
    Ok(inserted)
}

/// Leases up to `limit` due runs, incrementing their attempt count.
///
/// Rows are selected `FOR UPDATE SKIP LOCKED`, so concurrent workers never
/// claim the same run.
pub async fn claim_due<C>(
    db: &C,
    now: DateTime<Utc>,
    lease: Duration,
    limit: u64,
) -> Result<Vec<Model>, Error>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let due = Entity::find()
        .filter(
            Condition::any()
                .add(
                    Condition::all()
                        .add(Column::Status.eq(RunStatus::Pending))
                        .add(Column::NextAttemptAt.lte(now)),
                )
                .add(
                    Condition::all()
                        .add(Column::Status.eq(RunStatus::Running))
                        .add(Column::LockedUntil.lt(now)),
                ),
        )
        .order_by_asc(Column::NextAttemptAt)
        .limit(limit)
        .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
        .all(&txn)
        .await?;

    let mut claimed = Vec::with_capacity(due.len());
    for run in due {
        let attempt_count = run.attempt_count + 1;
        let mut active_model: ActiveModel = run.into();
        active_model.status = Set(RunStatus::Running);
        active_model.attempt_count = Set(attempt_count);
        active_model.locked_until = Set(Some((now + lease).into()));
        active_model.updated_at = Set(now.into());
        claimed.push(active_model.update(&txn).await?);
    }

    txn.commit().await?;
    Ok(claimed)
}

/// Pushes the lease of a running run out to `locked_until`.
///
/// Returns false when the run is no longer `running`, i.e. it was settled or
/// reclaimed by someone else.
pub async fn extend_lease(
    db: &impl ConnectionTrait,
    id: Id,
    locked_until: DateTime<Utc>,
) -> Result<bool, Error> {
    let result = Entity::update_many()
        .col_expr(
            Column::LockedUntil,
            Expr::value(DateTimeWithTimeZone::from(locked_until)),
        )
        .col_expr(
            Column::UpdatedAt,
            Expr::value(DateTimeWithTimeZone::from(Utc::now())),
        )
        .filter(Column::Id.eq(id))
        .filter(Column::Status.eq(RunStatus::Running))
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

pub async fn complete(
    db: &impl ConnectionTrait,
    id: Id,
    output: Json,
) -> Result<Model, Error> {
    let mut active_model: ActiveModel = find_by_id(db, id).await?.into();
    active_model.status = Set(RunStatus::Completed);
    active_model.output = Set(Some(output));
    active_model.last_error = Set(None);
    active_model.locked_until = Set(None);
    active_model.updated_at = Set(Utc::now().into());

    Ok(active_model.update(db).await?)
}

/// Returns a failed attempt to `pending`, due again at `next_attempt_at`.
pub async fn reschedule(
    db: &impl ConnectionTrait,
    id: Id,
    error: &str,
    next_attempt_at: DateTime<Utc>,
) -> Result<Model, Error> {
    let mut active_model: ActiveModel = find_by_id(db, id).await?.into();
    active_model.status = Set(RunStatus::Pending);
    active_model.last_error = Set(Some(error.to_string()));
    active_model.next_attempt_at = Set(next_attempt_at.into());
    active_model.locked_until = Set(None);
    active_model.updated_at = Set(Utc::now().into());

    Ok(active_model.update(db).await?)
}

/// Terminal failure: the run keeps its last error for inspection.
pub async fn fail(db: &impl ConnectionTrait, id: Id, error: &str) -> Result<Model, Error> {
    let mut active_model: ActiveModel = find_by_id(db, id).await?.into();
    active_model.status = Set(RunStatus::Failed);
    active_model.last_error = Set(Some(error.to_string()));
    active_model.locked_until = Set(None);
    active_model.updated_at = Set(Utc::now().into());

    Ok(active_model.update(db).await?)
}

/// Most recently failed first.
pub async fn find_failed(db: &impl ConnectionTrait, limit: u64) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::Status.eq(RunStatus::Failed))
        .order_by_desc(Column::UpdatedAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// Puts a failed run back in the queue with a fresh attempt budget.
/// Completed checkpoints are kept, so the replay resumes after the last
/// successful step.
pub async fn replay(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    let run = find_by_id(db, id).await?;

    if run.status != RunStatus::Failed {
        warn!("Refusing to replay run {id} in status {}", run.status);
        return Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotUpdated,
        });
    }

    let now = Utc::now();
    let mut active_model: ActiveModel = run.into();
    active_model.status = Set(RunStatus::Pending);
    active_model.attempt_count = Set(0);
    active_model.next_attempt_at = Set(now.into());
    active_model.locked_until = Set(None);
    active_model.updated_at = Set(now.into());

    Ok(active_model.update(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn run(status: RunStatus) -> Model {
        let now = Utc::now();
        Model {
            id: Id::new_v4(),
            event_id: Id::new_v4(),
            subscriber_id: "manager-alerts".to_string(),
            status,
            attempt_count: 3,
            max_attempts: 3,
            last_error: Some("boom".to_string()),
            output: None,
            next_attempt_at: now.into(),
            locked_until: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn replay_rejects_runs_that_have_not_failed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![run(RunStatus::Completed)]])
            .into_connection();

        let err = replay(&db, Id::new_v4()).await.unwrap_err();
        assert_eq!(err.error_kind, EntityApiErrorKind::RecordNotUpdated);
    }

    #[tokio::test]
    async fn replay_resets_a_failed_run_to_pending() -> Result<(), Error> {
        let failed = run(RunStatus::Failed);
        let mut pending = failed.clone();
        pending.status = RunStatus::Pending;
        pending.attempt_count = 0;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![failed.clone()], vec![pending]])
            .into_connection();

        let replayed = replay(&db, failed.id).await?;
        assert_eq!(replayed.status, RunStatus::Pending);
        assert_eq!(replayed.attempt_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn extend_lease_reports_a_lost_run() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let until = Utc::now() + Duration::seconds(300);
        assert!(extend_lease(&db, Id::new_v4(), until).await?);
        assert!(!extend_lease(&db, Id::new_v4(), until).await?);
        Ok(())
    }

    #[tokio::test]
    async fn claim_due_selects_with_skip_locked() -> Result<(), Error> {
        let pending = run(RunStatus::Pending);
        let mut running = pending.clone();
        running.status = RunStatus::Running;
        running.attempt_count = pending.attempt_count + 1;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![pending], vec![running]])
            .into_connection();

        let claimed = claim_due(&db, Utc::now(), Duration::seconds(300), 10).await?;
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].status, RunStatus::Running);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("SKIP LOCKED"));
        Ok(())
    }
}
