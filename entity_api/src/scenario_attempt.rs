//! Read contracts over trainee attempts. Attempts are written by the scoring
//! collaborator, never by the pipeline.

use super::error::Error;
use chrono::{DateTime, Utc};
use entity::scenario_attempts::{Column, Entity, Model, STATUS_COMPLETED};
use entity::Id;
use sea_orm::{
    entity::prelude::*, sea_query::Expr, ConnectionTrait, FromQueryResult, QueryOrder,
    QuerySelect,
};
use std::collections::HashMap;

fn completed_and_scored(org_id: Id, user_id: Id) -> sea_orm::Select<Entity> {
    Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::Status.eq(STATUS_COMPLETED))
        .filter(Column::Score.is_not_null())
}

/// Scores of the user's most recent completed, scored attempts in the org,
/// newest first, leaving out `exclude_attempt_id`.
pub async fn recent_scores(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
    exclude_attempt_id: Id,
    limit: u64,
) -> Result<Vec<f64>, Error> {
    let attempts = completed_and_scored(org_id, user_id)
        .filter(Column::Id.ne(exclude_attempt_id))
        .order_by_desc(Column::StartedAt)
        .limit(limit)
        .all(db)
        .await?;

    Ok(attempts.into_iter().filter_map(|a| a.score).collect())
}

/// Live count of the user's completed, scored attempts in the org.
pub async fn count_completed_scored(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
) -> Result<u64, Error> {
    Ok(completed_and_scored(org_id, user_id).count(db).await?)
}

#[derive(Debug, FromQueryResult)]
struct ScenarioCount {
    scenario_id: Id,
    attempts: i64,
}

/// Attempts per scenario started by the user in the org since `since`.
pub async fn counts_by_scenario_since(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
    since: DateTime<Utc>,
) -> Result<HashMap<Id, u32>, Error> {
    let rows = Entity::find()
        .select_only()
        .column(Column::ScenarioId)
        .column_as(Expr::col(Column::Id).count(), "attempts")
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::StartedAt.gte(since))
        .group_by(Column::ScenarioId)
        .into_model::<ScenarioCount>()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.scenario_id,
                u32::try_from(row.attempts).unwrap_or(u32::MAX),
            )
        })
        .collect())
}

/// The user's most recent attempts on one scenario in the org, newest first.
pub async fn recent_for_scenario(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
    scenario_id: Id,
    limit: u64,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::ScenarioId.eq(scenario_id))
        .order_by_desc(Column::StartedAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// Latest completed attempt of one trainee in one org.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct LastCompleted {
    pub org_id: Id,
    pub user_id: Id,
    pub last_attempt_at: DateTimeWithTimeZone,
}

/// One row per (org, user) that has ever completed an attempt.
pub async fn last_completed_per_user(
    db: &impl ConnectionTrait,
) -> Result<Vec<LastCompleted>, Error> {
    Ok(Entity::find()
        .select_only()
        .column(Column::OrgId)
        .column(Column::UserId)
        .column_as(Expr::col(Column::StartedAt).max(), "last_attempt_at")
        .filter(Column::Status.eq(STATUS_COMPLETED))
        .group_by(Column::OrgId)
        .group_by(Column::UserId)
        .into_model::<LastCompleted>()
        .all(db)
        .await?)
}

#[derive(Debug, FromQueryResult)]
struct OrgUser {
    org_id: Id,
    user_id: Id,
}

/// Distinct (org, user) pairs with a completed attempt started at or after `since`.
pub async fn active_since(
    db: &impl ConnectionTrait,
    since: DateTime<Utc>,
) -> Result<Vec<(Id, Id)>, Error> {
    let rows = Entity::find()
        .select_only()
        .column(Column::OrgId)
        .column(Column::UserId)
        .filter(Column::Status.eq(STATUS_COMPLETED))
        .filter(Column::StartedAt.gte(since))
        .distinct()
        .into_model::<OrgUser>()
        .all(db)
        .await?;

    Ok(rows.into_iter().map(|row| (row.org_id, row.user_id)).collect())
}

/// The user's completed attempts in the org started at or after `since`, newest first.
pub async fn completed_since(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
    since: DateTime<Utc>,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::Status.eq(STATUS_COMPLETED))
        .filter(Column::StartedAt.gte(since))
        .order_by_desc(Column::StartedAt)
        .all(db)
        .await?)
}
