//! SeaORM Entity for subscriber_runs table.
//! One row per (event, subscriber) pair; the retry ledger of the worker runtime.

use crate::run_status::RunStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::subscriber_runs::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "subscriber_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[schema(value_type = Uuid)]
    pub id: Id,

    #[schema(value_type = Uuid)]
    pub event_id: Id,

    /// Stable id of the subscriber, e.g. "manager-alerts"
    pub subscriber_id: String,

    pub status: RunStatus,

    /// Attempts started so far
    pub attempt_count: i32,

    pub max_attempts: i32,

    #[sea_orm(column_type = "Text")]
    pub last_error: Option<String>,

    /// Handler result of the completed run
    pub output: Option<Json>,

    #[schema(value_type = String, format = DateTime)]
    pub next_attempt_at: DateTimeWithTimeZone,

    /// Lease held by the worker that claimed the run
    #[schema(value_type = Option<String>, format = DateTime)]
    pub locked_until: Option<DateTimeWithTimeZone>,

    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,

    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::domain_events::Entity",
        from = "Column::EventId",
        to = "super::domain_events::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    DomainEvents,
    #[sea_orm(has_many = "super::step_checkpoints::Entity")]
    StepCheckpoints,
}

impl Related<super::domain_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DomainEvents.def()
    }
}

impl Related<super::step_checkpoints::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StepCheckpoints.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
