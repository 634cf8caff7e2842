use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Memoized output of a completed step, keyed by (run_id, step_name).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "step_checkpoints")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,
    pub run_id: Id,
    pub step_name: String,
    pub output: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::subscriber_runs::Entity",
        from = "Column::RunId",
        to = "super::subscriber_runs::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SubscriberRuns,
}

impl Related<super::subscriber_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubscriberRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
