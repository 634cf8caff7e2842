//! Practice scenarios. A scenario with no `org_id` is universal.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const STATUS_ACTIVE: &str = "active";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::scenarios::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "scenarios")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    #[schema(value_type = Option<Uuid>)]
    pub org_id: Option<Id>,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: Option<String>,
    /// easy | medium | hard
    pub difficulty: Option<String>,
    /// Grading rubric; see `domain::coach::rubric`
    pub rubric: Option<Json>,
    pub status: String,
    pub visibility: String,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::scenario_attempts::Entity")]
    ScenarioAttempts,
}

impl Related<super::scenario_attempts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScenarioAttempts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
