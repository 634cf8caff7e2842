use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const STATUS_COMPLETED: &str = "completed";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::scenario_attempts::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "scenario_attempts")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    #[schema(value_type = Uuid)]
    pub org_id: Id,
    #[schema(value_type = Uuid)]
    pub user_id: Id,
    #[schema(value_type = Uuid)]
    pub scenario_id: Id,
    pub status: String,
    /// Overall score, 0..=100
    pub score: Option<f64>,
    #[schema(value_type = String, format = DateTime)]
    pub started_at: DateTimeWithTimeZone,
    pub duration_seconds: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scenarios::Entity",
        from = "Column::ScenarioId",
        to = "super::scenarios::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Scenarios,
}

impl Related<super::scenarios::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scenarios.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
