//! Aggregated performance memory per trainee, maintained outside the pipeline.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MEMORY_TYPE_WEAKNESS: &str = "weakness";
pub const MEMORY_TYPE_STRENGTH: &str = "strength";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::user_memories::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "user_memories")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[schema(value_type = Uuid)]
    pub id: Id,
    #[schema(value_type = Uuid)]
    pub org_id: Id,
    #[schema(value_type = Uuid)]
    pub user_id: Id,
    pub memory_type: String,
    pub key: String,
    pub score: Option<f64>,
    /// declining | stable | new | improving
    pub trend: Option<String>,
    pub evidence_count: i32,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
