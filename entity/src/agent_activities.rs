use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Audit trail of what the coaching agents did and why.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::agent_activities::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "agent_activities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[schema(value_type = Uuid)]
    pub id: Id,
    #[schema(value_type = Uuid)]
    pub org_id: Id,
    #[schema(value_type = Option<Uuid>)]
    pub user_id: Option<Id>,
    pub agent_id: String,
    pub event_type: String,
    pub action: String,
    pub details: Option<Json>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
