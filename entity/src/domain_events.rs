//! Durable event queue. Rows are immutable once written.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::domain_events::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "domain_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[schema(value_type = Uuid)]
    pub id: Id,
    pub name: String,
    /// Validated payload, camelCase fields
    pub payload: Json,
    #[schema(value_type = String, format = DateTime)]
    pub emitted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscriber_runs::Entity")]
    SubscriberRuns,
}

impl Related<super::subscriber_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubscriberRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
