//! SeaORM Entity for org-configured outbound webhooks.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_RETRY_ATTEMPTS: i32 = 3;
pub const DEFAULT_TIMEOUT_SECONDS: i32 = 30;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::webhooks::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "webhooks")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    #[schema(value_type = Uuid)]
    pub org_id: Id,
    pub name: String,
    pub url: String,
    /// Signing secret; never serialized to API clients
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub secret: String,
    /// Webhook event types this endpoint subscribes to
    pub events: Vec<String>,
    pub enabled: bool,
    pub retry_attempts: i32,
    pub timeout_seconds: i32,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organizations::Entity",
        from = "Column::OrgId",
        to = "super::organizations::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Organizations,
    #[sea_orm(has_many = "super::webhook_deliveries::Entity")]
    WebhookDeliveries,
}

impl Related<super::organizations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organizations.def()
    }
}

impl Related<super::webhook_deliveries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WebhookDeliveries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
