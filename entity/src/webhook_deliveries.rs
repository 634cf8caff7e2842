//! SeaORM Entity for webhook_deliveries table.
//! Every outbound webhook attempt is recorded here before the HTTP call is made.

use crate::delivery_status::DeliveryStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response bodies are truncated to this many characters before storage.
pub const MAX_RESPONSE_BODY_CHARS: usize = 5000;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::webhook_deliveries::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "webhook_deliveries")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,

    #[schema(value_type = Uuid)]
    pub webhook_id: Id,

    pub event_type: String,

    /// The exact JSON body that was (or will be) signed and sent
    pub payload: Json,

    pub attempt_count: i32,

    pub status: DeliveryStatus,

    pub response_status: Option<i32>,

    #[sea_orm(column_type = "Text")]
    pub response_body: Option<String>,

    pub error_message: Option<String>,

    /// Set only when the endpoint answered 2xx
    #[schema(value_type = Option<String>, format = DateTime)]
    pub delivered_at: Option<DateTimeWithTimeZone>,

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
        belongs_to = "super::webhooks::Entity",
        from = "Column::WebhookId",
        to = "super::webhooks::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Webhooks,
}

impl Related<super::webhooks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Webhooks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
