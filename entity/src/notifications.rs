//! SeaORM Entity for the notifications table.
//! One row per dispatch; the durable in-app record of a notification.

use crate::notification_type::NotificationType;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const CHANNEL_IN_APP: &str = "in_app";
pub const CHANNEL_EMAIL: &str = "email";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::notifications::Model)]
#[sea_orm(schema_name = "coaching_pipeline", table_name = "notifications")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    #[schema(value_type = Uuid)]
    pub org_id: Id,
    #[schema(value_type = Uuid)]
    pub user_id: Id,
    pub notification_type: NotificationType,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub action_url: Option<String>,
    /// Which agent produced the notification, if any
    pub agent_id: Option<String>,
    pub read: bool,
    /// Channels the notification actually went out on
    pub channels_sent: Vec<String>,
    pub metadata: Option<Json>,
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
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
