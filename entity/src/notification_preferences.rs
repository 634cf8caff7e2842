//! Per-user delivery preferences. Owned by the user; the pipeline only reads them.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::notification_preferences::Model)]
#[sea_orm(
    schema_name = "coaching_pipeline",
    table_name = "notification_preferences"
)]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    #[schema(value_type = Uuid)]
    pub org_id: Id,
    #[schema(value_type = Uuid)]
    pub user_id: Id,
    pub channel_email: bool,
    pub channel_in_app: bool,
    /// Local time of day, "HH:MM"
    pub quiet_hours_start: Option<String>,
    /// Local time of day, "HH:MM"
    pub quiet_hours_end: Option<String>,
    /// IANA time zone name
    pub quiet_hours_timezone: String,
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
