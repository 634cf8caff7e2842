use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a single webhook delivery row.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    EnumIter,
    Deserialize,
    Default,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "delivery_status")]
pub enum DeliveryStatus {
    /// Row written, HTTP call not yet finished
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    /// Endpoint answered with a 2xx
    #[sea_orm(string_value = "success")]
    Success,
    /// Non-2xx answer, timeout or network failure
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(fmt, "pending"),
            DeliveryStatus::Success => write!(fmt, "success"),
            DeliveryStatus::Failed => write!(fmt, "failed"),
        }
    }
}
