use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status of one subscriber run for one event.
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "run_status")]
pub enum RunStatus {
    /// Waiting for `next_attempt_at`
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    /// Claimed by a worker, leased until `locked_until`
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Exhausted its attempts; kept for inspection and replay
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(fmt, "pending"),
            RunStatus::Running => write!(fmt, "running"),
            RunStatus::Completed => write!(fmt, "completed"),
            RunStatus::Failed => write!(fmt, "failed"),
        }
    }
}
