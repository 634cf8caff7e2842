use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of notification, which also selects the email template.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Deserialize, Serialize, DeriveActiveEnum, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "notification_type"
)]
pub enum NotificationType {
    #[sea_orm(string_value = "coach_recommendation")]
    CoachRecommendation,
    #[sea_orm(string_value = "daily_digest")]
    DailyDigest,
    #[sea_orm(string_value = "practice_reminder")]
    PracticeReminder,
    #[sea_orm(string_value = "weakness_update")]
    WeaknessUpdate,
    #[sea_orm(string_value = "assignment_created")]
    AssignmentCreated,
    #[sea_orm(string_value = "assignment_overdue")]
    AssignmentOverdue,
    #[sea_orm(string_value = "critical_score")]
    CriticalScore,
    #[sea_orm(string_value = "declining_trend")]
    DecliningTrend,
    #[sea_orm(string_value = "achievement")]
    Achievement,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            NotificationType::CoachRecommendation => "coach_recommendation",
            NotificationType::DailyDigest => "daily_digest",
            NotificationType::PracticeReminder => "practice_reminder",
            NotificationType::WeaknessUpdate => "weakness_update",
            NotificationType::AssignmentCreated => "assignment_created",
            NotificationType::AssignmentOverdue => "assignment_overdue",
            NotificationType::CriticalScore => "critical_score",
            NotificationType::DecliningTrend => "declining_trend",
            NotificationType::Achievement => "achievement",
        };
        write!(fmt, "{value}")
    }
}
