use crate::execute_all;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        execute_all(
            manager,
            &[
                r#"
                CREATE TYPE coaching_pipeline.notification_type AS ENUM (
                    'coach_recommendation',
                    'daily_digest',
                    'practice_reminder',
                    'weakness_update',
                    'assignment_created',
                    'assignment_overdue',
                    'critical_score',
                    'declining_trend',
                    'achievement'
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.notifications (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    org_id UUID NOT NULL REFERENCES coaching_pipeline.organizations(id) ON DELETE CASCADE,
                    user_id UUID NOT NULL REFERENCES coaching_pipeline.users(id) ON DELETE CASCADE,
                    notification_type coaching_pipeline.notification_type NOT NULL,
                    title VARCHAR(255) NOT NULL,
                    body TEXT NOT NULL,
                    action_url VARCHAR(2048),
                    agent_id VARCHAR(64),
                    read BOOLEAN NOT NULL DEFAULT FALSE,
                    channels_sent TEXT[] NOT NULL DEFAULT ARRAY['in_app']::TEXT[],
                    metadata JSONB,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                // Serves both the full list and the unread-only list of a user
                r#"
                CREATE INDEX IF NOT EXISTS idx_notifications_user_read_created
                    ON coaching_pipeline.notifications(org_id, user_id, read, created_at DESC)
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.notification_preferences (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    org_id UUID NOT NULL REFERENCES coaching_pipeline.organizations(id) ON DELETE CASCADE,
                    user_id UUID NOT NULL REFERENCES coaching_pipeline.users(id) ON DELETE CASCADE,
                    channel_email BOOLEAN NOT NULL DEFAULT TRUE,
                    channel_in_app BOOLEAN NOT NULL DEFAULT TRUE,
                    quiet_hours_start VARCHAR(5),
                    quiet_hours_end VARCHAR(5),
                    quiet_hours_timezone VARCHAR(64) NOT NULL DEFAULT 'UTC',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE(org_id, user_id)
                )
                "#,
            ],
        )
        .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        execute_all(
            manager,
            &[
                "DROP TABLE IF EXISTS coaching_pipeline.notification_preferences",
                "DROP TABLE IF EXISTS coaching_pipeline.notifications",
                "DROP TYPE IF EXISTS coaching_pipeline.notification_type",
            ],
        )
        .await
    }
}
