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
                "CREATE TYPE coaching_pipeline.delivery_status AS ENUM ('pending', 'success', 'failed')",
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.webhooks (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    org_id UUID NOT NULL REFERENCES coaching_pipeline.organizations(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    url VARCHAR(2048) NOT NULL,
                    secret VARCHAR(128) NOT NULL,
                    events TEXT[] NOT NULL DEFAULT ARRAY[]::TEXT[],
                    enabled BOOLEAN NOT NULL DEFAULT TRUE,
                    retry_attempts INTEGER NOT NULL DEFAULT 3 CHECK (retry_attempts >= 0),
                    timeout_seconds INTEGER NOT NULL DEFAULT 30 CHECK (timeout_seconds > 0),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                // Subscription lookups filter on the events array
                r#"
                CREATE INDEX IF NOT EXISTS idx_webhooks_events
                    ON coaching_pipeline.webhooks USING GIN (events)
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.webhook_deliveries (
                    id UUID PRIMARY KEY,
                    webhook_id UUID NOT NULL REFERENCES coaching_pipeline.webhooks(id) ON DELETE CASCADE,
                    event_type VARCHAR(64) NOT NULL,
                    payload JSONB NOT NULL,
                    attempt_count INTEGER NOT NULL DEFAULT 1,
                    status coaching_pipeline.delivery_status NOT NULL DEFAULT 'pending',
                    response_status INTEGER,
                    response_body TEXT,
                    error_message TEXT,
                    delivered_at TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE INDEX IF NOT EXISTS idx_webhook_deliveries_webhook_created
                    ON coaching_pipeline.webhook_deliveries(webhook_id, created_at DESC)
                "#,
            ],
        )
        .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        execute_all(
            manager,
            &[
                "DROP TABLE IF EXISTS coaching_pipeline.webhook_deliveries",
                "DROP TABLE IF EXISTS coaching_pipeline.webhooks",
                "DROP TYPE IF EXISTS coaching_pipeline.delivery_status",
            ],
        )
        .await
    }
}
