use crate::execute_all;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Durable event log, one run row per (event, subscriber) and the step
// checkpoints that let a retried run skip work it already finished.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        execute_all(
            manager,
            &[
                "CREATE TYPE coaching_pipeline.run_status AS ENUM ('pending', 'running', 'completed', 'failed')",
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.domain_events (
                    id UUID PRIMARY KEY,
                    name VARCHAR(64) NOT NULL,
                    payload JSONB NOT NULL,
                    emitted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.subscriber_runs (
                    id UUID PRIMARY KEY,
                    event_id UUID NOT NULL REFERENCES coaching_pipeline.domain_events(id) ON DELETE CASCADE,
                    subscriber_id VARCHAR(128) NOT NULL,
                    status coaching_pipeline.run_status NOT NULL DEFAULT 'pending',
                    attempt_count INTEGER NOT NULL DEFAULT 0,
                    max_attempts INTEGER NOT NULL CHECK (max_attempts > 0),
                    last_error TEXT,
                    output JSONB,
                    next_attempt_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    locked_until TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE(event_id, subscriber_id)
                )
                "#,
                // Claim query: due pending runs plus running runs whose lease expired
                r#"
                CREATE INDEX IF NOT EXISTS idx_subscriber_runs_due
                    ON coaching_pipeline.subscriber_runs(status, next_attempt_at)
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.step_checkpoints (
                    id UUID PRIMARY KEY,
                    run_id UUID NOT NULL REFERENCES coaching_pipeline.subscriber_runs(id) ON DELETE CASCADE,
                    step_name VARCHAR(128) NOT NULL,
                    output JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE(run_id, step_name)
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
                "DROP TABLE IF EXISTS coaching_pipeline.step_checkpoints",
                "DROP TABLE IF EXISTS coaching_pipeline.subscriber_runs",
                "DROP TABLE IF EXISTS coaching_pipeline.domain_events",
                "DROP TYPE IF EXISTS coaching_pipeline.run_status",
            ],
        )
        .await
    }
}
