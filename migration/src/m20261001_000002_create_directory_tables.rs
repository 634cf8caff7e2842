use crate::execute_all;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Organizations, users, scenarios and practice history. These are written by
// the rest of the product; the pipeline reads them and appends agent activity.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        execute_all(
            manager,
            &[
                "CREATE TYPE coaching_pipeline.role AS ENUM ('trainee', 'manager', 'admin')",
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.organizations (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    name VARCHAR(255) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.users (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    org_id UUID NOT NULL REFERENCES coaching_pipeline.organizations(id) ON DELETE CASCADE,
                    email VARCHAR(255) NOT NULL UNIQUE,
                    first_name VARCHAR(255),
                    last_name VARCHAR(255),
                    role coaching_pipeline.role NOT NULL DEFAULT 'trainee',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_users_org_role ON coaching_pipeline.users(org_id, role)",
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.scenarios (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    org_id UUID REFERENCES coaching_pipeline.organizations(id) ON DELETE CASCADE,
                    title VARCHAR(255) NOT NULL,
                    description TEXT,
                    difficulty VARCHAR(32),
                    rubric JSONB,
                    status VARCHAR(32) NOT NULL DEFAULT 'active',
                    visibility VARCHAR(32) NOT NULL DEFAULT 'org',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_scenarios_org_status ON coaching_pipeline.scenarios(org_id, status)",
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.scenario_attempts (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    org_id UUID NOT NULL REFERENCES coaching_pipeline.organizations(id) ON DELETE CASCADE,
                    user_id UUID NOT NULL REFERENCES coaching_pipeline.users(id) ON DELETE CASCADE,
                    scenario_id UUID NOT NULL REFERENCES coaching_pipeline.scenarios(id) ON DELETE CASCADE,
                    status VARCHAR(32) NOT NULL,
                    score DOUBLE PRECISION,
                    started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    duration_seconds INTEGER
                )
                "#,
                r#"
                CREATE INDEX IF NOT EXISTS idx_scenario_attempts_user_started
                    ON coaching_pipeline.scenario_attempts(org_id, user_id, started_at DESC)
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.user_memories (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    org_id UUID NOT NULL REFERENCES coaching_pipeline.organizations(id) ON DELETE CASCADE,
                    user_id UUID NOT NULL REFERENCES coaching_pipeline.users(id) ON DELETE CASCADE,
                    memory_type VARCHAR(64) NOT NULL,
                    key VARCHAR(255) NOT NULL,
                    score DOUBLE PRECISION,
                    trend VARCHAR(32),
                    evidence_count INTEGER NOT NULL DEFAULT 0,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE(org_id, user_id, memory_type, key)
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS coaching_pipeline.agent_activities (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    org_id UUID NOT NULL REFERENCES coaching_pipeline.organizations(id) ON DELETE CASCADE,
                    user_id UUID REFERENCES coaching_pipeline.users(id) ON DELETE SET NULL,
                    agent_id VARCHAR(64) NOT NULL,
                    event_type VARCHAR(64) NOT NULL,
                    action VARCHAR(128) NOT NULL,
                    details JSONB,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE INDEX IF NOT EXISTS idx_agent_activities_org_created
                    ON coaching_pipeline.agent_activities(org_id, created_at DESC)
                "#,
            ],
        )
        .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        execute_all(
            manager,
            &[
                "DROP TABLE IF EXISTS coaching_pipeline.agent_activities",
                "DROP TABLE IF EXISTS coaching_pipeline.user_memories",
                "DROP TABLE IF EXISTS coaching_pipeline.scenario_attempts",
                "DROP TABLE IF EXISTS coaching_pipeline.scenarios",
                "DROP TABLE IF EXISTS coaching_pipeline.users",
                "DROP TABLE IF EXISTS coaching_pipeline.organizations",
                "DROP TYPE IF EXISTS coaching_pipeline.role",
            ],
        )
        .await
    }
}
