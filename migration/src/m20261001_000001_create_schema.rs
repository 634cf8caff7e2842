use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Every pipeline table lives in its own schema
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS coaching_pipeline;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO coaching_pipeline, public;")
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // CASCADE removes all objects in it
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS coaching_pipeline CASCADE;")
            .await?;

        Ok(())
    }
}
