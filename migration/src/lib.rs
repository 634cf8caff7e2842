pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_schema;
mod m20261001_000002_create_directory_tables;
mod m20261001_000003_create_notification_tables;
mod m20261001_000004_create_webhook_tables;
mod m20261001_000005_create_subscriber_run_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_schema::Migration),
            Box::new(m20261001_000002_create_directory_tables::Migration),
            Box::new(m20261001_000003_create_notification_tables::Migration),
            Box::new(m20261001_000004_create_webhook_tables::Migration),
            Box::new(m20261001_000005_create_subscriber_run_tables::Migration),
        ]
    }
}

/// Runs each statement in order on the migration connection.
async fn execute_all(manager: &SchemaManager<'_>, statements: &[&str]) -> Result<(), DbErr> {
    for statement in statements {
        manager.get_connection().execute_unprepared(statement).await?;
    }
    Ok(())
}
