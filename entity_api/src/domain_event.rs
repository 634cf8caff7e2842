use super::error::Error;
use chrono::{DateTime, Utc};
use entity::domain_events::{ActiveModel, Column, Entity, Model};
use entity::Id;
use sea_orm::{
    entity::prelude::*, sea_query::OnConflict, ActiveValue::Set, ConnectionTrait,
};

/// Stores an event. Storing the same id again is a no-op and returns false.
pub async fn create(
    db: &impl ConnectionTrait,
    id: Id,
    name: &str,
    payload: Json,
    emitted_at: DateTime<Utc>,
) -> Result<bool, Error> {
    let active_model = ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        payload: Set(payload),
        emitted_at: Set(emitted_at.into()),
    };

    let inserted = Entity::insert(active_model)
        .on_conflict(OnConflict::column(Column::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    Ok(inserted > 0)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    #[tokio::test]
    async fn storing_an_existing_id_reports_no_insert() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(vec![MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let inserted = create(
            &db,
            Id::new_v4(),
            "user.inactive",
            json!({"userId": Id::new_v4()}),
            Utc::now(),
        )
        .await?;

        assert!(!inserted);
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("ON CONFLICT"));
        Ok(())
    }
}
