use super::error::Error;
use entity::notification_preferences::{Column, Entity, Model};
use entity::Id;
use sea_orm::{entity::prelude::*, ConnectionTrait};

/// Preferences for (org_id, user_id), if the user ever saved any.
pub async fn find_by_user(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn find_by_user_returns_none_without_a_row() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .into_connection();

        let prefs = find_by_user(&db, Id::new_v4(), Id::new_v4()).await?;
        assert!(prefs.is_none());

        Ok(())
    }
}
