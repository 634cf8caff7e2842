use super::error::Error;
use entity::organizations::{Entity, Model};
use entity::Id;
use sea_orm::{entity::prelude::*, ConnectionTrait};

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
    use crate::error::EntityApiErrorKind;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn find_by_id_reports_missing_organization() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .into_connection();

        let err = find_by_id(&db, Id::new_v4()).await.unwrap_err();
        assert_eq!(err.error_kind, EntityApiErrorKind::RecordNotFound);
    }
}
