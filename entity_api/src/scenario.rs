use super::error::Error;
use entity::scenarios::{Column, Entity, Model, STATUS_ACTIVE};
use entity::Id;
use sea_orm::{entity::prelude::*, Condition, ConnectionTrait, QueryOrder};

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Active scenarios visible to the org: its own plus the universal ones.
pub async fn find_active_for_org(
    db: &impl ConnectionTrait,
    org_id: Id,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::Status.eq(STATUS_ACTIVE))
        .filter(
            Condition::any()
                .add(Column::OrgId.eq(org_id))
                .add(Column::OrgId.is_null()),
        )
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?)
}
