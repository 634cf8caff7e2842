use super::error::Error;
use entity::role::Role;
use entity::users::{Column, Entity, Model};
use entity::Id;
use sea_orm::{entity::prelude::*, ConnectionTrait, QueryOrder};

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Every user holding `role` in the org.
pub async fn find_by_org_and_role(
    db: &impl ConnectionTrait,
    org_id: Id,
    role: Role,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::Role.eq(role))
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?)
}
