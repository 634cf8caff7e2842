use super::error::Error;
use entity::user_memories::{Column, Entity, Model, MEMORY_TYPE_WEAKNESS};
use entity::Id;
use sea_orm::{entity::prelude::*, ConnectionTrait, QueryOrder};

/// Weakness memories of a trainee, lowest score first.
pub async fn find_weaknesses(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::MemoryType.eq(MEMORY_TYPE_WEAKNESS))
        .order_by_asc(Column::Score)
        .all(db)
        .await?)
}
