use super::error::Error;
use entity::notification_type::NotificationType;
use entity::notifications::{ActiveModel, Column, Entity, Model, CHANNEL_IN_APP};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    sea_query::{Expr, OnConflict},
    ActiveValue::Set,
    ConnectionTrait, QueryOrder, QuerySelect,
};

/// Fields of a notification row that the caller decides.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub id: Id,
    pub org_id: Id,
    pub user_id: Id,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    pub action_url: Option<String>,
    pub agent_id: Option<String>,
    pub metadata: Option<Json>,
}

/// Inserts the in-app record. `channels_sent` starts as `[in_app]` and `read` as false.
///
/// Creating an id that already exists leaves the stored row untouched and
/// returns it, so a retried sender sees what the earlier attempt recorded.
pub async fn create(db: &impl ConnectionTrait, new: NewNotification) -> Result<Model, Error> {
    debug!(
        "Creating {} notification {} for user {}",
        new.notification_type, new.id, new.user_id
    );

    let id = new.id;
    let now = chrono::Utc::now();
    let active_model = ActiveModel {
        id: Set(id),
        org_id: Set(new.org_id),
        user_id: Set(new.user_id),
        notification_type: Set(new.notification_type),
        title: Set(new.title),
        body: Set(new.body),
        action_url: Set(new.action_url),
        agent_id: Set(new.agent_id),
        read: Set(false),
        channels_sent: Set(vec![CHANNEL_IN_APP.to_string()]),
        metadata: Set(new.metadata),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    let inserted = Entity::insert(active_model)
        .on_conflict(OnConflict::column(Column::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    if inserted == 0 {
        debug!("Notification {id} already exists, reusing it");
    }

    find_by_id(db, id).await
}

/// Appends `channel` to `channels_sent` unless it is already present.
pub async fn append_channel(
    db: &impl ConnectionTrait,
    id: Id,
    channel: &str,
) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;

    if existing.channels_sent.iter().any(|sent| sent == channel) {
        return Ok(existing);
    }

    let mut channels = existing.channels_sent.clone();
    channels.push(channel.to_string());

    let mut active_model: ActiveModel = existing.into();
    active_model.channels_sent = Set(channels);
    active_model.updated_at = Set(chrono::Utc::now().into());

    Ok(active_model.update(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Newest first.
pub async fn find_by_user(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
    unread_only: bool,
    limit: u64,
) -> Result<Vec<Model>, Error> {
    let mut query = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id));

    if unread_only {
        query = query.filter(Column::Read.eq(false));
    }

    Ok(query
        .order_by_desc(Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// Flips `read` on one of the user's own notifications.
pub async fn mark_read(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
    id: Id,
) -> Result<Model, Error> {
    let existing = Entity::find_by_id(id)
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(Error::not_found)?;

    if existing.read {
        return Ok(existing);
    }

    let mut active_model: ActiveModel = existing.into();
    active_model.read = Set(true);
    active_model.updated_at = Set(chrono::Utc::now().into());

    Ok(active_model.update(db).await?)
}

/// Returns the number of notifications that changed.
pub async fn mark_all_read(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
) -> Result<u64, Error> {
    let result = Entity::update_many()
        .col_expr(Column::Read, Expr::value(true))
        .col_expr(
            Column::UpdatedAt,
            Expr::value(DateTimeWithTimeZone::from(chrono::Utc::now())),
        )
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::Read.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
