use super::error::Error;
use entity::agent_activities::{ActiveModel, Model};
use entity::Id;
use sea_orm::{entity::prelude::*, ActiveValue::Set, ConnectionTrait};

pub async fn create(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Option<Id>,
    agent_id: &str,
    event_type: &str,
    action: &str,
    details: Option<Json>,
) -> Result<Model, Error> {
    let active_model = ActiveModel {
        id: Set(Id::new_v4()),
        org_id: Set(org_id),
        user_id: Set(user_id),
        agent_id: Set(agent_id.to_string()),
        event_type: Set(event_type.to_string()),
        action: Set(action.to_string()),
        details: Set(details),
        created_at: Set(chrono::Utc::now().into()),
    };

    Ok(active_model.insert(db).await?)
}
