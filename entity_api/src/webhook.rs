use super::error::Error;
use entity::webhooks::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, sea_query::Expr, ActiveValue::Set, ConnectionTrait, QueryOrder,
};

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Webhook `id` if it belongs to `org_id`; a webhook of another org is reported as not found.
pub async fn find_by_org(db: &impl ConnectionTrait, org_id: Id, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .filter(Column::OrgId.eq(org_id))
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Enabled webhooks of the org whose `events` contain `event_type`.
pub async fn find_enabled_for_event(
    db: &impl ConnectionTrait,
    org_id: Id,
    event_type: &str,
) -> Result<Vec<Model>, Error> {
    let webhooks = Entity::find()
        .filter(Column::OrgId.eq(org_id))
        .filter(Column::Enabled.eq(true))
        .filter(Expr::cust_with_values(
            "? = ANY(\"webhooks\".\"events\")",
            [event_type],
        ))
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?;

    debug!(
        "Found {} enabled webhook(s) for {event_type} in org {org_id}",
        webhooks.len()
    );
    Ok(webhooks)
}

pub async fn update_secret(
    db: &impl ConnectionTrait,
    org_id: Id,
    id: Id,
    secret: String,
) -> Result<Model, Error> {
    let existing = find_by_org(db, org_id, id).await?;

    let mut active_model: ActiveModel = existing.into();
    active_model.secret = Set(secret);
    active_model.updated_at = Set(chrono::Utc::now().into());

    Ok(active_model.update(db).await?)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn webhook(org_id: Id) -> Model {
        let now = chrono::Utc::now();
        Model {
            id: Id::new_v4(),
            org_id,
            name: "CRM".to_string(),
            url: "https://crm.example.com/hooks".to_string(),
            secret: "old".to_string(),
            events: vec!["attempt.scored.low".to_string()],
            enabled: true,
            retry_attempts: 3,
            timeout_seconds: 30,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn find_enabled_for_event_filters_on_events_array() -> Result<(), Error> {
        let org_id = Id::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![webhook(org_id)]])
            .into_connection();

        let found = find_enabled_for_event(&db, org_id, "attempt.scored.low").await?;
        assert_eq!(found.len(), 1);

        let log = db.into_transaction_log();
        let sql = format!("{:?}", log[0]);
        assert!(sql.contains("ANY"));
        assert!(sql.contains("attempt.scored.low"));
        Ok(())
    }

    #[tokio::test]
    async fn update_secret_replaces_the_secret() -> Result<(), Error> {
        let org_id = Id::new_v4();
        let existing = webhook(org_id);
        let mut updated = existing.clone();
        updated.secret = "new".to_string();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![existing.clone()], vec![updated]])
            .into_connection();

        let result = update_secret(&db, org_id, existing.id, "new".to_string()).await?;
        assert_eq!(result.secret, "new");
        Ok(())
    }
}
