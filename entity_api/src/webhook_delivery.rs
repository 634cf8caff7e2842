//! Delivery records for outbound webhooks.

use super::error::Error;
use entity::delivery_status::DeliveryStatus;
use entity::webhook_deliveries::{ActiveModel, Column, Entity, Model, MAX_RESPONSE_BODY_CHARS};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, ConnectionTrait, QueryOrder, QuerySelect,
};

/// Inserts the `pending` row that must exist before the HTTP call is made.
pub async fn create_pending(
    db: &impl ConnectionTrait,
    id: Id,
    webhook_id: Id,
    event_type: &str,
    payload: Json,
) -> Result<Model, Error> {
    debug!("Recording pending delivery {id} of {event_type} to webhook {webhook_id}");

    let now = chrono::Utc::now();
    let active_model = ActiveModel {
        id: Set(id),
        webhook_id: Set(webhook_id),
        event_type: Set(event_type.to_string()),
        payload: Set(payload),
        attempt_count: Set(1),
        status: Set(DeliveryStatus::Pending),
        response_status: Set(None),
        response_body: Set(None),
        error_message: Set(None),
        delivered_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    Ok(active_model.insert(db).await?)
}

/// Bumps `attempt_count` before an automatic retry of the same delivery.
pub async fn record_attempt(
    db: &impl ConnectionTrait,
    id: Id,
    attempt_count: i32,
) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;

    let mut active_model: ActiveModel = existing.into();
    active_model.attempt_count = Set(attempt_count);
    active_model.updated_at = Set(chrono::Utc::now().into());

    Ok(active_model.update(db).await?)
}

/// Stores the endpoint's answer. A 2xx is `success` and stamps `delivered_at`.
pub async fn record_response(
    db: &impl ConnectionTrait,
    id: Id,
    status_code: u16,
    body: &str,
) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;
    let now = chrono::Utc::now();
    let success = (200..300).contains(&status_code);

    let mut active_model: ActiveModel = existing.into();
    active_model.status = Set(if success {
        DeliveryStatus::Success
    } else {
        DeliveryStatus::Failed
    });
    active_model.response_status = Set(Some(i32::from(status_code)));
    active_model.response_body = Set(Some(truncate_body(body)));
    active_model.error_message = Set(None);
    active_model.delivered_at = Set(success.then(|| now.into()));
    active_model.updated_at = Set(now.into());

    Ok(active_model.update(db).await?)
}

/// Marks this delivery failed after a timeout or network error.
pub async fn record_failure(
    db: &impl ConnectionTrait,
    id: Id,
    error_message: &str,
) -> Result<Model, Error> {
    let existing = find_by_id(db, id).await?;

    let mut active_model: ActiveModel = existing.into();
    active_model.status = Set(DeliveryStatus::Failed);
    active_model.error_message = Set(Some(error_message.to_string()));
    active_model.delivered_at = Set(None);
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
pub async fn find_by_webhook(
    db: &impl ConnectionTrait,
    webhook_id: Id,
    limit: u64,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::WebhookId.eq(webhook_id))
        .order_by_desc(Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// First `MAX_RESPONSE_BODY_CHARS` characters, never splitting a code point.
pub fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_RESPONSE_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("ok"), "ok");
    }

    #[test]
    fn truncate_body_caps_at_max_chars() {
        let body = "é".repeat(MAX_RESPONSE_BODY_CHARS + 10);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.chars().count(), MAX_RESPONSE_BODY_CHARS);
    }

    #[cfg(feature = "mock")]
    mod mock {
        use super::super::*;
        use sea_orm::{DatabaseBackend, MockDatabase};

        fn pending() -> Model {
            let now = chrono::Utc::now();
            Model {
                id: Id::new_v4(),
                webhook_id: Id::new_v4(),
                event_type: "attempt.scored.high".to_string(),
                payload: serde_json::json!({"foo": 1}),
                attempt_count: 1,
                status: DeliveryStatus::Pending,
                response_status: None,
                response_body: None,
                error_message: None,
                delivered_at: None,
                created_at: now.into(),
                updated_at: now.into(),
            }
        }

        #[tokio::test]
        async fn record_response_with_500_marks_failed() -> Result<(), Error> {
            let row = pending();
            let mut failed = row.clone();
            failed.status = DeliveryStatus::Failed;
            failed.response_status = Some(500);

            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results(vec![vec![row.clone()], vec![failed]])
                .into_connection();

            let updated = record_response(&db, row.id, 500, "boom").await?;
            assert_eq!(updated.status, DeliveryStatus::Failed);
            assert_eq!(updated.response_status, Some(500));
            assert!(updated.delivered_at.is_none());
            Ok(())
        }
    }
}
