//! Subscribers that forward domain events to customer webhooks.

use super::payload::{AttemptRef, UserRef, WebhookEventType, WebhookPayload, WebhookPayloadBuilder};
use super::{TargetReport, WebhookDispatcher};
use crate::directory::Directory;
use crate::error::Error;
use async_trait::async_trait;
use chrono::Utc;
use events::{DomainEvent, EventEnvelope, EventName};
use entity_api::Id;
use log::*;
use serde_json::{json, Value};
use std::sync::Arc;
use worker::{StepContext, Subscriber};

/// Relays one domain event name to the matching webhook event.
pub struct WebhookRelay {
    id: &'static str,
    trigger: EventName,
    dispatcher: WebhookDispatcher,
    directory: Arc<dyn Directory>,
}

impl WebhookRelay {
    pub const RELAYED: [(&'static str, EventName); 5] = [
        ("webhook-relay/attempt-completed", EventName::AttemptCompleted),
        ("webhook-relay/attempt-scored", EventName::AttemptScored),
        ("webhook-relay/assignment-created", EventName::AssignmentCreated),
        ("webhook-relay/assignment-overdue", EventName::AssignmentOverdue),
        ("webhook-relay/user-joined-org", EventName::UserJoinedOrg),
    ];

    /// One relay per relayed event name.
    pub fn all(
        dispatcher: WebhookDispatcher,
        directory: Arc<dyn Directory>,
    ) -> Vec<Arc<dyn Subscriber>> {
        Self::RELAYED
            .into_iter()
            .map(|(id, trigger)| {
                Arc::new(WebhookRelay {
                    id,
                    trigger,
                    dispatcher: dispatcher.clone(),
                    directory: directory.clone(),
                }) as Arc<dyn Subscriber>
            })
            .collect()
    }

    async fn build_payload(
        &self,
        event: &DomainEvent,
    ) -> Result<Option<(WebhookEventType, WebhookPayload)>, Error> {
        let org_id = event
            .org_id()
            .ok_or_else(|| Error::other(format!("{} is not relayed to webhooks", event.name())))?;
        let org = self.directory.organization(org_id).await?;
        let now = Utc::now();

        let payload = match event {
            DomainEvent::AttemptCompleted(p) => {
                let event_type = WebhookEventType::ScenarioCompleted;
                let builder = self
                    .with_user_and_scenario(
                        WebhookPayloadBuilder::new(event_type, &org, now),
                        p.user_id,
                        Some(p.scenario_id),
                    )
                    .await?
                    .attempt(AttemptRef {
                        id: p.attempt_id,
                        score: None,
                        duration_seconds: Some(p.duration_seconds),
                        kpis: None,
                    });
                (event_type, builder.build())
            }
            DomainEvent::AttemptScored(p) => {
                let Some(event_type) = WebhookEventType::for_score(p.score) else {
                    debug!(
                        "Score {} of attempt {} is neither low nor high, nothing to relay",
                        p.score, p.attempt_id
                    );
                    return Ok(None);
                };
                let builder = self
                    .with_user_and_scenario(
                        WebhookPayloadBuilder::new(event_type, &org, now),
                        p.user_id,
                        Some(p.scenario_id),
                    )
                    .await?
                    .attempt(AttemptRef {
                        id: p.attempt_id,
                        score: Some(p.score),
                        duration_seconds: None,
                        kpis: Some(p.kpis.clone()),
                    });
                (event_type, builder.build())
            }
            DomainEvent::AssignmentCreated(p) => {
                let event_type = WebhookEventType::ScenarioAssigned;
                let mut builder = self
                    .with_user_and_scenario(
                        WebhookPayloadBuilder::new(event_type, &org, now),
                        p.user_id,
                        p.scenario_id,
                    )
                    .await?
                    .assignment(p.assignment_id, p.due_at.clone());
                if let Some(track_id) = p.track_id {
                    builder = builder.track(track_id);
                }
                (event_type, builder.build())
            }
            DomainEvent::AssignmentOverdue(p) => {
                let event_type = WebhookEventType::AssignmentOverdue;
                let mut builder = self
                    .with_user_and_scenario(
                        WebhookPayloadBuilder::new(event_type, &org, now),
                        p.user_id,
                        p.scenario_id,
                    )
                    .await?
                    .assignment(p.assignment_id, Some(p.due_at.clone()));
                if let Some(track_id) = p.track_id {
                    builder = builder.track(track_id);
                }
                (event_type, builder.build())
            }
            DomainEvent::UserJoinedOrg(p) => {
                let event_type = WebhookEventType::UserAdded;
                let builder = WebhookPayloadBuilder::new(event_type, &org, now).user_ref(UserRef {
                    id: p.user_id,
                    email: p.email.clone(),
                    name: p.name.clone(),
                    role: p.role.clone(),
                });
                (event_type, builder.build())
            }
            other => {
                return Err(Error::other(format!(
                    "{} is not relayed to webhooks",
                    other.name()
                )))
            }
        };

        Ok(Some(payload))
    }

    async fn with_user_and_scenario(
        &self,
        builder: WebhookPayloadBuilder,
        user_id: Id,
        scenario_id: Option<Id>,
    ) -> Result<WebhookPayloadBuilder, Error> {
        let user = self.directory.user(user_id).await?;
        let mut builder = builder.user(&user);
        if let Some(scenario_id) = scenario_id {
            let scenario = self.directory.scenario(scenario_id).await?;
            builder = builder.scenario(&scenario);
        }
        Ok(builder)
    }
}

#[async_trait]
impl Subscriber for WebhookRelay {
    fn id(&self) -> &'static str {
        self.id
    }

    fn trigger(&self) -> EventName {
        self.trigger
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        steps: &StepContext,
    ) -> Result<Value, worker::Error> {
        let built = steps
            .run("build-payload", || self.build_payload(&envelope.event))
            .await?;

        let Some((event_type, payload)) = built else {
            return Ok(json!({"relayed": false, "reason": "score_not_relayed"}));
        };

        let org_id = envelope
            .event
            .org_id()
            .ok_or_else(|| worker::Error::handler("relayed event has no organization"))?;
        let reports: Vec<TargetReport> = steps
            .run("deliver", || {
                self.dispatcher.trigger_event(org_id, event_type, &payload)
            })
            .await?;

        let delivered = reports.iter().filter(|r| r.outcome.is_delivered()).count();
        Ok(json!({
            "relayed": true,
            "eventType": event_type,
            "targets": reports.len(),
            "delivered": delivered,
        }))
    }
}
