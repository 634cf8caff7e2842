//! Trainee notifications for new and overdue assignments.

use crate::directory::Directory;
use crate::error::Error;
use crate::notification::{Notifier, SendNotification, SendNotificationResult};
use async_trait::async_trait;
use chrono::DateTime;
use entity_api::notification_type::NotificationType;
use entity_api::Id;
use events::{DomainEvent, EventEnvelope, EventName};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use worker::{StepContext, Subscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
    Created,
    Overdue,
}

/// What the notice needs to know about the assignment, resolved once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Recipient {
    email: Option<String>,
    name: Option<String>,
    scenario_title: Option<String>,
}

/// Common view over the two assignment payloads.
struct AssignmentFacts<'a> {
    assignment_id: Id,
    user_id: Id,
    org_id: Id,
    scenario_id: Option<Id>,
    due_at: Option<&'a str>,
}

impl<'a> AssignmentFacts<'a> {
    fn from_event(event: &'a DomainEvent) -> Option<(Notice, Self)> {
        match event {
            DomainEvent::AssignmentCreated(p) => Some((
                Notice::Created,
                Self {
                    assignment_id: p.assignment_id,
                    user_id: p.user_id,
                    org_id: p.org_id,
                    scenario_id: p.scenario_id,
                    due_at: p.due_at.as_deref(),
                },
            )),
            DomainEvent::AssignmentOverdue(p) => Some((
                Notice::Overdue,
                Self {
                    assignment_id: p.assignment_id,
                    user_id: p.user_id,
                    org_id: p.org_id,
                    scenario_id: p.scenario_id,
                    due_at: Some(p.due_at.as_str()),
                },
            )),
            _ => None,
        }
    }

    fn action_url(&self) -> String {
        match self.scenario_id {
            Some(scenario_id) => format!("/training/scenarios/{scenario_id}"),
            None => "/assignments".to_string(),
        }
    }
}

/// `2026-10-20T17:00:00Z` -> `Oct 20, 2026`; anything unparseable is shown as given.
fn display_date(value: &str) -> String {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|_| value.to_string())
}

fn notice_text(
    notice: Notice,
    facts: &AssignmentFacts,
    scenario_title: Option<&str>,
) -> (String, String) {
    let quoted = scenario_title.map(|title| format!("\"{title}\""));

    match notice {
        Notice::Created => {
            let title = match scenario_title {
                Some(title) => format!("New assignment: {title}"),
                None => "New assignment".to_string(),
            };
            let subject = quoted.unwrap_or_else(|| "a new training assignment".to_string());
            let body = match facts.due_at {
                Some(due) => format!(
                    "You've been assigned {subject}. It's due {}.",
                    display_date(due)
                ),
                None => format!("You've been assigned {subject}."),
            };
            (title, body)
        }
        Notice::Overdue => {
            let title = match scenario_title {
                Some(title) => format!("Overdue: {title}"),
                None => "Assignment overdue".to_string(),
            };
            let subject = quoted.unwrap_or_else(|| "Your assignment".to_string());
            let due = facts.due_at.map(display_date).unwrap_or_default();
            (
                title,
                format!("{subject} was due {due}. Complete it as soon as you can."),
            )
        }
    }
}

/// `assignment-notifications/created` and `assignment-notifications/overdue`.
pub struct AssignmentNotifications {
    notice: Notice,
    directory: Arc<dyn Directory>,
    notifier: Notifier,
}

impl AssignmentNotifications {
    pub const CREATED_ID: &'static str = "assignment-notifications/created";
    pub const OVERDUE_ID: &'static str = "assignment-notifications/overdue";

    pub fn all(directory: Arc<dyn Directory>, notifier: Notifier) -> Vec<Arc<dyn Subscriber>> {
        [Notice::Created, Notice::Overdue]
            .into_iter()
            .map(|notice| {
                Arc::new(AssignmentNotifications {
                    notice,
                    directory: directory.clone(),
                    notifier: notifier.clone(),
                }) as Arc<dyn Subscriber>
            })
            .collect()
    }

    async fn recipient(&self, user_id: Id, scenario_id: Option<Id>) -> Result<Recipient, Error> {
        let (email, name) = match self.directory.user(user_id).await {
            Ok(user) => (Some(user.email.clone()), user.display_name()),
            Err(err) if err.is_not_found() => {
                warn!("Assigned user {user_id} not found, notifying in-app only");
                (None, None)
            }
            Err(err) => return Err(err),
        };

        let scenario_title = match scenario_id {
            Some(id) => match self.directory.scenario(id).await {
                Ok(scenario) => Some(scenario.title),
                Err(err) => {
                    warn!("Could not load assigned scenario {id}: {err}");
                    None
                }
            },
            None => None,
        };

        Ok(Recipient {
            email,
            name,
            scenario_title,
        })
    }

    async fn send(
        &self,
        notification_id: Id,
        facts: &AssignmentFacts<'_>,
        recipient: &Recipient,
    ) -> Result<SendNotificationResult, Error> {
        let (title, body) = notice_text(self.notice, facts, recipient.scenario_title.as_deref());
        let notification_type = match self.notice {
            Notice::Created => NotificationType::AssignmentCreated,
            Notice::Overdue => NotificationType::AssignmentOverdue,
        };

        self.notifier
            .send_notification(SendNotification {
                id: Some(notification_id),
                user_id: facts.user_id,
                org_id: facts.org_id,
                notification_type,
                title,
                body,
                action_url: Some(facts.action_url()),
                agent_id: None,
                metadata: Some(json!({"assignmentId": facts.assignment_id})),
                recipient_email: recipient.email.clone(),
                recipient_name: recipient.name.clone(),
            })
            .await
    }
}

#[async_trait]
impl Subscriber for AssignmentNotifications {
    fn id(&self) -> &'static str {
        match self.notice {
            Notice::Created => Self::CREATED_ID,
            Notice::Overdue => Self::OVERDUE_ID,
        }
    }

    fn trigger(&self) -> EventName {
        match self.notice {
            Notice::Created => EventName::AssignmentCreated,
            Notice::Overdue => EventName::AssignmentOverdue,
        }
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        steps: &StepContext,
    ) -> Result<Value, worker::Error> {
        let facts = match AssignmentFacts::from_event(&envelope.event) {
            Some((notice, facts)) if notice == self.notice => facts,
            _ => {
                return Err(worker::Error::handler(format!(
                    "{} received {}",
                    self.id(),
                    envelope.name()
                )))
            }
        };

        let recipient = steps
            .run("load-recipient", || {
                self.recipient(facts.user_id, facts.scenario_id)
            })
            .await?;

        let notification_id = steps.idempotency_key("send-notification");
        let result = steps
            .run("send-notification", || {
                self.send(notification_id, &facts, &recipient)
            })
            .await?;

        Ok(json!({
            "notificationId": result.notification_id,
            "emailSent": result.email_sent,
            "emailSuppressedReason": result.email_suppressed_reason,
        }))
    }
}
