//! Rule-Based Alerting: notifies an org's managers about notable scores.

use crate::directory::Directory;
use crate::error::Error;
use crate::notification::{Notifier, SendNotification};
use async_trait::async_trait;
use entity_api::notification_type::NotificationType;
use entity_api::role::Role;
use entity_api::{users, Id};
use events::{DomainEvent, EventEnvelope, EventName};
use futures::future::join_all;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use worker::{StepContext, Subscriber};

pub const CRITICAL_SCORE_THRESHOLD: f64 = 40.0;
pub const DECLINING_WINDOW: usize = 3;
pub const ACHIEVEMENT_SCORE_THRESHOLD: f64 = 90.0;

const UNKNOWN_TRAINEE: &str = "Unknown trainee";
const UNKNOWN_SCENARIO: &str = "Unknown scenario";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
}

/// Everything the rules look at for one scored attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertFacts<'a> {
    pub trainee_name: &'a str,
    pub scenario_name: &'a str,
    pub score: f64,
    /// Prior completed, scored attempts, newest first, not including this one
    pub prior_scores: &'a [f64],
    /// Completed, scored attempts including this one
    pub completed_count: u64,
}

/// Applies the critical, declining and achievement rules in that order.
pub fn evaluate_rules(facts: &AlertFacts) -> Result<Vec<Alert>, Error> {
    check_score("score", facts.score)?;
    for prior in facts.prior_scores {
        check_score("prior score", *prior)?;
    }

    let AlertFacts {
        trainee_name: trainee,
        scenario_name: scenario,
        score,
        ..
    } = *facts;
    let mut alerts = Vec::new();

    if score < CRITICAL_SCORE_THRESHOLD {
        alerts.push(Alert {
            notification_type: NotificationType::CriticalScore,
            title: format!("Low score alert: {trainee} scored {score} on {scenario}"),
            body: format!(
                "{trainee} scored {score} on \"{scenario}\", below the critical threshold of \
                 {CRITICAL_SCORE_THRESHOLD}. Review their attempt and schedule a coaching session."
            ),
        });
    }

    if facts.prior_scores.len() >= DECLINING_WINDOW - 1 {
        let window: Vec<f64> = std::iter::once(score)
            .chain(facts.prior_scores.iter().copied())
            .take(DECLINING_WINDOW)
            .collect();

        if window.windows(2).all(|pair| pair[0] > pair[1]) {
            let chronological: Vec<String> = window.iter().rev().map(|s| s.to_string()).collect();
            alerts.push(Alert {
                notification_type: NotificationType::DecliningTrend,
                title: format!(
                    "Declining trend: {trainee} has {DECLINING_WINDOW}+ consecutive declining scores"
                ),
                body: format!(
                    "{trainee}'s scores are declining: {}. Review recent attempts and schedule a \
                     coaching session.",
                    chronological.join(" → ")
                ),
            });
        }
    }

    if facts.completed_count == 1 && score > ACHIEVEMENT_SCORE_THRESHOLD {
        alerts.push(Alert {
            notification_type: NotificationType::Achievement,
            title: format!("Achievement: {trainee} scored {score} on first attempt"),
            body: format!(
                "{trainee} scored {score} on their first attempt at \"{scenario}\". Consider \
                 recognizing this in your next team sync."
            ),
        });
    }

    Ok(alerts)
}

fn check_score(what: &str, score: f64) -> Result<(), Error> {
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(Error::rule_evaluation(format!(
            "{what} {score} is outside 0..=100"
        )));
    }
    Ok(())
}

fn trainee_name(user: &users::Model) -> String {
    match (user.first_name.as_deref(), user.last_name.as_deref()) {
        (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
            format!("{first} {last}")
        }
        (Some(first), _) if !first.is_empty() => first.to_string(),
        _ => UNKNOWN_TRAINEE.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerRecipient {
    pub user_id: Id,
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSend {
    pub manager_id: Id,
    pub alert_type: NotificationType,
    pub notification_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `manager-alerts`, triggered by `attempt.scored`.
pub struct ManagerAlerts {
    directory: Arc<dyn Directory>,
    notifier: Notifier,
}

impl ManagerAlerts {
    pub const ID: &'static str = "manager-alerts";

    pub fn new(directory: Arc<dyn Directory>, notifier: Notifier) -> Self {
        Self {
            directory,
            notifier,
        }
    }

    async fn evaluate(
        &self,
        org_id: Id,
        user_id: Id,
        attempt_id: Id,
        scenario_id: Id,
        score: f64,
    ) -> Result<Vec<Alert>, Error> {
        let trainee = match self.directory.user(user_id).await {
            Ok(user) => trainee_name(&user),
            Err(err) => {
                warn!("Could not load trainee {user_id} for alerts: {err}");
                UNKNOWN_TRAINEE.to_string()
            }
        };
        let scenario = match self.directory.scenario(scenario_id).await {
            Ok(scenario) => scenario.title,
            Err(err) => {
                warn!("Could not load scenario {scenario_id} for alerts: {err}");
                UNKNOWN_SCENARIO.to_string()
            }
        };

        let window = u64::try_from(DECLINING_WINDOW - 1).unwrap_or(2);
        let prior_scores = self
            .directory
            .recent_scores(org_id, user_id, attempt_id, window)
            .await?;
        let completed_count = self
            .directory
            .completed_scored_count(org_id, user_id)
            .await?;

        evaluate_rules(&AlertFacts {
            trainee_name: &trainee,
            scenario_name: &scenario,
            score,
            prior_scores: &prior_scores,
            completed_count,
        })
    }

    async fn managers(&self, org_id: Id) -> Result<Vec<ManagerRecipient>, Error> {
        Ok(self
            .directory
            .users_with_role(org_id, Role::Manager)
            .await?
            .into_iter()
            .map(|manager| ManagerRecipient {
                user_id: manager.id,
                name: manager.first_name,
                email: manager.email,
            })
            .collect())
    }

    /// One notification per (manager, alert). `steps` supplies ids that stay
    /// fixed across retries of the run.
    async fn send(
        &self,
        steps: &StepContext,
        org_id: Id,
        managers: &[ManagerRecipient],
        alerts: &[Alert],
    ) -> Result<Vec<AlertSend>, Error> {
        let sends = managers.iter().flat_map(|manager| {
            alerts.iter().map(move |alert| async move {
                let request = SendNotification {
                    id: Some(steps.idempotency_key(&format!(
                        "send-alerts/{}/{}",
                        manager.user_id, alert.notification_type
                    ))),
                    user_id: manager.user_id,
                    org_id,
                    notification_type: alert.notification_type,
                    title: alert.title.clone(),
                    body: alert.body.clone(),
                    action_url: None,
                    agent_id: None,
                    metadata: None,
                    recipient_email: Some(manager.email.clone()),
                    recipient_name: manager.name.clone(),
                };

                match self.notifier.send_notification(request).await {
                    Ok(result) => AlertSend {
                        manager_id: manager.user_id,
                        alert_type: alert.notification_type,
                        notification_id: Some(result.notification_id),
                        error: None,
                    },
                    Err(err) => {
                        error!(
                            "Failed to send {} alert to manager {}: {err}",
                            alert.notification_type, manager.user_id
                        );
                        AlertSend {
                            manager_id: manager.user_id,
                            alert_type: alert.notification_type,
                            notification_id: None,
                            error: Some(err.to_string()),
                        }
                    }
                }
            })
        });

        Ok(join_all(sends).await)
    }
}

#[async_trait]
impl Subscriber for ManagerAlerts {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn trigger(&self) -> EventName {
        EventName::AttemptScored
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        steps: &StepContext,
    ) -> Result<Value, worker::Error> {
        let DomainEvent::AttemptScored(scored) = &envelope.event else {
            return Err(worker::Error::handler(format!(
                "{} received {}",
                Self::ID,
                envelope.name()
            )));
        };

        let alerts = steps
            .run("evaluate-alert-rules", || {
                self.evaluate(
                    scored.org_id,
                    scored.user_id,
                    scored.attempt_id,
                    scored.scenario_id,
                    scored.score,
                )
            })
            .await?;

        if alerts.is_empty() {
            return Ok(json!({"dispatched": false, "reason": "no_alerts_triggered"}));
        }

        let managers = steps
            .run("find-managers", || self.managers(scored.org_id))
            .await?;

        if managers.is_empty() {
            return Ok(json!({"dispatched": false, "reason": "no_managers_found"}));
        }

        let results = steps
            .run("send-alerts", || {
                self.send(steps, scored.org_id, &managers, &alerts)
            })
            .await?;

        Ok(json!({
            "dispatched": true,
            "alertCount": alerts.len(),
            "managerCount": managers.len(),
            "results": results,
        }))
    }
}
