use super::recommender::{recommend_next_scenario, RecommendationResult};
use super::skill_gap::{analyze_skill_gaps, rank_gaps, SkillGap, SkillGapAnalysis};
use crate::directory::{AgentActivity, Directory};
use crate::error::Error;
use crate::notification::{Notifier, SendNotification, SendNotificationResult};
use async_trait::async_trait;
use entity_api::notification_type::NotificationType;
use entity_api::Id;
use events::payload::CoachRecommendationReady;
use events::{DomainEvent, EventEmitter, EventEnvelope, EventName};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use worker::{StepContext, Subscriber};

pub const AGENT_ID: &str = "coach-agent";

const TRAINING_PATH: &str = "/training";

fn unexpected(subscriber: &str, envelope: &EventEnvelope) -> worker::Error {
    worker::Error::handler(format!("{subscriber} received {}", envelope.name()))
}

/// `coach/on-attempt-scored`: ranks skill gaps after a scored attempt and
/// emits a `next_scenario` recommendation.
pub struct OnAttemptScored {
    directory: Arc<dyn Directory>,
    emitter: EventEmitter,
}

impl OnAttemptScored {
    pub const ID: &'static str = "coach/on-attempt-scored";

    pub fn new(directory: Arc<dyn Directory>, emitter: EventEmitter) -> Self {
        Self { directory, emitter }
    }

    async fn analyze(&self, org_id: Id, user_id: Id) -> Result<SkillGapAnalysis, Error> {
        let weaknesses = self.directory.weaknesses(org_id, user_id).await?;
        Ok(analyze_skill_gaps(
            weaknesses.iter().map(SkillGap::from).collect(),
        ))
    }
}

#[async_trait]
impl Subscriber for OnAttemptScored {
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
            return Err(unexpected(Self::ID, envelope));
        };

        let analysis = steps
            .run("analyze-skill-gaps", || {
                self.analyze(scored.org_id, scored.user_id)
            })
            .await?;

        let result: RecommendationResult = steps
            .run("recommend-next-scenario", || {
                recommend_next_scenario(
                    self.directory.as_ref(),
                    scored.org_id,
                    scored.user_id,
                    analysis.top_gaps(),
                )
            })
            .await?;

        let scenario_id = result.recommendation.as_ref().map(|r| r.scenario_id);
        let message = result
            .recommendation
            .as_ref()
            .map(|r| r.reason.clone())
            .unwrap_or_else(|| result.reason.clone());

        let event_id = steps.idempotency_key("emit-recommendation");
        steps
            .run("emit-recommendation", || async {
                let envelope = self
                    .emitter
                    .emit_with_id(
                        event_id,
                        DomainEvent::CoachRecommendationReady(CoachRecommendationReady {
                            user_id: scored.user_id,
                            org_id: scored.org_id,
                            recommendation_type: "next_scenario".to_string(),
                            scenario_id,
                            message,
                        }),
                    )
                    .await?;
                Ok::<_, Error>(envelope.id)
            })
            .await?;

        steps
            .run("log-activity", || {
                self.directory.log_activity(AgentActivity {
                    org_id: scored.org_id,
                    user_id: Some(scored.user_id),
                    agent_id: AGENT_ID.to_string(),
                    event_type: EventName::AttemptScored.to_string(),
                    action: "recommend_next_scenario".to_string(),
                    details: Some(json!({
                        "attemptId": scored.attempt_id,
                        "gapsAnalyzed": analysis.top_gaps().len(),
                        "scenarioId": scenario_id,
                    })),
                })
            })
            .await?;

        Ok(json!({
            "gaps": analysis.top_gaps().len(),
            "recommendation": scenario_id,
            "reason": result.reason,
        }))
    }
}

/// "You haven't practiced in 4 days. ..." with the weakest gap when known.
pub fn reminder_message(weakest: Option<&SkillGap>, days_since_last_attempt: f64) -> String {
    let day_label = if days_since_last_attempt == 1.0 {
        "day"
    } else {
        "days"
    };
    let opening =
        format!("You haven't practiced in {days_since_last_attempt} {day_label}.");

    match weakest {
        None => format!("{opening} A quick session will keep your skills sharp."),
        Some(gap) => format!(
            "{opening} Your weakest area is {} (score: {}). A focused practice session could \
             help improve it.",
            gap.key, gap.score
        ),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InactivityContext {
    weakest: Option<SkillGap>,
    weakness_count: usize,
}

/// `coach/on-user-inactive`: turns an inactivity signal into a practice reminder.
pub struct OnUserInactive {
    directory: Arc<dyn Directory>,
    emitter: EventEmitter,
}

impl OnUserInactive {
    pub const ID: &'static str = "coach/on-user-inactive";

    pub fn new(directory: Arc<dyn Directory>, emitter: EventEmitter) -> Self {
        Self { directory, emitter }
    }

    async fn context(&self, org_id: Id, user_id: Id) -> Result<InactivityContext, Error> {
        let weaknesses = self.directory.weaknesses(org_id, user_id).await?;
        let weakness_count = weaknesses.len();
        let weakest = rank_gaps(weaknesses.iter().map(SkillGap::from).collect())
            .into_iter()
            .next();
        Ok(InactivityContext {
            weakest,
            weakness_count,
        })
    }
}

#[async_trait]
impl Subscriber for OnUserInactive {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn trigger(&self) -> EventName {
        EventName::UserInactive
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        steps: &StepContext,
    ) -> Result<Value, worker::Error> {
        let DomainEvent::UserInactive(inactive) = &envelope.event else {
            return Err(unexpected(Self::ID, envelope));
        };
        let days = inactive.days_since_last_attempt;

        let context = steps
            .run("fetch-context", || {
                self.context(inactive.org_id, inactive.user_id)
            })
            .await?;

        steps
            .run("log-activity", || {
                self.directory.log_activity(AgentActivity {
                    org_id: inactive.org_id,
                    user_id: Some(inactive.user_id),
                    agent_id: AGENT_ID.to_string(),
                    event_type: EventName::UserInactive.to_string(),
                    action: "send_practice_reminder".to_string(),
                    details: Some(json!({
                        "daysSinceLastAttempt": days,
                        "weaknessCount": context.weakness_count,
                    })),
                })
            })
            .await?;

        let message = reminder_message(context.weakest.as_ref(), days);
        let event_id = steps.idempotency_key("emit-recommendation");
        steps
            .run("emit-recommendation", || async {
                let envelope = self
                    .emitter
                    .emit_with_id(
                        event_id,
                        DomainEvent::CoachRecommendationReady(CoachRecommendationReady {
                            user_id: inactive.user_id,
                            org_id: inactive.org_id,
                            recommendation_type: "practice_reminder".to_string(),
                            scenario_id: None,
                            message,
                        }),
                    )
                    .await?;
                Ok::<_, Error>(envelope.id)
            })
            .await?;

        Ok(json!({"reminded": true, "daysSinceLastAttempt": days}))
    }
}

/// In-app content for one recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    /// App-relative path
    pub action_url: String,
}

/// `dispatch-coach-notification`: delivers `coach.recommendation.ready` to the trainee.
pub struct DispatchCoachNotification {
    directory: Arc<dyn Directory>,
    notifier: Notifier,
}

impl DispatchCoachNotification {
    pub const ID: &'static str = "dispatch-coach-notification";

    pub fn new(directory: Arc<dyn Directory>, notifier: Notifier) -> Self {
        Self {
            directory,
            notifier,
        }
    }

    /// A scenario link when the scenario still exists, otherwise the training hub.
    async fn scenario_path(&self, scenario_id: Option<Id>) -> String {
        let Some(scenario_id) = scenario_id else {
            return TRAINING_PATH.to_string();
        };

        match self.directory.scenario(scenario_id).await {
            Ok(_) => format!("{TRAINING_PATH}/scenarios/{scenario_id}"),
            Err(err) if err.is_not_found() => TRAINING_PATH.to_string(),
            Err(err) => {
                error!("Failed to verify scenario {scenario_id}: {err}");
                TRAINING_PATH.to_string()
            }
        }
    }

    pub async fn map_recommendation(
        &self,
        data: &CoachRecommendationReady,
    ) -> Option<NotificationContent> {
        let (notification_type, title, action_url) = match data.recommendation_type.as_str() {
            "next_scenario" => (
                NotificationType::CoachRecommendation,
                "Your coach recommends...",
                self.scenario_path(data.scenario_id).await,
            ),
            "practice_reminder" => (
                NotificationType::PracticeReminder,
                "Time to practice!",
                TRAINING_PATH.to_string(),
            ),
            "review_drill" => (
                NotificationType::CoachRecommendation,
                "Skill review due",
                self.scenario_path(data.scenario_id).await,
            ),
            "daily_digest" => (
                NotificationType::DailyDigest,
                "Your daily progress",
                "/dashboard".to_string(),
            ),
            _ => return None,
        };

        Some(NotificationContent {
            notification_type,
            title: title.to_string(),
            body: data.message.clone(),
            action_url,
        })
    }

    async fn send(
        &self,
        notification_id: Id,
        data: &CoachRecommendationReady,
        content: &NotificationContent,
    ) -> Result<SendNotificationResult, Error> {
        let (recipient_email, recipient_name) = match self.directory.user(data.user_id).await {
            Ok(user) => (Some(user.email.clone()), user.display_name()),
            Err(err) => {
                warn!(
                    "Could not load user {} for coach notification, skipping email: {err}",
                    data.user_id
                );
                (None, None)
            }
        };

        self.notifier
            .send_notification(SendNotification {
                id: Some(notification_id),
                user_id: data.user_id,
                org_id: data.org_id,
                notification_type: content.notification_type,
                title: content.title.clone(),
                body: content.body.clone(),
                action_url: Some(content.action_url.clone()),
                agent_id: Some(AGENT_ID.to_string()),
                metadata: None,
                recipient_email,
                recipient_name,
            })
            .await
    }
}

#[async_trait]
impl Subscriber for DispatchCoachNotification {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn trigger(&self) -> EventName {
        EventName::CoachRecommendationReady
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        steps: &StepContext,
    ) -> Result<Value, worker::Error> {
        let DomainEvent::CoachRecommendationReady(data) = &envelope.event else {
            return Err(unexpected(Self::ID, envelope));
        };

        let content = steps
            .run("map-recommendation", || async {
                Ok::<_, Error>(self.map_recommendation(data).await)
            })
            .await?;

        let Some(content) = content else {
            warn!(
                "Unknown recommendation type: {}",
                data.recommendation_type
            );
            return Ok(json!({"dispatched": false, "reason": "unknown_recommendation_type"}));
        };

        let notification_id = steps.idempotency_key("send-notification");
        let result = steps
            .run("send-notification", || {
                self.send(notification_id, data, &content)
            })
            .await?;

        steps
            .run("log-activity", || {
                self.directory.log_activity(AgentActivity {
                    org_id: data.org_id,
                    user_id: Some(data.user_id),
                    agent_id: AGENT_ID.to_string(),
                    event_type: EventName::CoachRecommendationReady.to_string(),
                    action: "dispatch_notification".to_string(),
                    details: Some(json!({
                        "recommendationType": data.recommendation_type,
                        "notificationId": result.notification_id,
                        "emailSent": result.email_sent,
                        "actionUrl": content.action_url,
                    })),
                })
            })
            .await?;

        Ok(json!({
            "dispatched": true,
            "notificationId": result.notification_id,
            "emailSent": result.email_sent,
        }))
    }
}
