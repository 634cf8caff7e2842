//! Subscribers driven by cron ticks: the inactivity sweep that feeds
//! `user.inactive` and the daily digest that feeds `coach.recommendation.ready`.
//!
//! Both read the tick's `firedAt` as "now", so a retried run sees the same
//! window as the first attempt.

use super::digest::{format_digest_message, generate_trainee_digest, TraineeDigest};
use super::subscribers::AGENT_ID;
use crate::directory::{AgentActivity, Directory};
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use entity_api::Id;
use events::payload::{CoachRecommendationReady, ScheduleFired, UserInactive};
use events::{DomainEvent, EventEmitter, EventEnvelope, EventName};
use log::*;
use serde_json::{json, Value};
use std::sync::Arc;
use worker::{StepContext, Subscriber};

/// Whole days without a completed attempt before a trainee counts as inactive.
pub const INACTIVITY_THRESHOLD_DAYS: i64 = 3;

/// Trainees with a completed attempt this recent get a digest.
pub const ACTIVE_WINDOW_DAYS: i64 = 14;

fn tick<'a>(
    subscriber: &str,
    envelope: &'a EventEnvelope,
) -> Result<&'a ScheduleFired, worker::Error> {
    match &envelope.event {
        DomainEvent::ScheduleFired(tick) => Ok(tick),
        _ => Err(worker::Error::handler(format!(
            "{subscriber} received {}",
            envelope.name()
        ))),
    }
}

fn fired_at(tick: &ScheduleFired) -> Result<DateTime<Utc>, worker::Error> {
    DateTime::parse_from_rfc3339(&tick.fired_at)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| worker::Error::handler(format!("invalid firedAt {}: {e}", tick.fired_at)))
}

fn for_schedule(event: &DomainEvent, schedule: &str) -> bool {
    matches!(event, DomainEvent::ScheduleFired(tick) if tick.schedule == schedule)
}

/// `coach/detect-inactive-users`: finds trainees whose last completed attempt
/// is at least [`INACTIVITY_THRESHOLD_DAYS`] old and emits `user.inactive`
/// for each.
pub struct DetectInactiveUsers {
    directory: Arc<dyn Directory>,
    emitter: EventEmitter,
}

impl DetectInactiveUsers {
    pub const ID: &'static str = "coach/detect-inactive-users";
    pub const SCHEDULE: &'static str = "detect-inactive-users";

    pub fn new(directory: Arc<dyn Directory>, emitter: EventEmitter) -> Self {
        Self { directory, emitter }
    }

    async fn find_inactive(&self, now: DateTime<Utc>) -> Result<Vec<UserInactive>, Error> {
        let mut inactive: Vec<UserInactive> = self
            .directory
            .last_completed_attempts()
            .await?
            .into_iter()
            .filter_map(|last| {
                let last_attempt_at = last.last_attempt_at.with_timezone(&Utc);
                let days = (now - last_attempt_at).num_days();
                (days >= INACTIVITY_THRESHOLD_DAYS).then(|| UserInactive {
                    user_id: last.user_id,
                    org_id: last.org_id,
                    last_attempt_at: last_attempt_at.to_rfc3339(),
                    days_since_last_attempt: days as f64,
                })
            })
            .collect();
        inactive.sort_by_key(|user| (user.org_id, user.user_id));
        Ok(inactive)
    }
}

#[async_trait]
impl Subscriber for DetectInactiveUsers {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn trigger(&self) -> EventName {
        EventName::ScheduleFired
    }

    fn accepts(&self, event: &DomainEvent) -> bool {
        for_schedule(event, Self::SCHEDULE)
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        steps: &StepContext,
    ) -> Result<Value, worker::Error> {
        let now = fired_at(tick(Self::ID, envelope)?)?;

        let inactive = steps
            .run("query-inactive-users", || self.find_inactive(now))
            .await?;

        if inactive.is_empty() {
            return Ok(json!({"detectedCount": 0}));
        }

        steps
            .run("emit-inactive-events", || async {
                for user in &inactive {
                    let event_id = steps.idempotency_key(&format!(
                        "emit-inactive-events/{}/{}",
                        user.org_id, user.user_id
                    ));
                    self.emitter
                        .emit_with_id(event_id, DomainEvent::UserInactive(user.clone()))
                        .await?;
                }
                Ok::<_, Error>(inactive.len())
            })
            .await?;

        info!("Detected {} inactive trainees", inactive.len());
        Ok(json!({"detectedCount": inactive.len()}))
    }
}

/// `coach/send-daily-digest`: one `daily_digest` recommendation per trainee
/// active in the last [`ACTIVE_WINDOW_DAYS`] days.
pub struct SendDailyDigest {
    directory: Arc<dyn Directory>,
    emitter: EventEmitter,
}

impl SendDailyDigest {
    pub const ID: &'static str = "coach/send-daily-digest";
    pub const SCHEDULE: &'static str = "send-daily-digest";

    pub fn new(directory: Arc<dyn Directory>, emitter: EventEmitter) -> Self {
        Self { directory, emitter }
    }

    async fn log_and_emit(
        &self,
        event_id: Id,
        org_id: Id,
        user_id: Id,
        digest: &TraineeDigest,
    ) -> Result<Id, Error> {
        self.directory
            .log_activity(AgentActivity {
                org_id,
                user_id: Some(user_id),
                agent_id: AGENT_ID.to_string(),
                event_type: "daily_digest".to_string(),
                action: "generate_daily_digest".to_string(),
                details: Some(json!({
                    "attempts": digest.attempts,
                    "avgScore": digest.avg_score,
                    "trend": digest.trend,
                    "noRecentActivity": digest.no_recent_activity,
                    "streak": digest.streak,
                })),
            })
            .await?;

        let envelope = self
            .emitter
            .emit_with_id(
                event_id,
                DomainEvent::CoachRecommendationReady(CoachRecommendationReady {
                    user_id,
                    org_id,
                    recommendation_type: "daily_digest".to_string(),
                    scenario_id: None,
                    message: format_digest_message(digest),
                }),
            )
            .await?;
        Ok(envelope.id)
    }
}

#[async_trait]
impl Subscriber for SendDailyDigest {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn trigger(&self) -> EventName {
        EventName::ScheduleFired
    }

    fn accepts(&self, event: &DomainEvent) -> bool {
        for_schedule(event, Self::SCHEDULE)
    }

    async fn handle(
        &self,
        envelope: &EventEnvelope,
        steps: &StepContext,
    ) -> Result<Value, worker::Error> {
        let now = fired_at(tick(Self::ID, envelope)?)?;
        let since = now - Duration::days(ACTIVE_WINDOW_DAYS);

        let trainees = steps
            .run("find-active-trainees", || self.directory.active_trainees(since))
            .await?;

        let mut digests_sent = 0;
        for (org_id, user_id) in &trainees {
            let digest = steps
                .run(&format!("generate-digest-{org_id}-{user_id}"), || {
                    generate_trainee_digest(self.directory.as_ref(), *org_id, *user_id, now)
                })
                .await?;

            let step = format!("log-and-emit-{org_id}-{user_id}");
            let event_id = steps.idempotency_key(&step);
            steps
                .run(&step, || {
                    self.log_and_emit(event_id, *org_id, *user_id, &digest)
                })
                .await?;
            digests_sent += 1;
        }

        info!("Sent {digests_sent} daily digests");
        Ok(json!({"activeTrainees": trainees.len(), "digestsSent": digests_sent}))
    }
}
