//! In-memory stand-ins for the stores and collaborators behind the domain's
//! trait seams. Test-only.

use crate::directory::{AgentActivity, Directory, LastCompleted};
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::gateway::{EmailTransport, OutboundEmail, TextGenerator};
use crate::notification::{NotificationPreferences, NotificationStore};
use crate::webhook::payload::{WebhookEventType, WebhookPayload, WebhookPayloadBuilder};
use crate::webhook::WebhookStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use entity_api::delivery_status::DeliveryStatus;
use entity_api::notification::NewNotification;
use entity_api::notifications::CHANNEL_IN_APP;
use entity_api::role::Role;
use entity_api::user_memories::MEMORY_TYPE_WEAKNESS;
use entity_api::webhook_delivery::truncate_body;
use entity_api::{
    notifications, organizations, scenario_attempts, scenarios, subscriber_runs, user_memories,
    users, webhook_deliveries, webhooks, Id,
};
use events::{EventEnvelope, EventQueue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use worker::ledger::{ClaimedRun, NewRun, RunLedger};
use worker::{MemoryLedger, StepContext, WorkerErrorKind};

fn unreachable_collaborator(what: &str) -> Error {
    Error {
        source: Some(format!("{what} unavailable").into()),
        error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
    }
}

pub(crate) fn scenario_model(
    org_id: Option<Id>,
    title: &str,
    difficulty: Option<&str>,
    rubric: Option<Value>,
) -> scenarios::Model {
    scenarios::Model {
        id: Id::new_v4(),
        org_id,
        title: title.to_string(),
        description: None,
        difficulty: difficulty.map(str::to_string),
        rubric,
        status: scenarios::STATUS_ACTIVE.to_string(),
        visibility: if org_id.is_some() { "org" } else { "universal" }.to_string(),
        created_at: Utc::now().fixed_offset(),
    }
}

pub(crate) fn payload(org_id: Id, event: WebhookEventType) -> WebhookPayload {
    let now = Utc::now();
    let org = organizations::Model {
        id: org_id,
        name: "Acme".to_string(),
        created_at: now.fixed_offset(),
        updated_at: now.fixed_offset(),
    };
    WebhookPayloadBuilder::new(event, &org, now).build()
}

#[derive(Default)]
struct Fixtures {
    organizations: Vec<organizations::Model>,
    users: Vec<users::Model>,
    scenarios: Vec<scenarios::Model>,
    attempts: Vec<scenario_attempts::Model>,
    memories: Vec<user_memories::Model>,
    activities: Vec<AgentActivity>,
    completed_counts: HashMap<Id, u64>,
    prior_scores: HashMap<Id, Vec<f64>>,
}

/// A [`Directory`] backed by vectors. Attempts added later are newer.
#[derive(Default)]
pub(crate) struct FixtureDirectory {
    fixtures: Mutex<Fixtures>,
}

impl FixtureDirectory {
    pub fn add_org(&self, name: &str) -> organizations::Model {
        let now = Utc::now().fixed_offset();
        let org = organizations::Model {
            id: Id::new_v4(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.fixtures.lock().unwrap().organizations.push(org.clone());
        org
    }

    pub fn add_user(&self, org_id: Id, role: Role, first_name: Option<&str>) -> users::Model {
        let id = Id::new_v4();
        let now = Utc::now().fixed_offset();
        let user = users::Model {
            id,
            org_id,
            email: format!("user-{}@example.com", id.simple()),
            first_name: first_name.map(str::to_string),
            last_name: None,
            role,
            created_at: now,
            updated_at: now,
        };
        self.fixtures.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn add_scenario(
        &self,
        org_id: Option<Id>,
        title: &str,
        difficulty: Option<&str>,
        rubric: Option<Value>,
    ) -> scenarios::Model {
        let scenario = scenario_model(org_id, title, difficulty, rubric);
        self.fixtures.lock().unwrap().scenarios.push(scenario.clone());
        scenario
    }

    /// A completed attempt started after every attempt added before it.
    pub fn add_attempt(
        &self,
        user_id: Id,
        scenario_id: Id,
        score: Option<f64>,
    ) -> scenario_attempts::Model {
        let offset = i64::try_from(self.fixtures.lock().unwrap().attempts.len()).unwrap();
        let started_at = Utc::now() - Duration::hours(1) + Duration::seconds(offset);
        self.add_attempt_at(user_id, scenario_id, score, started_at)
    }

    /// A completed attempt in the user's org started at `started_at`.
    pub fn add_attempt_at(
        &self,
        user_id: Id,
        scenario_id: Id,
        score: Option<f64>,
        started_at: DateTime<Utc>,
    ) -> scenario_attempts::Model {
        let mut fixtures = self.fixtures.lock().unwrap();
        let org_id = fixtures
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.org_id)
            .unwrap_or_else(Id::new_v4);
        let attempt = scenario_attempts::Model {
            id: Id::new_v4(),
            org_id,
            user_id,
            scenario_id,
            status: scenario_attempts::STATUS_COMPLETED.to_string(),
            score,
            started_at: started_at.fixed_offset(),
            duration_seconds: Some(300),
        };
        fixtures.attempts.push(attempt.clone());
        attempt
    }

    pub fn add_weakness(&self, org_id: Id, user_id: Id, key: &str, score: f64, trend: &str) {
        self.fixtures
            .lock()
            .unwrap()
            .memories
            .push(user_memories::Model {
                id: Id::new_v4(),
                org_id,
                user_id,
                memory_type: MEMORY_TYPE_WEAKNESS.to_string(),
                key: key.to_string(),
                score: Some(score),
                trend: Some(trend.to_string()),
                evidence_count: 3,
                updated_at: Utc::now().fixed_offset(),
            });
    }

    /// Overrides the live count of completed, scored attempts.
    pub fn set_completed_count(&self, user_id: Id, count: u64) {
        self.fixtures
            .lock()
            .unwrap()
            .completed_counts
            .insert(user_id, count);
    }

    /// Overrides prior scores, newest first.
    pub fn set_prior_scores(&self, user_id: Id, scores: Vec<f64>) {
        self.fixtures
            .lock()
            .unwrap()
            .prior_scores
            .insert(user_id, scores);
    }

    pub fn activities(&self) -> Vec<AgentActivity> {
        self.fixtures.lock().unwrap().activities.clone()
    }

    fn attempts_newest_first(&self, org_id: Id, user_id: Id) -> Vec<scenario_attempts::Model> {
        let mut attempts: Vec<_> = self
            .fixtures
            .lock()
            .unwrap()
            .attempts
            .iter()
            .filter(|a| a.org_id == org_id && a.user_id == user_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        attempts
    }
}

#[async_trait]
impl Directory for FixtureDirectory {
    async fn organization(&self, org_id: Id) -> Result<organizations::Model, Error> {
        let fixtures = self.fixtures.lock().unwrap();
        fixtures
            .organizations
            .iter()
            .find(|o| o.id == org_id)
            .cloned()
            .ok_or_else(Error::not_found)
    }

    async fn user(&self, user_id: Id) -> Result<users::Model, Error> {
        let fixtures = self.fixtures.lock().unwrap();
        fixtures
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(Error::not_found)
    }

    async fn users_with_role(&self, org_id: Id, role: Role) -> Result<Vec<users::Model>, Error> {
        let fixtures = self.fixtures.lock().unwrap();
        Ok(fixtures
            .users
            .iter()
            .filter(|u| u.org_id == org_id && u.role == role)
            .cloned()
            .collect())
    }

    async fn scenario(&self, scenario_id: Id) -> Result<scenarios::Model, Error> {
        let fixtures = self.fixtures.lock().unwrap();
        fixtures
            .scenarios
            .iter()
            .find(|s| s.id == scenario_id)
            .cloned()
            .ok_or_else(Error::not_found)
    }

    async fn active_scenarios(&self, org_id: Id) -> Result<Vec<scenarios::Model>, Error> {
        let fixtures = self.fixtures.lock().unwrap();
        Ok(fixtures
            .scenarios
            .iter()
            .filter(|s| s.status == scenarios::STATUS_ACTIVE)
            .filter(|s| s.org_id.map_or(true, |owner| owner == org_id))
            .cloned()
            .collect())
    }

    async fn recent_scores(
        &self,
        org_id: Id,
        user_id: Id,
        exclude_attempt_id: Id,
        limit: u64,
    ) -> Result<Vec<f64>, Error> {
        let limit = usize::try_from(limit).unwrap();
        if let Some(scores) = self.fixtures.lock().unwrap().prior_scores.get(&user_id) {
            return Ok(scores.iter().copied().take(limit).collect());
        }
        Ok(self
            .attempts_newest_first(org_id, user_id)
            .into_iter()
            .filter(|a| a.id != exclude_attempt_id)
            .filter_map(|a| a.score)
            .take(limit)
            .collect())
    }

    async fn completed_scored_count(&self, org_id: Id, user_id: Id) -> Result<u64, Error> {
        if let Some(count) = self.fixtures.lock().unwrap().completed_counts.get(&user_id) {
            return Ok(*count);
        }
        let scored = self
            .attempts_newest_first(org_id, user_id)
            .iter()
            .filter(|a| a.score.is_some())
            .count();
        Ok(u64::try_from(scored).unwrap())
    }

    async fn attempt_counts_since(
        &self,
        org_id: Id,
        user_id: Id,
        since: DateTime<Utc>,
    ) -> Result<HashMap<Id, u32>, Error> {
        let mut counts = HashMap::new();
        for attempt in self.attempts_newest_first(org_id, user_id) {
            if attempt.started_at >= since {
                *counts.entry(attempt.scenario_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn recent_attempts(
        &self,
        org_id: Id,
        user_id: Id,
        scenario_id: Id,
        limit: u64,
    ) -> Result<Vec<scenario_attempts::Model>, Error> {
        Ok(self
            .attempts_newest_first(org_id, user_id)
            .into_iter()
            .filter(|a| a.scenario_id == scenario_id)
            .take(usize::try_from(limit).unwrap())
            .collect())
    }

    async fn last_completed_attempts(&self) -> Result<Vec<LastCompleted>, Error> {
        let fixtures = self.fixtures.lock().unwrap();
        let mut latest: HashMap<(Id, Id), LastCompleted> = HashMap::new();
        for attempt in fixtures
            .attempts
            .iter()
            .filter(|a| a.status == scenario_attempts::STATUS_COMPLETED)
        {
            latest
                .entry((attempt.org_id, attempt.user_id))
                .and_modify(|last| {
                    if attempt.started_at > last.last_attempt_at {
                        last.last_attempt_at = attempt.started_at;
                    }
                })
                .or_insert(LastCompleted {
                    org_id: attempt.org_id,
                    user_id: attempt.user_id,
                    last_attempt_at: attempt.started_at,
                });
        }
        Ok(latest.into_values().collect())
    }

    async fn active_trainees(&self, since: DateTime<Utc>) -> Result<Vec<(Id, Id)>, Error> {
        let fixtures = self.fixtures.lock().unwrap();
        let mut pairs: Vec<(Id, Id)> = fixtures
            .attempts
            .iter()
            .filter(|a| a.status == scenario_attempts::STATUS_COMPLETED && a.started_at >= since)
            .map(|a| (a.org_id, a.user_id))
            .collect();
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }

    async fn completed_attempts_since(
        &self,
        org_id: Id,
        user_id: Id,
        since: DateTime<Utc>,
    ) -> Result<Vec<scenario_attempts::Model>, Error> {
        Ok(self
            .attempts_newest_first(org_id, user_id)
            .into_iter()
            .filter(|a| a.status == scenario_attempts::STATUS_COMPLETED && a.started_at >= since)
            .collect())
    }

    async fn weaknesses(
        &self,
        org_id: Id,
        user_id: Id,
    ) -> Result<Vec<user_memories::Model>, Error> {
        let fixtures = self.fixtures.lock().unwrap();
        Ok(fixtures
            .memories
            .iter()
            .filter(|m| m.org_id == org_id && m.user_id == user_id)
            .filter(|m| m.memory_type == MEMORY_TYPE_WEAKNESS)
            .cloned()
            .collect())
    }

    async fn log_activity(&self, activity: AgentActivity) -> Result<(), Error> {
        self.fixtures.lock().unwrap().activities.push(activity);
        Ok(())
    }
}

/// A [`NotificationStore`] that keeps created rows in memory.
#[derive(Default)]
pub(crate) struct RecordingNotifications {
    preferences: Option<NotificationPreferences>,
    fail_preferences: bool,
    fail_create: bool,
    rows: Mutex<Vec<notifications::Model>>,
}

impl RecordingNotifications {
    pub fn with_preferences(preferences: NotificationPreferences) -> Self {
        Self {
            preferences: Some(preferences),
            ..Default::default()
        }
    }

    pub fn failing_preferences() -> Self {
        Self {
            fail_preferences: true,
            ..Default::default()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn created(&self) -> Vec<notifications::Model> {
        self.rows.lock().unwrap().clone()
    }

    pub fn channels_for(&self, notification_id: Id) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == notification_id)
            .map(|n| n.channels_sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationStore for RecordingNotifications {
    async fn preferences(
        &self,
        _org_id: Id,
        _user_id: Id,
    ) -> Result<Option<NotificationPreferences>, Error> {
        if self.fail_preferences {
            return Err(unreachable_collaborator("preferences"));
        }
        Ok(self.preferences.clone())
    }

    async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<notifications::Model, Error> {
        if self.fail_create {
            return Err(unreachable_collaborator("notifications table"));
        }
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.iter().find(|n| n.id == new.id) {
            return Ok(existing.clone());
        }
        let now = Utc::now().fixed_offset();
        let row = notifications::Model {
            id: new.id,
            org_id: new.org_id,
            user_id: new.user_id,
            notification_type: new.notification_type,
            title: new.title,
            body: new.body,
            action_url: new.action_url,
            agent_id: new.agent_id,
            read: false,
            channels_sent: vec![CHANNEL_IN_APP.to_string()],
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn append_channel(&self, notification_id: Id, channel: &str) -> Result<(), Error> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(Error::not_found)?;
        if !row.channels_sent.iter().any(|c| c == channel) {
            row.channels_sent.push(channel.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingEmail {
    failing: bool,
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingEmail {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingEmail {
    async fn send(&self, email: OutboundEmail) -> Result<Option<String>, Error> {
        if self.failing {
            return Err(unreachable_collaborator("email transport"));
        }
        self.sent.lock().unwrap().push(email);
        Ok(Some(format!("msg-{}", Id::new_v4().simple())))
    }
}

/// A [`TextGenerator`] with a canned reply that records every prompt.
#[derive(Default)]
pub(crate) struct RecordingText {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingText {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for RecordingText {
    async fn generate(&self, prompt: &str, _max_output_tokens: u32) -> Result<String, Error> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| unreachable_collaborator("text generator"))
    }
}

#[derive(Default)]
pub(crate) struct RecordingQueue {
    published: Mutex<Vec<EventEnvelope>>,
}

impl RecordingQueue {
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventQueue for RecordingQueue {
    async fn enqueue(&self, envelope: &EventEnvelope) -> Result<(), events::Error> {
        let mut published = self.published.lock().unwrap();
        if !published.iter().any(|e| e.id == envelope.id) {
            published.push(envelope.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
struct WebhookTables {
    webhooks: HashMap<Id, webhooks::Model>,
    /// Insertion order is creation order
    deliveries: Vec<webhook_deliveries::Model>,
}

/// A [`WebhookStore`] over two in-memory tables.
#[derive(Default)]
pub(crate) struct MemoryWebhooks {
    tables: Mutex<WebhookTables>,
}

impl MemoryWebhooks {
    /// An enabled webhook with 3 retries and a 30 second timeout.
    pub fn add_webhook(&self, org_id: Id, url: String, events: &[&str]) -> Id {
        let now = Utc::now().fixed_offset();
        let id = Id::new_v4();
        let model = webhooks::Model {
            id,
            org_id,
            name: "Test endpoint".to_string(),
            url,
            secret: format!("whsec_{}", id.simple()),
            events: events.iter().map(|e| e.to_string()).collect(),
            enabled: true,
            retry_attempts: webhooks::DEFAULT_RETRY_ATTEMPTS,
            timeout_seconds: webhooks::DEFAULT_TIMEOUT_SECONDS,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().webhooks.insert(id, model);
        id
    }

    pub fn webhook(&self, webhook_id: Id) -> Option<webhooks::Model> {
        self.tables.lock().unwrap().webhooks.get(&webhook_id).cloned()
    }

    pub fn put_webhook(&self, model: webhooks::Model) {
        self.tables.lock().unwrap().webhooks.insert(model.id, model);
    }

    pub fn delivery(&self, delivery_id: Id) -> Option<webhook_deliveries::Model> {
        self.tables
            .lock()
            .unwrap()
            .deliveries
            .iter()
            .find(|d| d.id == delivery_id)
            .cloned()
    }

    pub fn delivery_count(&self) -> usize {
        self.tables.lock().unwrap().deliveries.len()
    }

    pub fn add_failed_delivery(&self, webhook_id: Id, event_type: &str, payload: Value) -> Id {
        let now = Utc::now().fixed_offset();
        let id = Id::new_v4();
        self.tables
            .lock()
            .unwrap()
            .deliveries
            .push(webhook_deliveries::Model {
                id,
                webhook_id,
                event_type: event_type.to_string(),
                payload,
                attempt_count: 1,
                status: DeliveryStatus::Failed,
                response_status: Some(500),
                response_body: Some("upstream error".to_string()),
                error_message: None,
                delivered_at: None,
                created_at: now,
                updated_at: now,
            });
        id
    }

    fn update_delivery(
        &self,
        delivery_id: Id,
        change: impl FnOnce(&mut webhook_deliveries::Model),
    ) -> Result<(), Error> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .deliveries
            .iter_mut()
            .find(|d| d.id == delivery_id)
            .ok_or_else(Error::not_found)?;
        change(row);
        row.updated_at = Utc::now().fixed_offset();
        Ok(())
    }
}

#[async_trait]
impl WebhookStore for MemoryWebhooks {
    async fn enabled_for_event(
        &self,
        org_id: Id,
        event_type: &str,
    ) -> Result<Vec<webhooks::Model>, Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .webhooks
            .values()
            .filter(|w| w.org_id == org_id && w.enabled)
            .filter(|w| w.events.iter().any(|e| e == event_type))
            .cloned()
            .collect())
    }

    async fn find_webhook(&self, org_id: Id, webhook_id: Id) -> Result<webhooks::Model, Error> {
        self.webhook(webhook_id)
            .filter(|w| w.org_id == org_id)
            .ok_or_else(Error::not_found)
    }

    async fn update_secret(
        &self,
        org_id: Id,
        webhook_id: Id,
        secret: String,
    ) -> Result<webhooks::Model, Error> {
        let mut tables = self.tables.lock().unwrap();
        let webhook = tables
            .webhooks
            .get_mut(&webhook_id)
            .filter(|w| w.org_id == org_id)
            .ok_or_else(Error::not_found)?;
        webhook.secret = secret;
        Ok(webhook.clone())
    }

    async fn create_delivery(
        &self,
        delivery_id: Id,
        webhook_id: Id,
        event_type: &str,
        payload: Value,
    ) -> Result<(), Error> {
        let now = Utc::now().fixed_offset();
        self.tables
            .lock()
            .unwrap()
            .deliveries
            .push(webhook_deliveries::Model {
                id: delivery_id,
                webhook_id,
                event_type: event_type.to_string(),
                payload,
                attempt_count: 1,
                status: DeliveryStatus::Pending,
                response_status: None,
                response_body: None,
                error_message: None,
                delivered_at: None,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn record_attempt(&self, delivery_id: Id, attempt_count: i32) -> Result<(), Error> {
        self.update_delivery(delivery_id, |row| row.attempt_count = attempt_count)
    }

    async fn record_response(
        &self,
        delivery_id: Id,
        status: u16,
        body: &str,
    ) -> Result<(), Error> {
        let success = (200..300).contains(&status);
        self.update_delivery(delivery_id, |row| {
            row.status = if success {
                DeliveryStatus::Success
            } else {
                DeliveryStatus::Failed
            };
            row.response_status = Some(i32::from(status));
            row.response_body = Some(truncate_body(body));
            row.error_message = None;
            row.delivered_at = success.then(|| Utc::now().fixed_offset());
        })
    }

    async fn record_failure(&self, delivery_id: Id, error_message: &str) -> Result<(), Error> {
        self.update_delivery(delivery_id, |row| {
            row.status = DeliveryStatus::Failed;
            row.error_message = Some(error_message.to_string());
            row.delivered_at = None;
        })
    }

    async fn find_delivery(&self, delivery_id: Id) -> Result<webhook_deliveries::Model, Error> {
        self.delivery(delivery_id).ok_or_else(Error::not_found)
    }

    async fn deliveries_for(
        &self,
        webhook_id: Id,
        limit: u64,
    ) -> Result<Vec<webhook_deliveries::Model>, Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .deliveries
            .iter()
            .rev()
            .filter(|d| d.webhook_id == webhook_id)
            .take(usize::try_from(limit).unwrap())
            .cloned()
            .collect())
    }
}

/// A [`MemoryLedger`] that loses the first checkpoint written for one step,
/// as if the process died right after the step's side effect.
pub(crate) struct FlakyCheckpoints {
    inner: MemoryLedger,
    step: &'static str,
    failed: AtomicBool,
}

impl FlakyCheckpoints {
    pub fn failing_once(step: &'static str) -> Self {
        Self {
            inner: MemoryLedger::new(),
            step,
            failed: AtomicBool::new(false),
        }
    }

    /// Steps for one run whose checkpoints go through this ledger.
    pub fn steps(self: &Arc<Self>) -> StepContext {
        StepContext::new(Id::new_v4(), 1, Arc::clone(self) as Arc<dyn RunLedger>)
    }
}

#[async_trait]
impl RunLedger for FlakyCheckpoints {
    async fn enqueue(&self, event: &EventEnvelope, runs: &[NewRun]) -> Result<(), worker::Error> {
        self.inner.enqueue(event, runs).await
    }

    async fn claim_due(&self, limit: u64) -> Result<Vec<ClaimedRun>, worker::Error> {
        self.inner.claim_due(limit).await
    }

    async fn extend_lease(&self, run_id: Id) -> Result<bool, worker::Error> {
        self.inner.extend_lease(run_id).await
    }

    async fn complete(&self, run_id: Id, output: Value) -> Result<(), worker::Error> {
        self.inner.complete(run_id, output).await
    }

    async fn reschedule(
        &self,
        run_id: Id,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), worker::Error> {
        self.inner.reschedule(run_id, error, next_attempt_at).await
    }

    async fn fail(&self, run_id: Id, error: &str) -> Result<(), worker::Error> {
        self.inner.fail(run_id, error).await
    }

    async fn load_checkpoint(&self, run_id: Id, step: &str) -> Result<Option<Value>, worker::Error> {
        self.inner.load_checkpoint(run_id, step).await
    }

    async fn save_checkpoint(
        &self,
        run_id: Id,
        step: &str,
        output: Value,
    ) -> Result<(), worker::Error> {
        if step == self.step && !self.failed.swap(true, Ordering::SeqCst) {
            return Err(worker::Error {
                source: Some(format!("checkpoint for '{step}' lost").into()),
                error_kind: WorkerErrorKind::Ledger,
            });
        }
        self.inner.save_checkpoint(run_id, step, output).await
    }

    async fn failed_runs(&self, limit: u64) -> Result<Vec<subscriber_runs::Model>, worker::Error> {
        self.inner.failed_runs(limit).await
    }

    async fn replay(&self, run_id: Id) -> Result<subscriber_runs::Model, worker::Error> {
        self.inner.replay(run_id).await
    }
}
