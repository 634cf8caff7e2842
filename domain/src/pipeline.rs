//! Wires the ledger, durable queue, emitter and every subscriber into one
//! runnable pipeline.

use crate::alerts::ManagerAlerts;
use crate::assignment::AssignmentNotifications;
use crate::coach::{
    DetectInactiveUsers, DispatchCoachNotification, OnAttemptScored, OnUserInactive,
    SendDailyDigest,
};
use crate::directory::Directory;
use crate::error::Error;
use crate::gateway::{gemini::GeminiClient, mailersend::MailerSendClient};
use crate::gateway::{EmailTransport, TextGenerator};
use crate::notification::{NotificationStore, Notifier};
use crate::webhook::{WebhookDispatcher, WebhookRelay, WebhookStore};
use events::EventEmitter;
use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::sync::Arc;
use std::time::Duration;
use worker::{
    start_scheduler, Backoff, CronSchedule, DurableQueue, JobScheduler, PostgresLedger, Registry,
    RunLedger, Runtime, RuntimeConfig,
};

/// Collaborators the pipeline is assembled from.
pub struct Collaborators {
    pub directory: Arc<dyn Directory>,
    pub notifications: Arc<dyn NotificationStore>,
    pub webhooks: Arc<dyn WebhookStore>,
    pub email: Arc<dyn EmailTransport>,
    pub text: Arc<dyn TextGenerator>,
    pub ledger: Arc<dyn RunLedger>,
}

#[derive(Clone)]
pub struct Pipeline {
    pub emitter: EventEmitter,
    pub notifier: Notifier,
    pub dispatcher: WebhookDispatcher,
    pub directory: Arc<dyn Directory>,
    pub text: Arc<dyn TextGenerator>,
    pub registry: Arc<Registry>,
    pub runtime: Runtime,
}

fn retry_backoff(config: &Config) -> Backoff {
    Backoff::new(
        Duration::from_millis(config.retry_backoff_base_ms),
        Duration::from_secs(config.retry_backoff_max_secs),
    )
}

fn runtime_config(config: &Config) -> RuntimeConfig {
    // Three heartbeats per lease
    let heartbeat_secs = (config.worker_lease_secs / 3).max(1);
    RuntimeConfig {
        concurrency: config.worker_concurrency,
        batch_size: config.worker_batch_size,
        poll_interval: Duration::from_millis(config.worker_poll_interval_ms),
        heartbeat_interval: Duration::from_secs(heartbeat_secs),
        backoff: retry_backoff(config),
    }
}

/// Cron ticks the scheduled subscribers listen for.
pub fn schedules(config: &Config) -> Vec<CronSchedule> {
    vec![
        CronSchedule::new(
            DetectInactiveUsers::SCHEDULE,
            config.detect_inactive_users_cron.clone(),
        ),
        CronSchedule::new(SendDailyDigest::SCHEDULE, config.daily_digest_cron.clone()),
    ]
}

impl Pipeline {
    /// Production pipeline over Postgres, MailerSend and Gemini.
    pub fn connect(config: &Config, db: Arc<DatabaseConnection>) -> Result<Self, Error> {
        let lease = Duration::from_secs(config.worker_lease_secs);

        let collaborators = Collaborators {
            directory: db.clone(),
            notifications: db.clone(),
            webhooks: db.clone(),
            email: Arc::new(MailerSendClient::new(config)?),
            text: Arc::new(GeminiClient::new(config)?),
            ledger: Arc::new(PostgresLedger::new(db, lease)),
        };

        Self::assemble(config, collaborators)
    }

    pub fn assemble(config: &Config, collaborators: Collaborators) -> Result<Self, Error> {
        let Collaborators {
            directory,
            notifications,
            webhooks,
            email,
            text,
            ledger,
        } = collaborators;

        // Subscribers emit through the queue, so it exists before the registry.
        let queue = Arc::new(DurableQueue::unbound(ledger.clone()));
        let emitter = EventEmitter::new(queue.clone());

        let notifier = Notifier::new(notifications, email, config.frontend_base_url());
        let dispatcher = WebhookDispatcher::new(webhooks, retry_backoff(config))?;

        let mut registry = Registry::new()
            .with_subscriber(Arc::new(ManagerAlerts::new(
                directory.clone(),
                notifier.clone(),
            )))
            .with_subscriber(Arc::new(OnAttemptScored::new(
                directory.clone(),
                emitter.clone(),
            )))
            .with_subscriber(Arc::new(OnUserInactive::new(
                directory.clone(),
                emitter.clone(),
            )))
            .with_subscriber(Arc::new(DispatchCoachNotification::new(
                directory.clone(),
                notifier.clone(),
            )))
            .with_subscriber(Arc::new(DetectInactiveUsers::new(
                directory.clone(),
                emitter.clone(),
            )))
            .with_subscriber(Arc::new(SendDailyDigest::new(
                directory.clone(),
                emitter.clone(),
            )));

        for relay in WebhookRelay::all(dispatcher.clone(), directory.clone()) {
            registry = registry.with_subscriber(relay);
        }
        for notice in AssignmentNotifications::all(directory.clone(), notifier.clone()) {
            registry = registry.with_subscriber(notice);
        }

        let registry = Arc::new(registry);
        queue.bind(registry.clone());
        info!("Registered {} subscribers", registry.len());

        let runtime = Runtime::new(ledger, registry.clone(), runtime_config(config));

        Ok(Self {
            emitter,
            notifier,
            dispatcher,
            directory,
            text,
            registry,
            runtime,
        })
    }

    pub fn ledger(&self) -> Arc<dyn RunLedger> {
        self.runtime.ledger()
    }

    /// Starts the cron jobs that emit `schedule.fired` ticks.
    pub async fn start_scheduler(&self, config: &Config) -> Result<JobScheduler, Error> {
        Ok(start_scheduler(self.emitter.clone(), &schedules(config)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FixtureDirectory, MemoryWebhooks, RecordingEmail, RecordingNotifications, RecordingText,
    };
    use entity_api::Id;
    use chrono::{TimeZone, Utc};
    use events::payload::{AssignmentCreated, AttemptScored};
    use events::DomainEvent;
    use serde_json::Map;
    use worker::MemoryLedger;

    fn pipeline(ledger: Arc<MemoryLedger>) -> Pipeline {
        let config = Config::from_args(["coaching_pipeline"]).unwrap();
        Pipeline::assemble(
            &config,
            Collaborators {
                directory: Arc::new(FixtureDirectory::default()),
                notifications: Arc::new(RecordingNotifications::default()),
                webhooks: Arc::new(MemoryWebhooks::default()),
                email: Arc::new(RecordingEmail::default()),
                text: Arc::new(RecordingText::replying("Go get them.")),
                ledger,
            },
        )
        .unwrap()
    }

    #[test]
    fn every_subscriber_is_registered_once() {
        let pipeline = pipeline(Arc::new(MemoryLedger::new()));

        // manager alerts, five coach subscribers, five relays, two assignment notices
        assert_eq!(pipeline.registry.len(), 13);
        assert!(pipeline.registry.get("manager-alerts").is_some());
        assert!(pipeline
            .registry
            .get(AssignmentNotifications::OVERDUE_ID)
            .is_some());
    }

    #[tokio::test]
    async fn attempt_scored_schedules_one_run_per_subscriber() {
        let ledger = Arc::new(MemoryLedger::new());
        let pipeline = pipeline(ledger.clone());

        let envelope = pipeline
            .emitter
            .emit(DomainEvent::AttemptScored(AttemptScored {
                attempt_id: Id::new_v4(),
                user_id: Id::new_v4(),
                org_id: Id::new_v4(),
                scenario_id: Id::new_v4(),
                score: 72.0,
                score_breakdown: Map::new(),
                kpis: Map::new(),
                critical_failures: vec![],
            }))
            .await
            .unwrap();

        let mut scheduled: Vec<String> = ledger
            .runs_for_event(envelope.id)
            .into_iter()
            .map(|run| run.subscriber_id)
            .collect();
        scheduled.sort();

        assert_eq!(
            scheduled,
            vec![
                "coach/on-attempt-scored",
                "manager-alerts",
                "webhook-relay/attempt-scored"
            ]
        );
    }

    #[tokio::test]
    async fn assignment_created_reaches_notice_and_relay_only() {
        let ledger = Arc::new(MemoryLedger::new());
        let pipeline = pipeline(ledger.clone());

        let envelope = pipeline
            .emitter
            .emit(DomainEvent::AssignmentCreated(AssignmentCreated {
                assignment_id: Id::new_v4(),
                user_id: Id::new_v4(),
                org_id: Id::new_v4(),
                scenario_id: None,
                track_id: None,
                due_at: None,
                assigned_by: Id::new_v4(),
            }))
            .await
            .unwrap();

        assert_eq!(ledger.runs_for_event(envelope.id).len(), 2);
    }

    #[test]
    fn default_schedules_sweep_at_nine_and_digest_at_eight() {
        let config = Config::from_args(["coaching_pipeline"]).unwrap();

        assert_eq!(
            schedules(&config),
            vec![
                CronSchedule::new("detect-inactive-users", "0 0 9 * * *"),
                CronSchedule::new("send-daily-digest", "0 0 8 * * *"),
            ]
        );
    }

    #[tokio::test]
    async fn digest_tick_schedules_only_the_digest_run() {
        let ledger = Arc::new(MemoryLedger::new());
        let pipeline = pipeline(ledger.clone());
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();

        let tick = worker::scheduler::fire(&pipeline.emitter, SendDailyDigest::SCHEDULE, at)
            .await
            .unwrap();

        let scheduled: Vec<String> = ledger
            .runs_for_event(tick.id)
            .into_iter()
            .map(|run| run.subscriber_id)
            .collect();
        assert_eq!(scheduled, vec![SendDailyDigest::ID]);
    }
}
