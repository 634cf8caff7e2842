//! Notification Dispatcher.
//!
//! Every dispatch creates the in-app record first, then decides whether an
//! email should also go out based on the recipient's preferences. Email is
//! best-effort: transport failures are logged and reported in the result but
//! never fail the dispatch.

use crate::error::Error;
use crate::gateway::EmailTransport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity_api::notification::NewNotification;
use entity_api::notification_type::NotificationType;
use entity_api::notifications::{self, CHANNEL_EMAIL};
use entity_api::{notification, notification_preference, Id};
use log::*;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub mod quiet_hours;
pub mod templates;

pub use quiet_hours::NotificationPreferences;

pub const DEFAULT_LIST_LIMIT: u64 = 50;
pub const MAX_LIST_LIMIT: u64 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct SendNotification {
    /// Fixed id for retried sends; a request reusing an id gets the stored
    /// record back and no second email
    pub id: Option<Id>,
    pub user_id: Id,
    pub org_id: Id,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    /// Absolute URL, or an app path such as `/training`
    pub action_url: Option<String>,
    pub agent_id: Option<String>,
    pub metadata: Option<Value>,
    pub recipient_email: Option<String>,
    pub recipient_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressedReason {
    NoEmail,
    ChannelDisabled,
    QuietHours,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendNotificationResult {
    pub notification_id: Id,
    pub in_app_created: bool,
    pub email_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_suppressed_reason: Option<SuppressedReason>,
}

/// Persistence the dispatcher needs.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn preferences(
        &self,
        org_id: Id,
        user_id: Id,
    ) -> Result<Option<NotificationPreferences>, Error>;

    async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<notifications::Model, Error>;

    async fn append_channel(&self, notification_id: Id, channel: &str) -> Result<(), Error>;
}

#[async_trait]
impl NotificationStore for DatabaseConnection {
    async fn preferences(
        &self,
        org_id: Id,
        user_id: Id,
    ) -> Result<Option<NotificationPreferences>, Error> {
        Ok(notification_preference::find_by_user(self, org_id, user_id)
            .await?
            .map(NotificationPreferences::from))
    }

    async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<notifications::Model, Error> {
        Ok(notification::create(self, new).await?)
    }

    async fn append_channel(&self, notification_id: Id, channel: &str) -> Result<(), Error> {
        notification::append_channel(self, notification_id, channel).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn NotificationStore>,
    email: Arc<dyn EmailTransport>,
    /// Prefix for app-relative action URLs in emails
    frontend_base_url: Option<String>,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        email: Arc<dyn EmailTransport>,
        frontend_base_url: Option<String>,
    ) -> Self {
        Self {
            store,
            email,
            frontend_base_url,
        }
    }

    pub async fn send_notification(
        &self,
        request: SendNotification,
    ) -> Result<SendNotificationResult, Error> {
        self.send_notification_at(request, Utc::now()).await
    }

    /// Same as [`Notifier::send_notification`] with an explicit clock for quiet hours.
    pub async fn send_notification_at(
        &self,
        request: SendNotification,
        now: DateTime<Utc>,
    ) -> Result<SendNotificationResult, Error> {
        validate(&request)?;

        let prefs = match self
            .store
            .preferences(request.org_id, request.user_id)
            .await
        {
            Ok(Some(prefs)) => prefs,
            Ok(None) => NotificationPreferences::default(),
            Err(err) => {
                warn!(
                    "Could not load notification preferences for user {}, using defaults: {err}",
                    request.user_id
                );
                NotificationPreferences::default()
            }
        };

        let record = self
            .store
            .create_notification(NewNotification {
                id: request.id.unwrap_or_else(Id::new_v4),
                org_id: request.org_id,
                user_id: request.user_id,
                notification_type: request.notification_type,
                title: request.title.clone(),
                body: request.body.clone(),
                action_url: request.action_url.clone(),
                agent_id: request.agent_id.clone(),
                metadata: request.metadata.clone(),
            })
            .await
            .inspect_err(|err| {
                error!(
                    "Failed to create {} notification for user {}: {err}",
                    request.notification_type, request.user_id
                );
            })?;

        let mut result = SendNotificationResult {
            notification_id: record.id,
            in_app_created: true,
            email_sent: false,
            email_suppressed_reason: None,
        };

        if record.channels_sent.iter().any(|c| c == CHANNEL_EMAIL) {
            debug!("Notification {} was already emailed", record.id);
            result.email_sent = true;
            return Ok(result);
        }

        let recipient = match request.recipient_email.as_deref() {
            None => {
                result.email_suppressed_reason = Some(SuppressedReason::NoEmail);
                return Ok(result);
            }
            Some(_) if !prefs.channel_email => {
                result.email_suppressed_reason = Some(SuppressedReason::ChannelDisabled);
                return Ok(result);
            }
            Some(_) if prefs.is_quiet_at(now) => {
                debug!(
                    "Suppressing email for notification {} during quiet hours",
                    record.id
                );
                result.email_suppressed_reason = Some(SuppressedReason::QuietHours);
                return Ok(result);
            }
            Some(recipient) => recipient,
        };

        let action_url = request
            .action_url
            .as_deref()
            .map(|url| self.absolute_url(url));
        let email = templates::render(
            request.notification_type,
            recipient,
            request.recipient_name.as_deref(),
            &request.title,
            &request.body,
            action_url.as_deref(),
        );

        match self.email.send(email).await {
            Ok(message_id) => {
                info!(
                    "Emailed notification {} ({}) to user {}, message id {message_id:?}",
                    record.id, request.notification_type, request.user_id
                );
                result.email_sent = true;
                if let Err(err) = self.store.append_channel(record.id, CHANNEL_EMAIL).await {
                    warn!(
                        "Email sent but channels_sent not updated for notification {}: {err}",
                        record.id
                    );
                }
            }
            Err(err) => {
                warn!(
                    "Email for notification {} was not sent: {err}",
                    record.id
                );
            }
        }

        Ok(result)
    }

    fn absolute_url(&self, url: &str) -> String {
        match (&self.frontend_base_url, url.starts_with('/')) {
            (Some(base), true) => format!("{}{url}", base.trim_end_matches('/')),
            _ => url.to_string(),
        }
    }
}

fn validate(request: &SendNotification) -> Result<(), Error> {
    if request.title.trim().is_empty() {
        return Err(Error::validation("title must not be empty"));
    }
    if request.body.trim().is_empty() {
        return Err(Error::validation("body must not be empty"));
    }
    if let Some(url) = &request.action_url {
        if !url.starts_with('/') && reqwest::Url::parse(url).is_err() {
            return Err(Error::validation(format!("action_url is not a valid URL: {url}")));
        }
    }
    if let Some(email) = &request.recipient_email {
        if !crate::gateway::mailersend::is_valid_email(email) {
            return Err(Error::validation(format!(
                "recipient_email is not a valid address: {email}"
            )));
        }
    }
    Ok(())
}

/// Newest first. `limit` is clamped to `1..=MAX_LIST_LIMIT`.
pub async fn list_notifications(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
    unread_only: bool,
    limit: Option<u64>,
) -> Result<Vec<notifications::Model>, Error> {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    Ok(notification::find_by_user(db, org_id, user_id, unread_only, limit).await?)
}

pub async fn mark_read(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
    notification_id: Id,
) -> Result<notifications::Model, Error> {
    Ok(notification::mark_read(db, org_id, user_id, notification_id).await?)
}

pub async fn mark_all_read(
    db: &impl ConnectionTrait,
    org_id: Id,
    user_id: Id,
) -> Result<u64, Error> {
    Ok(notification::mark_all_read(db, org_id, user_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingEmail, RecordingNotifications};
    use chrono::TimeZone;
    use entity_api::notifications::CHANNEL_IN_APP;

    fn request(email: Option<&str>) -> SendNotification {
        SendNotification {
            id: None,
            user_id: Id::new_v4(),
            org_id: Id::new_v4(),
            notification_type: NotificationType::PracticeReminder,
            title: "Time to practice!".to_string(),
            body: "It has been a while.".to_string(),
            action_url: Some("/training".to_string()),
            agent_id: Some("coach-agent".to_string()),
            metadata: None,
            recipient_email: email.map(str::to_string),
            recipient_name: Some("Pat".to_string()),
        }
    }

    fn notifier(
        store: Arc<RecordingNotifications>,
        email: Arc<RecordingEmail>,
    ) -> Notifier {
        Notifier::new(store, email, Some("https://app.example.com/".to_string()))
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn sends_email_and_records_both_channels() {
        let store = Arc::new(RecordingNotifications::default());
        let email = Arc::new(RecordingEmail::default());

        let result = notifier(store.clone(), email.clone())
            .send_notification_at(request(Some("pat@example.com")), noon())
            .await
            .unwrap();

        assert!(result.in_app_created);
        assert!(result.email_sent);
        assert_eq!(result.email_suppressed_reason, None);
        assert_eq!(
            store.channels_for(result.notification_id),
            vec![CHANNEL_IN_APP.to_string(), CHANNEL_EMAIL.to_string()]
        );

        let sent = email.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Time to practice!");
        assert!(sent[0].text.contains("https://app.example.com/training"));
    }

    #[tokio::test]
    async fn missing_email_creates_in_app_only() {
        let store = Arc::new(RecordingNotifications::default());
        let email = Arc::new(RecordingEmail::default());

        let result = notifier(store.clone(), email.clone())
            .send_notification_at(request(None), noon())
            .await
            .unwrap();

        assert!(result.in_app_created);
        assert!(!result.email_sent);
        assert_eq!(result.email_suppressed_reason, Some(SuppressedReason::NoEmail));
        assert!(email.sent().is_empty());
        assert_eq!(
            store.channels_for(result.notification_id),
            vec![CHANNEL_IN_APP.to_string()]
        );
    }

    #[tokio::test]
    async fn disabled_email_channel_suppresses_email() {
        let store = Arc::new(RecordingNotifications::with_preferences(
            NotificationPreferences {
                channel_email: false,
                ..Default::default()
            },
        ));
        let email = Arc::new(RecordingEmail::default());

        let result = notifier(store, email.clone())
            .send_notification_at(request(Some("pat@example.com")), noon())
            .await
            .unwrap();

        assert_eq!(
            result.email_suppressed_reason,
            Some(SuppressedReason::ChannelDisabled)
        );
        assert!(email.sent().is_empty());
    }

    #[tokio::test]
    async fn quiet_hours_suppress_email_but_not_in_app() {
        let store = Arc::new(RecordingNotifications::with_preferences(
            NotificationPreferences {
                quiet_hours_start: Some("22:00".to_string()),
                quiet_hours_end: Some("08:00".to_string()),
                ..Default::default()
            },
        ));
        let email = Arc::new(RecordingEmail::default());
        let late = Utc.with_ymd_and_hms(2026, 5, 4, 23, 15, 0).unwrap();

        let result = notifier(store.clone(), email.clone())
            .send_notification_at(request(Some("pat@example.com")), late)
            .await
            .unwrap();

        assert!(result.in_app_created);
        assert_eq!(result.email_suppressed_reason, Some(SuppressedReason::QuietHours));
        assert!(email.sent().is_empty());
        assert_eq!(store.created().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_not_fatal() {
        let store = Arc::new(RecordingNotifications::default());
        let email = Arc::new(RecordingEmail::failing());

        let result = notifier(store.clone(), email)
            .send_notification_at(request(Some("pat@example.com")), noon())
            .await
            .unwrap();

        assert!(result.in_app_created);
        assert!(!result.email_sent);
        assert_eq!(result.email_suppressed_reason, None);
        assert_eq!(
            store.channels_for(result.notification_id),
            vec![CHANNEL_IN_APP.to_string()]
        );
    }

    #[tokio::test]
    async fn preference_read_failure_falls_back_to_defaults() {
        let store = Arc::new(RecordingNotifications::failing_preferences());
        let email = Arc::new(RecordingEmail::default());

        let result = notifier(store, email.clone())
            .send_notification_at(request(Some("pat@example.com")), noon())
            .await
            .unwrap();

        assert!(result.email_sent);
        assert_eq!(email.sent().len(), 1);
    }

    #[tokio::test]
    async fn invalid_request_has_no_side_effects() {
        let store = Arc::new(RecordingNotifications::default());
        let email = Arc::new(RecordingEmail::default());
        let notifier = notifier(store.clone(), email.clone());

        let mut blank_title = request(Some("pat@example.com"));
        blank_title.title = "  ".to_string();
        assert!(notifier
            .send_notification_at(blank_title, noon())
            .await
            .unwrap_err()
            .is_validation());

        let mut bad_url = request(Some("pat@example.com"));
        bad_url.action_url = Some("not a url".to_string());
        assert!(notifier
            .send_notification_at(bad_url, noon())
            .await
            .unwrap_err()
            .is_validation());

        let bad_email = request(Some("pat-at-example"));
        assert!(notifier
            .send_notification_at(bad_email, noon())
            .await
            .unwrap_err()
            .is_validation());

        assert!(store.created().is_empty());
        assert!(email.sent().is_empty());
    }

    #[tokio::test]
    async fn resending_with_the_same_id_keeps_one_record_and_one_email() {
        let store = Arc::new(RecordingNotifications::default());
        let email = Arc::new(RecordingEmail::default());
        let notifier = notifier(store.clone(), email.clone());
        let mut send = request(Some("pat@example.com"));
        send.id = Some(Id::new_v4());

        let first = notifier
            .send_notification_at(send.clone(), noon())
            .await
            .unwrap();
        let second = notifier.send_notification_at(send, noon()).await.unwrap();

        assert_eq!(first.notification_id, second.notification_id);
        assert!(second.email_sent);
        assert_eq!(store.created().len(), 1);
        assert_eq!(email.sent().len(), 1);
    }

    #[tokio::test]
    async fn record_creation_failure_is_a_hard_error() {
        let store = Arc::new(RecordingNotifications::failing_create());
        let email = Arc::new(RecordingEmail::default());

        let err = notifier(store, email.clone())
            .send_notification_at(request(Some("pat@example.com")), noon())
            .await
            .unwrap_err();

        assert!(!err.is_validation());
        assert!(email.sent().is_empty());
    }
}
