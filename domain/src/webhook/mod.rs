//! Webhook Delivery Subsystem.
//!
//! Every attempt to reach a customer endpoint is recorded as a
//! `webhook_deliveries` row before the HTTP call is made. Transient failures
//! (timeouts, connection errors, 5xx, 429) are retried on the same row with a
//! fresh timestamp and signature; anything else is final. Failed deliveries are
//! replayed manually as a new row.

use crate::error::Error;
use async_trait::async_trait;
use chrono::Utc;
use entity_api::{webhook, webhook_deliveries, webhook_delivery, webhooks, Id};
use futures::future::join_all;
use hmac::{Hmac, Mac};
use log::*;
use rand::RngCore;
use reqwest::StatusCode;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use worker::Backoff;

pub mod payload;
pub mod relay;

pub use payload::{WebhookEventType, WebhookPayload};
pub use relay::WebhookRelay;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";
pub const DELIVERY_ID_HEADER: &str = "X-Webhook-ID";
pub const USER_AGENT: &str = "Coaching-Pipeline-Webhooks/1.0";

pub const DEFAULT_DELIVERY_LIMIT: u64 = 50;
pub const MAX_DELIVERY_LIMIT: u64 = 200;

const SECRET_BYTES: usize = 32;

/// Bounds on per-webhook settings. One dispatch takes at most
/// `(MAX_RETRY_ATTEMPTS + 1) * MAX_TIMEOUT` plus backoff.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60);

/// `hex(HMAC-SHA256(secret, "{timestamp}.{body}"))`
pub fn sign(secret: &str, timestamp: i64, body: &str) -> Result<String, Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::config("Invalid webhook signing key"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `sha256=<hex>` (or bare hex) signature in constant time.
pub fn verify_signature(secret: &str, timestamp: i64, body: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim_start_matches("sha256=")) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// 32 random bytes, hex encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Where and how to deliver, taken from a `webhooks` row at dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookTarget {
    pub id: Id,
    pub url: String,
    pub secret: String,
    /// Additional attempts after the first one
    pub retry_attempts: u32,
    pub timeout: Duration,
}

impl From<&webhooks::Model> for WebhookTarget {
    /// Stored settings outside `0..=MAX_RETRY_ATTEMPTS` retries and
    /// `1s..=MAX_TIMEOUT` are clamped.
    fn from(model: &webhooks::Model) -> Self {
        let retry_attempts = u32::try_from(model.retry_attempts)
            .unwrap_or(0)
            .min(MAX_RETRY_ATTEMPTS);
        let timeout = Duration::from_secs(u64::try_from(model.timeout_seconds).unwrap_or(1))
            .clamp(Duration::from_secs(1), MAX_TIMEOUT);
        Self {
            id: model.id,
            url: model.url.clone(),
            secret: model.secret.clone(),
            retry_attempts,
            timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The endpoint answered 2xx
    Delivered { delivery_id: Id, status: u16 },
    /// The endpoint answered, but not with a 2xx
    Rejected { delivery_id: Id, status: u16 },
    /// No answer. `delivery_id` is absent when the row could not be written.
    Failed {
        delivery_id: Option<Id>,
        error: String,
    },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub webhook_id: Id,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn enabled_for_event(
        &self,
        org_id: Id,
        event_type: &str,
    ) -> Result<Vec<webhooks::Model>, Error>;

    /// Not found when the webhook belongs to another org.
    async fn find_webhook(&self, org_id: Id, webhook_id: Id) -> Result<webhooks::Model, Error>;

    async fn update_secret(
        &self,
        org_id: Id,
        webhook_id: Id,
        secret: String,
    ) -> Result<webhooks::Model, Error>;

    async fn create_delivery(
        &self,
        delivery_id: Id,
        webhook_id: Id,
        event_type: &str,
        payload: Value,
    ) -> Result<(), Error>;

    async fn record_attempt(&self, delivery_id: Id, attempt_count: i32) -> Result<(), Error>;

    async fn record_response(&self, delivery_id: Id, status: u16, body: &str)
        -> Result<(), Error>;

    async fn record_failure(&self, delivery_id: Id, error_message: &str) -> Result<(), Error>;

    async fn find_delivery(&self, delivery_id: Id) -> Result<webhook_deliveries::Model, Error>;

    async fn deliveries_for(
        &self,
        webhook_id: Id,
        limit: u64,
    ) -> Result<Vec<webhook_deliveries::Model>, Error>;
}

#[async_trait]
impl WebhookStore for DatabaseConnection {
    async fn enabled_for_event(
        &self,
        org_id: Id,
        event_type: &str,
    ) -> Result<Vec<webhooks::Model>, Error> {
        Ok(webhook::find_enabled_for_event(self, org_id, event_type).await?)
    }

    async fn find_webhook(&self, org_id: Id, webhook_id: Id) -> Result<webhooks::Model, Error> {
        Ok(webhook::find_by_org(self, org_id, webhook_id).await?)
    }

    async fn update_secret(
        &self,
        org_id: Id,
        webhook_id: Id,
        secret: String,
    ) -> Result<webhooks::Model, Error> {
        Ok(webhook::update_secret(self, org_id, webhook_id, secret).await?)
    }

    async fn create_delivery(
        &self,
        delivery_id: Id,
        webhook_id: Id,
        event_type: &str,
        payload: Value,
    ) -> Result<(), Error> {
        webhook_delivery::create_pending(self, delivery_id, webhook_id, event_type, payload)
            .await?;
        Ok(())
    }

    async fn record_attempt(&self, delivery_id: Id, attempt_count: i32) -> Result<(), Error> {
        webhook_delivery::record_attempt(self, delivery_id, attempt_count).await?;
        Ok(())
    }

    async fn record_response(
        &self,
        delivery_id: Id,
        status: u16,
        body: &str,
    ) -> Result<(), Error> {
        webhook_delivery::record_response(self, delivery_id, status, body).await?;
        Ok(())
    }

    async fn record_failure(&self, delivery_id: Id, error_message: &str) -> Result<(), Error> {
        webhook_delivery::record_failure(self, delivery_id, error_message).await?;
        Ok(())
    }

    async fn find_delivery(&self, delivery_id: Id) -> Result<webhook_deliveries::Model, Error> {
        Ok(webhook_delivery::find_by_id(self, delivery_id).await?)
    }

    async fn deliveries_for(
        &self,
        webhook_id: Id,
        limit: u64,
    ) -> Result<Vec<webhook_deliveries::Model>, Error> {
        Ok(webhook_delivery::find_by_webhook(self, webhook_id, limit).await?)
    }
}

/// Result of a single HTTP attempt.
enum Attempt {
    Answered { status: StatusCode, body: String },
    Unreachable(Error),
}

impl Attempt {
    fn is_transient(&self) -> bool {
        match self {
            Attempt::Answered { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Attempt::Unreachable(_) => true,
        }
    }
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    store: Arc<dyn WebhookStore>,
    client: reqwest::Client,
    backoff: Backoff,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn WebhookStore>, backoff: Backoff) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            store,
            client,
            backoff,
        })
    }

    /// Delivers one payload to one target, retrying transient failures on the same row.
    pub async fn dispatch(
        &self,
        target: &WebhookTarget,
        event_type: &str,
        payload: &Value,
    ) -> DispatchOutcome {
        let delivery_id = Id::new_v4();

        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(err) => {
                return DispatchOutcome::Failed {
                    delivery_id: None,
                    error: err.to_string(),
                }
            }
        };

        if let Err(err) = self
            .store
            .create_delivery(delivery_id, target.id, event_type, payload.clone())
            .await
        {
            error!(
                "Could not record delivery of {event_type} to webhook {}: {err}",
                target.id
            );
            return DispatchOutcome::Failed {
                delivery_id: None,
                error: err.to_string(),
            };
        }

        let max_attempts = target.retry_attempts.saturating_add(1);
        let mut attempt_number: u32 = 1;

        loop {
            let attempt = self.attempt(target, delivery_id, &body).await;

            if attempt.is_transient() && attempt_number < max_attempts {
                let delay = self.backoff.delay(attempt_number);
                match &attempt {
                    Attempt::Answered { status, .. } => warn!(
                        "Webhook {} answered {status} for delivery {delivery_id}, retrying in {delay:?}",
                        target.id
                    ),
                    Attempt::Unreachable(err) => warn!(
                        "Webhook {} unreachable for delivery {delivery_id} ({err}), retrying in {delay:?}",
                        target.id
                    ),
                }
                tokio::time::sleep(delay).await;

                attempt_number += 1;
                let count = i32::try_from(attempt_number).unwrap_or(i32::MAX);
                if let Err(err) = self.store.record_attempt(delivery_id, count).await {
                    warn!("Could not bump attempt count of delivery {delivery_id}: {err}");
                }
                continue;
            }

            return self.settle(target, delivery_id, event_type, attempt).await;
        }
    }

    async fn attempt(&self, target: &WebhookTarget, delivery_id: Id, body: &str) -> Attempt {
        let timestamp = Utc::now().timestamp_millis();
        let signature = match sign(&target.secret, timestamp, body) {
            Ok(signature) => signature,
            Err(err) => return Attempt::Unreachable(err),
        };

        let response = self
            .client
            .post(&target.url)
            .timeout(target.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, format!("sha256={signature}"))
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(DELIVERY_ID_HEADER, delivery_id.to_string())
            .body(body.to_string())
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                Attempt::Answered { status, body }
            }
            Err(err) => Attempt::Unreachable(Error::from(err)),
        }
    }

    async fn settle(
        &self,
        target: &WebhookTarget,
        delivery_id: Id,
        event_type: &str,
        attempt: Attempt,
    ) -> DispatchOutcome {
        match attempt {
            Attempt::Answered { status, body } => {
                let code = status.as_u16();
                if let Err(err) = self.store.record_response(delivery_id, code, &body).await {
                    error!("Could not record response of delivery {delivery_id}: {err}");
                }

                if status.is_success() {
                    info!(
                        "Delivered {event_type} to webhook {} ({delivery_id}, {code})",
                        target.id
                    );
                    DispatchOutcome::Delivered {
                        delivery_id,
                        status: code,
                    }
                } else {
                    warn!(
                        "Webhook {} rejected {event_type} ({delivery_id}, {code})",
                        target.id
                    );
                    DispatchOutcome::Rejected {
                        delivery_id,
                        status: code,
                    }
                }
            }
            Attempt::Unreachable(err) => {
                let message = err.to_string();
                if let Err(store_err) = self.store.record_failure(delivery_id, &message).await {
                    error!("Could not record failure of delivery {delivery_id}: {store_err}");
                }
                warn!(
                    "Delivery {delivery_id} of {event_type} to webhook {} failed: {message}",
                    target.id
                );
                DispatchOutcome::Failed {
                    delivery_id: Some(delivery_id),
                    error: message,
                }
            }
        }
    }

    /// Sends `payload` to every enabled webhook of the org subscribed to `event_type`.
    ///
    /// One failing endpoint never prevents delivery to the others.
    pub async fn trigger_event(
        &self,
        org_id: Id,
        event_type: WebhookEventType,
        payload: &WebhookPayload,
    ) -> Result<Vec<TargetReport>, Error> {
        let webhooks = self
            .store
            .enabled_for_event(org_id, event_type.as_str())
            .await?;

        if webhooks.is_empty() {
            debug!("No webhooks subscribed to {event_type} in org {org_id}");
            return Ok(Vec::new());
        }

        let payload = serde_json::to_value(payload)?;
        let reports = join_all(webhooks.iter().map(|model| {
            let target = WebhookTarget::from(model);
            let payload = &payload;
            async move {
                let outcome = self.dispatch(&target, event_type.as_str(), payload).await;
                TargetReport {
                    webhook_id: target.id,
                    outcome,
                }
            }
        }))
        .await;

        let delivered = reports.iter().filter(|r| r.outcome.is_delivered()).count();
        info!(
            "Triggered {event_type} for org {org_id}: {delivered}/{} delivered",
            reports.len()
        );

        Ok(reports)
    }

    /// Re-sends a stored delivery to the webhook's current url and secret as a new row.
    pub async fn retry_delivery(
        &self,
        org_id: Id,
        delivery_id: Id,
    ) -> Result<DispatchOutcome, Error> {
        let delivery = self.store.find_delivery(delivery_id).await?;
        let webhook = self.store.find_webhook(org_id, delivery.webhook_id).await?;

        if !webhook.enabled {
            return Err(Error::validation("Webhook is disabled"));
        }

        info!(
            "Manually retrying delivery {delivery_id} ({}) to webhook {}",
            delivery.event_type, webhook.id
        );

        Ok(self
            .dispatch(
                &WebhookTarget::from(&webhook),
                &delivery.event_type,
                &delivery.payload,
            )
            .await)
    }

    /// Rotates the signing secret and returns the new one. No other call reveals it.
    pub async fn regenerate_secret(&self, org_id: Id, webhook_id: Id) -> Result<String, Error> {
        let secret = generate_secret();
        self.store
            .update_secret(org_id, webhook_id, secret.clone())
            .await?;
        info!("Regenerated signing secret for webhook {webhook_id}");
        Ok(secret)
    }

    /// Newest first. `limit` is clamped to `1..=MAX_DELIVERY_LIMIT`.
    pub async fn list_deliveries(
        &self,
        org_id: Id,
        webhook_id: Id,
        limit: Option<u64>,
    ) -> Result<Vec<webhook_deliveries::Model>, Error> {
        let webhook = self.store.find_webhook(org_id, webhook_id).await?;
        let limit = limit
            .unwrap_or(DEFAULT_DELIVERY_LIMIT)
            .clamp(1, MAX_DELIVERY_LIMIT);
        self.store.deliveries_for(webhook.id, limit).await
    }
}
