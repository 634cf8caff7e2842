//! Business logic of the coaching pipeline: notification dispatch, webhook
//! delivery, manager alerting and coaching analytics, together with the
//! subscribers that run them off domain events.
//!
//! Consumers of this crate reach storage types through the re-exports below
//! instead of depending on `entity_api` directly.

pub use entity_api::{
    agent_activities, delivery_status, domain_events, notification_preferences,
    notification_type, notifications, organizations, role, run_status, scenario_attempts,
    scenarios, subscriber_runs, user_memories, users, webhook_deliveries, webhooks, Id,
};

pub mod alerts;
pub mod assignment;
pub mod coach;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod jwt;
pub mod notification;
pub mod pipeline;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;
