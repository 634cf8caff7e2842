//! Query and insert contracts over the pipeline's tables.
//!
//! Every function takes the connection it runs on, so callers decide whether
//! it executes inside a transaction.

pub use entity::{
    agent_activities, delivery_status, domain_events, notification_preferences,
    notification_type, notifications, organizations, role, run_status, scenario_attempts,
    scenarios, step_checkpoints, subscriber_runs, user_memories, users, webhook_deliveries,
    webhooks, Id,
};

pub mod agent_activity;
pub mod domain_event;
pub mod error;
pub mod notification;
pub mod notification_preference;
pub mod organization;
pub mod scenario;
pub mod scenario_attempt;
pub mod step_checkpoint;
pub mod subscriber_run;
pub mod user;
pub mod user_memory;
pub mod webhook;
pub mod webhook_delivery;
