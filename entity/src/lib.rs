use uuid::Uuid;

pub mod prelude;

// Collaborator tables, read-only to the pipeline
pub mod organizations;
pub mod role;
pub mod scenario_attempts;
pub mod scenarios;
pub mod user_memories;
pub mod users;

// Notifications
pub mod notification_preferences;
pub mod notification_type;
pub mod notifications;

// Outbound webhooks
pub mod delivery_status;
pub mod webhook_deliveries;
pub mod webhooks;

// Durable event queue and subscriber runtime
pub mod domain_events;
pub mod run_status;
pub mod step_checkpoints;
pub mod subscriber_runs;

pub mod agent_activities;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;
