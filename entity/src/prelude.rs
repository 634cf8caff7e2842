pub use super::agent_activities::Entity as AgentActivities;
pub use super::domain_events::Entity as DomainEvents;
pub use super::notification_preferences::Entity as NotificationPreferences;
pub use super::notifications::Entity as Notifications;
pub use super::organizations::Entity as Organizations;
pub use super::scenario_attempts::Entity as ScenarioAttempts;
pub use super::scenarios::Entity as Scenarios;
pub use super::step_checkpoints::Entity as StepCheckpoints;
pub use super::subscriber_runs::Entity as SubscriberRuns;
pub use super::user_memories::Entity as UserMemories;
pub use super::users::Entity as Users;
pub use super::webhook_deliveries::Entity as WebhookDeliveries;
pub use super::webhooks::Entity as Webhooks;
