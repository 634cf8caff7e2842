//! Read access to the collaborator tables (organizations, users, scenarios,
//! attempts, skill memories) plus the agent activity log.
//!
//! Subscribers depend on the [`Directory`] trait rather than a connection so
//! their step logic can run against in-memory fixtures.

use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity_api::role::Role;
use entity_api::{
    agent_activity, organization, organizations, scenario, scenario_attempt, scenario_attempts,
    scenarios, user, user_memories, user_memory, users, Id,
};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use std::collections::HashMap;

pub use entity_api::scenario_attempt::LastCompleted;

/// One line in the agent activity log.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentActivity {
    pub org_id: Id,
    pub user_id: Option<Id>,
    pub agent_id: String,
    pub event_type: String,
    pub action: String,
    pub details: Option<Value>,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn organization(&self, org_id: Id) -> Result<organizations::Model, Error>;

    async fn user(&self, user_id: Id) -> Result<users::Model, Error>;

    async fn users_with_role(&self, org_id: Id, role: Role) -> Result<Vec<users::Model>, Error>;

    async fn scenario(&self, scenario_id: Id) -> Result<scenarios::Model, Error>;

    /// The org's active scenarios plus the universal ones.
    async fn active_scenarios(&self, org_id: Id) -> Result<Vec<scenarios::Model>, Error>;

    /// Scores of the user's completed, scored attempts in the org, newest
    /// first, excluding one attempt.
    async fn recent_scores(
        &self,
        org_id: Id,
        user_id: Id,
        exclude_attempt_id: Id,
        limit: u64,
    ) -> Result<Vec<f64>, Error>;

    async fn completed_scored_count(&self, org_id: Id, user_id: Id) -> Result<u64, Error>;

    /// Attempts per scenario started in the org at or after `since`.
    async fn attempt_counts_since(
        &self,
        org_id: Id,
        user_id: Id,
        since: DateTime<Utc>,
    ) -> Result<HashMap<Id, u32>, Error>;

    /// The user's most recent attempts on one scenario, newest first.
    async fn recent_attempts(
        &self,
        org_id: Id,
        user_id: Id,
        scenario_id: Id,
        limit: u64,
    ) -> Result<Vec<scenario_attempts::Model>, Error>;

    /// Latest completed attempt of every (org, trainee) pair.
    async fn last_completed_attempts(&self) -> Result<Vec<LastCompleted>, Error>;

    /// (org, user) pairs with a completed attempt at or after `since`.
    async fn active_trainees(&self, since: DateTime<Utc>) -> Result<Vec<(Id, Id)>, Error>;

    async fn completed_attempts_since(
        &self,
        org_id: Id,
        user_id: Id,
        since: DateTime<Utc>,
    ) -> Result<Vec<scenario_attempts::Model>, Error>;

    async fn weaknesses(&self, org_id: Id, user_id: Id)
        -> Result<Vec<user_memories::Model>, Error>;

    async fn log_activity(&self, activity: AgentActivity) -> Result<(), Error>;
}

#[async_trait]
impl Directory for DatabaseConnection {
    async fn organization(&self, org_id: Id) -> Result<organizations::Model, Error> {
        Ok(organization::find_by_id(self, org_id).await?)
    }

    async fn user(&self, user_id: Id) -> Result<users::Model, Error> {
        Ok(user::find_by_id(self, user_id).await?)
    }

    async fn users_with_role(&self, org_id: Id, role: Role) -> Result<Vec<users::Model>, Error> {
        Ok(user::find_by_org_and_role(self, org_id, role).await?)
    }

    async fn scenario(&self, scenario_id: Id) -> Result<scenarios::Model, Error> {
        Ok(scenario::find_by_id(self, scenario_id).await?)
    }

    async fn active_scenarios(&self, org_id: Id) -> Result<Vec<scenarios::Model>, Error> {
        Ok(scenario::find_active_for_org(self, org_id).await?)
    }

    async fn recent_scores(
        &self,
        org_id: Id,
        user_id: Id,
        exclude_attempt_id: Id,
        limit: u64,
    ) -> Result<Vec<f64>, Error> {
        Ok(
            scenario_attempt::recent_scores(self, org_id, user_id, exclude_attempt_id, limit)
                .await?,
        )
    }

    async fn completed_scored_count(&self, org_id: Id, user_id: Id) -> Result<u64, Error> {
        Ok(scenario_attempt::count_completed_scored(self, org_id, user_id).await?)
    }

    async fn attempt_counts_since(
        &self,
        org_id: Id,
        user_id: Id,
        since: DateTime<Utc>,
    ) -> Result<HashMap<Id, u32>, Error> {
        Ok(scenario_attempt::counts_by_scenario_since(self, org_id, user_id, since).await?)
    }

    async fn recent_attempts(
        &self,
        org_id: Id,
        user_id: Id,
        scenario_id: Id,
        limit: u64,
    ) -> Result<Vec<scenario_attempts::Model>, Error> {
        Ok(
            scenario_attempt::recent_for_scenario(self, org_id, user_id, scenario_id, limit)
                .await?,
        )
    }

    async fn last_completed_attempts(&self) -> Result<Vec<LastCompleted>, Error> {
        Ok(scenario_attempt::last_completed_per_user(self).await?)
    }

    async fn active_trainees(&self, since: DateTime<Utc>) -> Result<Vec<(Id, Id)>, Error> {
        Ok(scenario_attempt::active_since(self, since).await?)
    }

    async fn completed_attempts_since(
        &self,
        org_id: Id,
        user_id: Id,
        since: DateTime<Utc>,
    ) -> Result<Vec<scenario_attempts::Model>, Error> {
        Ok(scenario_attempt::completed_since(self, org_id, user_id, since).await?)
    }

    async fn weaknesses(
        &self,
        org_id: Id,
        user_id: Id,
    ) -> Result<Vec<user_memories::Model>, Error> {
        Ok(user_memory::find_weaknesses(self, org_id, user_id).await?)
    }

    async fn log_activity(&self, activity: AgentActivity) -> Result<(), Error> {
        agent_activity::create(
            self,
            activity.org_id,
            activity.user_id,
            &activity.agent_id,
            &activity.event_type,
            &activity.action,
            activity.details,
        )
        .await?;
        Ok(())
    }
}
