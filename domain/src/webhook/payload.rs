//! Outbound webhook vocabulary and the JSON body customers receive.

use chrono::{DateTime, SecondsFormat, Utc};
use entity_api::{organizations, scenarios, users, Id};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Scores below this relay as `attempt.scored.low`.
pub const LOW_SCORE_THRESHOLD: f64 = 60.0;
/// Scores at or above this relay as `attempt.scored.high`.
pub const HIGH_SCORE_THRESHOLD: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "scenario.assigned")]
    ScenarioAssigned,
    #[serde(rename = "scenario.completed")]
    ScenarioCompleted,
    #[serde(rename = "attempt.scored.low")]
    AttemptScoredLow,
    #[serde(rename = "attempt.scored.high")]
    AttemptScoredHigh,
    #[serde(rename = "track.completed")]
    TrackCompleted,
    #[serde(rename = "user.added")]
    UserAdded,
    #[serde(rename = "user.removed")]
    UserRemoved,
    #[serde(rename = "assignment.overdue")]
    AssignmentOverdue,
    #[serde(rename = "performance.milestone")]
    PerformanceMilestone,
}

impl WebhookEventType {
    pub const ALL: [WebhookEventType; 9] = [
        WebhookEventType::ScenarioAssigned,
        WebhookEventType::ScenarioCompleted,
        WebhookEventType::AttemptScoredLow,
        WebhookEventType::AttemptScoredHigh,
        WebhookEventType::TrackCompleted,
        WebhookEventType::UserAdded,
        WebhookEventType::UserRemoved,
        WebhookEventType::AssignmentOverdue,
        WebhookEventType::PerformanceMilestone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::ScenarioAssigned => "scenario.assigned",
            WebhookEventType::ScenarioCompleted => "scenario.completed",
            WebhookEventType::AttemptScoredLow => "attempt.scored.low",
            WebhookEventType::AttemptScoredHigh => "attempt.scored.high",
            WebhookEventType::TrackCompleted => "track.completed",
            WebhookEventType::UserAdded => "user.added",
            WebhookEventType::UserRemoved => "user.removed",
            WebhookEventType::AssignmentOverdue => "assignment.overdue",
            WebhookEventType::PerformanceMilestone => "performance.milestone",
        }
    }

    /// The webhook event a score relays as, if any. Scores in `[60, 80)` relay nothing.
    pub fn for_score(score: f64) -> Option<Self> {
        if score < LOW_SCORE_THRESHOLD {
            Some(WebhookEventType::AttemptScoredLow)
        } else if score >= HIGH_SCORE_THRESHOLD {
            Some(WebhookEventType::AttemptScoredHigh)
        } else {
            None
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventType {
    type Err = crate::error::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        WebhookEventType::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == value)
            .ok_or_else(|| {
                crate::error::Error::validation(format!("unknown webhook event: {value}"))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgRef {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<&users::Model> for UserRef {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.display_name().unwrap_or_else(|| "Unknown".to_string()),
            role: user.role.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRef {
    pub id: Id,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

impl From<&scenarios::Model> for ScenarioRef {
    fn from(scenario: &scenarios::Model) -> Self {
        Self {
            id: scenario.id,
            title: scenario.title.clone(),
            difficulty: scenario.difficulty.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRef {
    pub id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpis: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRef {
    pub id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// The body of every webhook POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: WebhookEventType,
    pub idempotency_key: String,
    pub org: OrgRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<AttemptRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<AssignmentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackRef>,
    pub timestamp: String,
}

impl WebhookPayload {
    pub fn builder(event: WebhookEventType, org: &organizations::Model) -> WebhookPayloadBuilder {
        WebhookPayloadBuilder::new(event, org, Utc::now())
    }
}

pub struct WebhookPayloadBuilder {
    payload: WebhookPayload,
}

impl WebhookPayloadBuilder {
    pub fn new(event: WebhookEventType, org: &organizations::Model, now: DateTime<Utc>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();

        Self {
            payload: WebhookPayload {
                event,
                idempotency_key: format!(
                    "{}-{event}-{}-{}",
                    org.id,
                    now.timestamp_millis(),
                    suffix.to_lowercase()
                ),
                org: OrgRef {
                    id: org.id,
                    name: org.name.clone(),
                },
                user: None,
                scenario: None,
                attempt: None,
                assignment: None,
                track: None,
                timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        }
    }

    pub fn user(mut self, user: &users::Model) -> Self {
        self.payload.user = Some(UserRef::from(user));
        self
    }

    pub fn user_ref(mut self, user: UserRef) -> Self {
        self.payload.user = Some(user);
        self
    }

    pub fn scenario(mut self, scenario: &scenarios::Model) -> Self {
        self.payload.scenario = Some(ScenarioRef::from(scenario));
        self
    }

    pub fn attempt(mut self, attempt: AttemptRef) -> Self {
        self.payload.attempt = Some(attempt);
        self
    }

    pub fn assignment(mut self, id: Id, due_at: Option<String>) -> Self {
        self.payload.assignment = Some(AssignmentRef { id, due_at });
        self
    }

    pub fn track(mut self, id: Id) -> Self {
        self.payload.track = Some(TrackRef { id, title: None });
        self
    }

    pub fn build(self) -> WebhookPayload {
        self.payload
    }
}
