//! Strongly-typed payload records, one per event name.
//!
//! Field names are camelCase on the wire. Fields that are not declared here
//! are dropped during validation, so the data handed to subscribers is exactly
//! the validated shape.

use crate::error::Error;
use crate::Id;
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Semantic checks that serde's shape validation cannot express.
pub(crate) trait Validate {
    fn validate(&self) -> Result<(), Error>;
}

fn require_non_empty(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: f64) -> Result<(), Error> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid(format!(
            "{field} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptCompleted {
    pub attempt_id: Id,
    pub user_id: Id,
    pub org_id: Id,
    pub scenario_id: Id,
    pub duration_seconds: f64,
    pub vapi_call_id: String,
}

impl Validate for AttemptCompleted {
    fn validate(&self) -> Result<(), Error> {
        require_non_negative("durationSeconds", self.duration_seconds)?;
        require_non_empty("vapiCallId", &self.vapi_call_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptScored {
    pub attempt_id: Id,
    pub user_id: Id,
    pub org_id: Id,
    pub scenario_id: Id,
    pub score: f64,
    pub score_breakdown: Map<String, Value>,
    pub kpis: Map<String, Value>,
    pub critical_failures: Vec<String>,
}

impl Validate for AttemptScored {
    fn validate(&self) -> Result<(), Error> {
        if !self.score.is_finite() || !(0.0..=100.0).contains(&self.score) {
            return Err(Error::invalid(format!(
                "score must be between 0 and 100, got {}",
                self.score
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptFeedbackGenerated {
    pub attempt_id: Id,
    pub user_id: Id,
    pub org_id: Id,
    pub feedback_sections: Vec<Map<String, Value>>,
    pub next_steps: Vec<String>,
}

impl Validate for AttemptFeedbackGenerated {
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCreated {
    pub assignment_id: Id,
    pub user_id: Id,
    pub org_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<String>,
    pub assigned_by: Id,
}

impl Validate for AssignmentCreated {
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOverdue {
    pub assignment_id: Id,
    pub user_id: Id,
    pub org_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<Id>,
    pub due_at: String,
}

impl Validate for AssignmentOverdue {
    fn validate(&self) -> Result<(), Error> {
        require_non_empty("dueAt", &self.due_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedOrg {
    pub user_id: Id,
    pub org_id: Id,
    pub role: String,
    pub email: String,
    pub name: String,
}

impl Validate for UserJoinedOrg {
    fn validate(&self) -> Result<(), Error> {
        require_non_empty("role", &self.role)?;
        if !EmailAddress::is_valid(&self.email) {
            return Err(Error::invalid(format!(
                "email is not a valid address: {}",
                self.email
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInactive {
    pub user_id: Id,
    pub org_id: Id,
    pub last_attempt_at: String,
    pub days_since_last_attempt: f64,
}

impl Validate for UserInactive {
    fn validate(&self) -> Result<(), Error> {
        require_non_negative("daysSinceLastAttempt", self.days_since_last_attempt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachRecommendationReady {
    pub user_id: Id,
    pub org_id: Id,
    pub recommendation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<Id>,
    pub message: String,
}

impl Validate for CoachRecommendationReady {
    fn validate(&self) -> Result<(), Error> {
        require_non_empty("recommendationType", &self.recommendation_type)?;
        require_non_empty("message", &self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachWeaknessUpdated {
    pub user_id: Id,
    pub org_id: Id,
    pub weaknesses: Vec<Map<String, Value>>,
    pub strengths: Vec<Map<String, Value>>,
    pub trajectory: String,
}

impl Validate for CoachWeaknessUpdated {
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingUploaded {
    pub org_id: Id,
    pub file_url: String,
    pub uploaded_by: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Validate for RecordingUploaded {
    fn validate(&self) -> Result<(), Error> {
        require_non_empty("fileUrl", &self.file_url)
    }
}

/// A cron tick. `schedule` names the job that fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFired {
    pub schedule: String,
    pub fired_at: String,
}

impl Validate for ScheduleFired {
    fn validate(&self) -> Result<(), Error> {
        require_non_empty("schedule", &self.schedule)?;
        chrono::DateTime::parse_from_rfc3339(&self.fired_at).map_err(|err| {
            Error::invalid(format!("firedAt must be an RFC 3339 timestamp: {err}"))
        })?;
        Ok(())
    }
}
