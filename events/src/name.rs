use crate::error::{Error, EventErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed vocabulary of event names that may flow through the pipeline.
///
/// Adding an event means adding a variant here, a payload type in
/// [`crate::payload`] and a variant on [`crate::DomainEvent`]; the compiler
/// refuses a name without a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "attempt.completed")]
    AttemptCompleted,
    #[serde(rename = "attempt.scored")]
    AttemptScored,
    #[serde(rename = "attempt.feedback.generated")]
    AttemptFeedbackGenerated,
    #[serde(rename = "assignment.created")]
    AssignmentCreated,
    #[serde(rename = "assignment.overdue")]
    AssignmentOverdue,
    #[serde(rename = "user.joined.org")]
    UserJoinedOrg,
    #[serde(rename = "user.inactive")]
    UserInactive,
    #[serde(rename = "coach.recommendation.ready")]
    CoachRecommendationReady,
    #[serde(rename = "coach.weakness.updated")]
    CoachWeaknessUpdated,
    #[serde(rename = "recording.uploaded")]
    RecordingUploaded,
    #[serde(rename = "schedule.fired")]
    ScheduleFired,
}

impl EventName {
    pub const ALL: [EventName; 11] = [
        EventName::AttemptCompleted,
        EventName::AttemptScored,
        EventName::AttemptFeedbackGenerated,
        EventName::AssignmentCreated,
        EventName::AssignmentOverdue,
        EventName::UserJoinedOrg,
        EventName::UserInactive,
        EventName::CoachRecommendationReady,
        EventName::CoachWeaknessUpdated,
        EventName::RecordingUploaded,
        EventName::ScheduleFired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::AttemptCompleted => "attempt.completed",
            EventName::AttemptScored => "attempt.scored",
            EventName::AttemptFeedbackGenerated => "attempt.feedback.generated",
            EventName::AssignmentCreated => "assignment.created",
            EventName::AssignmentOverdue => "assignment.overdue",
            EventName::UserJoinedOrg => "user.joined.org",
            EventName::UserInactive => "user.inactive",
            EventName::CoachRecommendationReady => "coach.recommendation.ready",
            EventName::CoachWeaknessUpdated => "coach.weakness.updated",
            EventName::RecordingUploaded => "recording.uploaded",
            EventName::ScheduleFired => "schedule.fired",
        }
    }
}

impl FromStr for EventName {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == name)
            .ok_or_else(|| Error {
                source: None,
                error_kind: EventErrorKind::UnknownEvent(name.to_string()),
            })
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_registered_name() {
        for name in EventName::ALL {
            assert_eq!(name.as_str().parse::<EventName>().unwrap(), name);
        }
    }

    #[test]
    fn serde_name_matches_as_str() {
        let serialized = serde_json::to_value(EventName::AttemptScored).unwrap();
        assert_eq!(serialized, serde_json::json!("attempt.scored"));
    }

    #[test]
    fn rejects_unregistered_name() {
        let err = "attempt.deleted".parse::<EventName>().unwrap_err();
        assert_eq!(
            err.error_kind,
            EventErrorKind::UnknownEvent("attempt.deleted".to_string())
        );
        assert!(err.is_validation());
    }
}
