use crate::error::Error;
use crate::name::EventName;
use crate::payload::*;
use crate::Id;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A domain event: an event name bound to its strongly-typed payload.
///
/// Serialized as `{"name": "<event name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum DomainEvent {
    #[serde(rename = "attempt.completed")]
    AttemptCompleted(AttemptCompleted),
    #[serde(rename = "attempt.scored")]
    AttemptScored(AttemptScored),
    #[serde(rename = "attempt.feedback.generated")]
    AttemptFeedbackGenerated(AttemptFeedbackGenerated),
    #[serde(rename = "assignment.created")]
    AssignmentCreated(AssignmentCreated),
    #[serde(rename = "assignment.overdue")]
    AssignmentOverdue(AssignmentOverdue),
    #[serde(rename = "user.joined.org")]
    UserJoinedOrg(UserJoinedOrg),
    #[serde(rename = "user.inactive")]
    UserInactive(UserInactive),
    #[serde(rename = "coach.recommendation.ready")]
    CoachRecommendationReady(CoachRecommendationReady),
    #[serde(rename = "coach.weakness.updated")]
    CoachWeaknessUpdated(CoachWeaknessUpdated),
    #[serde(rename = "recording.uploaded")]
    RecordingUploaded(RecordingUploaded),
    #[serde(rename = "schedule.fired")]
    ScheduleFired(ScheduleFired),
}

impl DomainEvent {
    /// Builds an event from a raw name and JSON payload, validating both.
    ///
    /// Returns a validation error (see [`Error::is_validation`]) when the
    /// name is not registered or the payload does not match its schema.
    pub fn from_parts(name: &str, payload: Value) -> Result<Self, Error> {
        let name: EventName = name.parse()?;

        if !payload.is_object() {
            return Err(Error::invalid(format!("{name}: payload must be a JSON object")));
        }

        let event = match name {
            EventName::AttemptCompleted => DomainEvent::AttemptCompleted(parse(name, payload)?),
            EventName::AttemptScored => DomainEvent::AttemptScored(parse(name, payload)?),
            EventName::AttemptFeedbackGenerated => {
                DomainEvent::AttemptFeedbackGenerated(parse(name, payload)?)
            }
            EventName::AssignmentCreated => DomainEvent::AssignmentCreated(parse(name, payload)?),
            EventName::AssignmentOverdue => DomainEvent::AssignmentOverdue(parse(name, payload)?),
            EventName::UserJoinedOrg => DomainEvent::UserJoinedOrg(parse(name, payload)?),
            EventName::UserInactive => DomainEvent::UserInactive(parse(name, payload)?),
            EventName::CoachRecommendationReady => {
                DomainEvent::CoachRecommendationReady(parse(name, payload)?)
            }
            EventName::CoachWeaknessUpdated => {
                DomainEvent::CoachWeaknessUpdated(parse(name, payload)?)
            }
            EventName::RecordingUploaded => DomainEvent::RecordingUploaded(parse(name, payload)?),
            EventName::ScheduleFired => DomainEvent::ScheduleFired(parse(name, payload)?),
        };

        event.validate()?;
        Ok(event)
    }

    pub fn name(&self) -> EventName {
        match self {
            DomainEvent::AttemptCompleted(_) => EventName::AttemptCompleted,
            DomainEvent::AttemptScored(_) => EventName::AttemptScored,
            DomainEvent::AttemptFeedbackGenerated(_) => EventName::AttemptFeedbackGenerated,
            DomainEvent::AssignmentCreated(_) => EventName::AssignmentCreated,
            DomainEvent::AssignmentOverdue(_) => EventName::AssignmentOverdue,
            DomainEvent::UserJoinedOrg(_) => EventName::UserJoinedOrg,
            DomainEvent::UserInactive(_) => EventName::UserInactive,
            DomainEvent::CoachRecommendationReady(_) => EventName::CoachRecommendationReady,
            DomainEvent::CoachWeaknessUpdated(_) => EventName::CoachWeaknessUpdated,
            DomainEvent::RecordingUploaded(_) => EventName::RecordingUploaded,
            DomainEvent::ScheduleFired(_) => EventName::ScheduleFired,
        }
    }

    /// Runs the semantic checks registered for this event's payload.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            DomainEvent::AttemptCompleted(p) => p.validate(),
            DomainEvent::AttemptScored(p) => p.validate(),
            DomainEvent::AttemptFeedbackGenerated(p) => p.validate(),
            DomainEvent::AssignmentCreated(p) => p.validate(),
            DomainEvent::AssignmentOverdue(p) => p.validate(),
            DomainEvent::UserJoinedOrg(p) => p.validate(),
            DomainEvent::UserInactive(p) => p.validate(),
            DomainEvent::CoachRecommendationReady(p) => p.validate(),
            DomainEvent::CoachWeaknessUpdated(p) => p.validate(),
            DomainEvent::RecordingUploaded(p) => p.validate(),
            DomainEvent::ScheduleFired(p) => p.validate(),
        }
        .map_err(|err| {
            if let crate::EventErrorKind::InvalidPayload(msg) = &err.error_kind {
                return Error::invalid(format!("{}: {msg}", self.name()));
            }
            err
        })
    }

    /// The payload as JSON, exactly as it is stored on the queue.
    pub fn data(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut fields)) => fields.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// The organization the event belongs to. Schedule ticks span every
    /// organization and have none.
    pub fn org_id(&self) -> Option<Id> {
        let org_id = match self {
            DomainEvent::AttemptCompleted(p) => p.org_id,
            DomainEvent::AttemptScored(p) => p.org_id,
            DomainEvent::AttemptFeedbackGenerated(p) => p.org_id,
            DomainEvent::AssignmentCreated(p) => p.org_id,
            DomainEvent::AssignmentOverdue(p) => p.org_id,
            DomainEvent::UserJoinedOrg(p) => p.org_id,
            DomainEvent::UserInactive(p) => p.org_id,
            DomainEvent::CoachRecommendationReady(p) => p.org_id,
            DomainEvent::CoachWeaknessUpdated(p) => p.org_id,
            DomainEvent::RecordingUploaded(p) => p.org_id,
            DomainEvent::ScheduleFired(_) => return None,
        };
        Some(org_id)
    }
}

fn parse<T: DeserializeOwned>(name: EventName, payload: Value) -> Result<T, Error> {
    serde_json::from_value(payload).map_err(|err| Error {
        error_kind: crate::EventErrorKind::InvalidPayload(format!("{name}: {err}")),
        source: Some(Box::new(err)),
    })
}

/// A validated event as it travels through the durable queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Id,
    pub event: DomainEvent,
    pub emitted_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        Self::with_id(Id::new_v4(), event)
    }

    /// An envelope with a caller-chosen id. Enqueueing the same id twice
    /// stores the event once.
    pub fn with_id(id: Id, event: DomainEvent) -> Self {
        Self {
            id,
            event,
            emitted_at: Utc::now(),
        }
    }

    pub fn name(&self) -> EventName {
        self.event.name()
    }
}
