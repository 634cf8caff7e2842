//! Error types for the `events` crate.
use std::error::Error as StdError;
use std::fmt;

/// Error raised while validating or publishing a domain event.
///
/// `InvalidPayload` and `UnknownEvent` are the pipeline's validation errors:
/// they are raised before anything is handed to the queue, so a caller that
/// sees one knows nothing was published.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: EventErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum EventErrorKind {
    /// The event name is not part of the registered vocabulary.
    UnknownEvent(String),
    /// The payload does not match the schema registered for the event name.
    InvalidPayload(String),
    /// The durable queue refused or failed to acknowledge the event.
    Queue(String),
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(
            self.error_kind,
            EventErrorKind::UnknownEvent(_) | EventErrorKind::InvalidPayload(_)
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: EventErrorKind::InvalidPayload(message.into()),
        }
    }

    /// Wraps a failure from a queue implementation.
    pub fn queue(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        let source = source.into();
        Error {
            error_kind: EventErrorKind::Queue(source.to_string()),
            source: Some(source),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            EventErrorKind::UnknownEvent(name) => write!(f, "Unknown event name: {name}"),
            EventErrorKind::InvalidPayload(msg) => write!(f, "Invalid event payload: {msg}"),
            EventErrorKind::Queue(msg) => write!(f, "Event queue error: {msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
