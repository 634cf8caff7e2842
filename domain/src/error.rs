//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. Each layer translates the errors of the layer below it, so `web`
/// only ever sees `domain` errors and never depends on `entity_api` or `events` directly.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    /// A required setting (API key, sender address, signing secret) is missing
    Config,
    /// Caller input was rejected before any side effect happened
    Validation(String),
    /// Stored history could not be evaluated by an alert rule
    RuleEvaluation(String),
    Other(String),
}

/// Enum representing the various kinds of entity errors that can bubble up from the "Entity" layer (`entity_api` and `entity`).
/// These errors are translated from the `entity_api` layer to the `domain` layer and reduced to a subset of error kinds
/// that are relevant to the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    NotUpdated,
    Invalid,
    DbTransaction,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
/// Every external error is considered transient by the callers that retry.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    Timeout,
    Other(String),
}

impl Error {
    pub(crate) fn config(message: &str) -> Self {
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Validation(message.into())),
        }
    }

    pub(crate) fn rule_evaluation(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::RuleEvaluation(
                message.into(),
            )),
        }
    }

    pub(crate) fn not_found() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::NotFound,
            )),
        }
    }

    pub(crate) fn other(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(message.into())),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Validation(_))
        )
    }

    /// Whether the error came from an unreachable or failing collaborator.
    pub fn is_transient(&self) -> bool {
        matches!(self.error_kind, DomainErrorKind::External(_))
    }

    pub fn is_config(&self) -> bool {
        self.error_kind == DomainErrorKind::Internal(InternalErrorKind::Config)
    }

    pub fn is_not_found(&self) -> bool {
        self.error_kind
            == DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Validation(msg)) => {
                write!(f, "Validation error: {msg}")
            }
            DomainErrorKind::Internal(InternalErrorKind::RuleEvaluation(msg)) => {
                write!(f, "Rule evaluation error: {msg}")
            }
            DomainErrorKind::Internal(InternalErrorKind::Config) => match &self.source {
                Some(source) => write!(f, "Configuration error: {source}"),
                None => write!(f, "Configuration error"),
            },
            kind => match &self.source {
                Some(source) => write!(f, "Domain Error: {kind:?}: {source}"),
                None => write!(f, "Domain Error: {kind:?}"),
            },
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

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::RecordNotUpdated => EntityErrorKind::NotUpdated,
            EntityApiErrorKind::ValidationError => EntityErrorKind::Invalid,
            EntityApiErrorKind::SystemError => EntityErrorKind::DbTransaction,
            _ => EntityErrorKind::Other("EntityErrorKind".to_string()),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

impl From<events::Error> for Error {
    fn from(err: events::Error) -> Self {
        let error_kind = if err.is_validation() {
            InternalErrorKind::Validation(err.to_string())
        } else {
            InternalErrorKind::Other("Event queue error".to_string())
        };
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(error_kind),
        }
    }
}

impl From<worker::Error> for Error {
    fn from(err: worker::Error) -> Self {
        let error_kind = match err.error_kind {
            worker::WorkerErrorKind::NotReplayable => {
                InternalErrorKind::Validation("Only failed runs can be replayed".to_string())
            }
            worker::WorkerErrorKind::RunNotFound => {
                InternalErrorKind::Entity(EntityErrorKind::NotFound)
            }
            _ => InternalErrorKind::Other("Subscriber runtime error".to_string()),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(error_kind),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest client".to_string(),
                )),
            }
        } else if err.is_timeout() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Timeout),
            }
        // Errors that result from issues with the network call itself.
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Invalid,
            )),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "JSON (de)serialization error".to_string(),
            )),
        }
    }
}
