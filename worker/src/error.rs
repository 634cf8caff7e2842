//! Error types for the `worker` crate.
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: WorkerErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum WorkerErrorKind {
    /// Reading or writing the run ledger failed
    Ledger,
    /// A named step returned an error
    Step(String),
    /// The handler failed outside of any step
    Handler,
    /// A checkpoint or handler output could not be (de)serialized
    Serialization,
    /// A run references a subscriber that is not registered
    UnknownSubscriber(String),
    /// The stored event no longer decodes against the registry
    Event,
    /// The run cannot be replayed in its current state
    NotReplayable,
    /// No run with the requested id exists
    RunNotFound,
    /// A cron job could not be created or the scheduler failed to start
    Scheduler,
}

impl Error {
    pub fn handler(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Error {
            source: Some(source.into()),
            error_kind: WorkerErrorKind::Handler,
        }
    }

    pub(crate) fn step(name: &str, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Error {
            source: Some(source.into()),
            error_kind: WorkerErrorKind::Step(name.to_string()),
        }
    }

    pub(crate) fn serialization(source: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(source)),
            error_kind: WorkerErrorKind::Serialization,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            WorkerErrorKind::Ledger => write!(f, "Run ledger error"),
            WorkerErrorKind::Step(name) => write!(f, "Step '{name}' failed"),
            WorkerErrorKind::Handler => write!(f, "Handler failed"),
            WorkerErrorKind::Serialization => write!(f, "Serialization error"),
            WorkerErrorKind::UnknownSubscriber(id) => write!(f, "Unknown subscriber: {id}"),
            WorkerErrorKind::Event => write!(f, "Stored event is invalid"),
            WorkerErrorKind::NotReplayable => write!(f, "Run is not in a replayable state"),
            WorkerErrorKind::RunNotFound => write!(f, "Run not found"),
            WorkerErrorKind::Scheduler => write!(f, "Scheduler error"),
        }?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<entity_api::error::Error> for Error {
    fn from(err: entity_api::error::Error) -> Self {
        let error_kind = match err.error_kind {
            entity_api::error::EntityApiErrorKind::RecordNotUpdated => {
                WorkerErrorKind::NotReplayable
            }
            entity_api::error::EntityApiErrorKind::RecordNotFound => WorkerErrorKind::RunNotFound,
            _ => WorkerErrorKind::Ledger,
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<events::Error> for Error {
    fn from(err: events::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: WorkerErrorKind::Event,
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for Error {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: WorkerErrorKind::Scheduler,
        }
    }
}
