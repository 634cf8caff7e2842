//! Typed event registry and emitter for the coaching pipeline.
//!
//! Every event that flows through the system has a name from a closed
//! vocabulary ([`EventName`]) and a strongly-typed payload. [`EventEmitter`]
//! validates events before handing them to an [`EventQueue`], so subscribers
//! only ever see payloads that passed validation.
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies.

mod emitter;
mod error;
mod event;
mod name;
pub mod payload;

pub use emitter::{EventEmitter, EventQueue};
pub use error::{Error, EventErrorKind};
pub use event::{DomainEvent, EventEnvelope};
pub use name::EventName;

/// A type alias that represents any Entity's internal id field data type.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = uuid::Uuid;
