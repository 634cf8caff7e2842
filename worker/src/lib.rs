//! Durable subscriber runtime.
//!
//! Events accepted by [`DurableQueue`] are stored together with one pending
//! run per registered [`Subscriber`]. The [`Runtime`] claims due runs from the
//! [`RunLedger`], executes them concurrently, and retries failures with
//! exponential backoff until a subscriber's attempt budget is spent. Runs that
//! exhaust their attempts are kept as `failed` for inspection and replay.
//!
//! Inside a handler, [`StepContext::run`] memoizes each named step so a retry
//! resumes after the last step that completed.
//!
//! Periodic work enters the same way: [`scheduler`] emits a `schedule.fired`
//! event per cron tick and ordinary subscribers pick it up.

pub mod backoff;
mod error;
pub mod ledger;
pub mod memory;
mod queue;
pub mod runtime;
pub mod scheduler;
mod step;
mod subscriber;

pub use backoff::Backoff;
pub use error::{Error, WorkerErrorKind};
pub use ledger::{ClaimedRun, PostgresLedger, RunLedger};
pub use memory::MemoryLedger;
pub use queue::DurableQueue;
pub use runtime::{RunOutcome, Runtime, RuntimeConfig};
pub use scheduler::{start_scheduler, CronSchedule, JobScheduler};
pub use step::StepContext;
pub use subscriber::{Registry, Subscriber, DEFAULT_MAX_ATTEMPTS};
