use crate::error::Error;
use crate::ledger::RunLedger;
use entity_api::Id;
use log::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

/// Checkpointing handle passed to a subscriber for one run.
///
/// A step's output is stored under (run id, step name) the first time the step
/// succeeds. Later attempts of the same run get the stored output back without
/// executing the step again.
#[derive(Clone)]
pub struct StepContext {
    run_id: Id,
    attempt: u32,
    ledger: Arc<dyn RunLedger>,
}

impl StepContext {
    pub fn new(run_id: Id, attempt: u32, ledger: Arc<dyn RunLedger>) -> Self {
        Self {
            run_id,
            attempt,
            ledger,
        }
    }

    pub fn run_id(&self) -> Id {
        self.run_id
    }

    /// 1-based attempt number of the current run.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Id that stays the same across every attempt of this run for the same
    /// `scope`. Used as the primary key of rows a step writes so a retry after
    /// a lost checkpoint hits the existing row instead of inserting another.
    pub fn idempotency_key(&self, scope: &str) -> Id {
        Id::new_v5(&self.run_id, scope.as_bytes())
    }

    /// Runs `step` unless it already completed for this run.
    pub async fn run<T, E, F, Fut>(&self, name: &str, step: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        E: Into<Box<dyn StdError + Send + Sync>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(stored) = self.ledger.load_checkpoint(self.run_id, name).await? {
            debug!("Run {}: step '{name}' already completed, reusing output", self.run_id);
            return serde_json::from_value(stored).map_err(Error::serialization);
        }

        let output = step().await.map_err(|err| Error::step(name, err))?;

        let value = serde_json::to_value(&output).map_err(Error::serialization)?;
        self.ledger
            .save_checkpoint(self.run_id, name, value)
            .await?;

        trace!("Run {}: step '{name}' checkpointed", self.run_id);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;

    #[test]
    fn idempotency_key_depends_on_run_and_scope_only() {
        let ledger: Arc<dyn RunLedger> = Arc::new(MemoryLedger::new());
        let run_id = Id::new_v4();
        let first = StepContext::new(run_id, 1, Arc::clone(&ledger));
        let retry = StepContext::new(run_id, 3, Arc::clone(&ledger));
        let other_run = StepContext::new(Id::new_v4(), 1, ledger);

        assert_eq!(
            first.idempotency_key("send-notification"),
            retry.idempotency_key("send-notification")
        );
        assert_ne!(
            first.idempotency_key("send-notification"),
            first.idempotency_key("emit-recommendation")
        );
        assert_ne!(
            first.idempotency_key("send-notification"),
            other_run.idempotency_key("send-notification")
        );
    }
}
