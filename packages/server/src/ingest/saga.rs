//! Sequential steps with compensating actions.
//!
//! Steps run in order. When step N fails, the compensations of steps
//! `0..N` run in reverse order and the step's error is returned. A failed
//! compensation is logged and never replaces the original error.

use async_trait::async_trait;
use tracing::{error, warn};

use super::IngestError;

#[async_trait]
pub trait SagaStep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self) -> Result<(), IngestError>;

    /// Undo a successful [`execute`](SagaStep::execute).
    async fn compensate(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct Saga<'a> {
    steps: Vec<Box<dyn SagaStep + 'a>>,
}

impl<'a> Saga<'a> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn step(mut self, step: impl SagaStep + 'a) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub async fn run(self) -> Result<(), IngestError> {
        for (index, step) in self.steps.iter().enumerate() {
            let Err(err) = step.execute().await else {
                continue;
            };

            warn!(step = step.name(), "Step failed, compensating: {err}");
            for done in self.steps[..index].iter().rev() {
                if let Err(comp_err) = done.compensate().await {
                    error!(step = done.name(), "Compensation failed: {comp_err:#}");
                }
            }
            return Err(err);
        }
        Ok(())
    }
}
