//! Bounded-concurrency fan-out
//!
//! Splits a flat list into fixed-size groups so that at most one group's
//! worth of heavy resources (typically one DB handle per provisionable) is
//! open at a time.

use crate::config::EngineConfig;
use crate::parallel::{ParallelProvisioner, DEFAULT_WORKER_COUNT};
use provision_types::{
    Named, ProvisionContext, ProvisionError, ProvisionOperation, Provisionable, Result,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Runs groups of provisionables strictly one after another
#[derive(Debug)]
pub struct BatchProvisioner {
    named: Named,
    batches: Vec<ParallelProvisioner>,
}

impl BatchProvisioner {
    pub fn new(
        name: impl Into<String>,
        provisionables: Vec<Arc<dyn Provisionable>>,
        batch_size: usize,
    ) -> Result<Self> {
        Self::build(name.into(), provisionables, batch_size, DEFAULT_WORKER_COUNT)
    }

    /// Use the configured default batch size and worker count
    pub fn from_config(
        name: impl Into<String>,
        provisionables: Vec<Arc<dyn Provisionable>>,
        config: &EngineConfig,
    ) -> Result<Self> {
        Self::build(
            name.into(),
            provisionables,
            config.default_batch_size,
            config.worker_count,
        )
    }

    fn build(
        name: String,
        provisionables: Vec<Arc<dyn Provisionable>>,
        batch_size: usize,
        worker_count: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(ProvisionError::InvalidBatchSize(batch_size));
        }

        let batches = provisionables
            .chunks(batch_size)
            .enumerate()
            .map(|(i, chunk)| {
                ParallelProvisioner::new(chunk.to_vec(), format!("{name}:Batch({})", i + 1))
                    .with_worker_count(worker_count)
            })
            .collect();

        Ok(Self {
            named: Named::new(name),
            batches,
        })
    }

    pub fn name(&self) -> &str {
        self.named.name()
    }

    pub fn batches(&self) -> &[ParallelProvisioner] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Run every operation of `ops`, in order, on one batch before moving to
    /// the next. Failures are collected and do not stop later batches.
    #[instrument(skip_all, fields(provisioner = %self.named.name(), batches = self.batches.len()))]
    pub async fn execute(&self, ctx: &ProvisionContext, ops: &[ProvisionOperation]) -> Result<()> {
        if ops.is_empty() {
            return Err(ProvisionError::NoOperations);
        }

        let mut failures = Vec::new();
        for (index, batch) in self.batches.iter().enumerate() {
            info!(batch = index + 1, items = batch.len(), "Starting batch");
            for op in ops {
                if let Err(err) = op.execute(ctx, batch).await {
                    warn!(batch = index + 1, operation = %op, error = %err, "Batch operation failed");
                    failures.push(err);
                }
            }
        }

        match ProvisionError::combine(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
