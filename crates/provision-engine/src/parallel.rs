//! Parallel/serial-aware batching executor
//!
//! A [`ParallelProvisioner`] runs its children for one operation as a
//! sequence of batches. Consecutive children eligible for parallel execution
//! share a batch; a child that is not eligible gets a batch of its own, which
//! keeps it from overlapping with anything before or after it. Nested
//! composites (anything exposing [`Provisionable::children`]) are flattened
//! into the scan so batching reasons about the whole tree.
//!
//! Batches run strictly one after another. Inside a batch the items are
//! sharded over a fixed number of worker tasks; a failing item does not stop
//! its siblings, but a failed batch stops the sequence.

use async_trait::async_trait;
use provision_types::{
    Named, Parallelizable, ProvisionContext, ProvisionError, ProvisionOperation, Provisionable,
    Result,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Worker tasks used per batch unless configured otherwise
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Group of leaves executed together
pub struct ExecutionBatch {
    items: Vec<Arc<dyn Provisionable>>,
}

impl ExecutionBatch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Arc<dyn Provisionable>] {
        &self.items
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for ExecutionBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Left-to-right scan producing execution batches
struct BatchPlanner<'a> {
    ctx: &'a ProvisionContext,
    op: ProvisionOperation,
    batches: Vec<ExecutionBatch>,
    current: Vec<Arc<dyn Provisionable>>,
}

impl<'a> BatchPlanner<'a> {
    fn new(ctx: &'a ProvisionContext, op: ProvisionOperation) -> Self {
        Self {
            ctx,
            op,
            batches: Vec::new(),
            current: Vec::new(),
        }
    }

    fn scan(&mut self, items: &[Arc<dyn Provisionable>]) {
        for item in items {
            let eligible = item.is_executable_in_parallel(self.ctx, self.op);
            match item.children() {
                Some(children) if eligible => self.scan(children),
                Some(children) => {
                    // a serial composite keeps its children apart from each other
                    for child in children {
                        self.isolate(child);
                    }
                }
                None if eligible => self.current.push(Arc::clone(item)),
                None => self.isolate(item),
            }
        }
    }

    /// Plan `item` so it overlaps neither with what precedes nor with what follows it
    fn isolate(&mut self, item: &Arc<dyn Provisionable>) {
        self.close_current();
        match item.children() {
            Some(_) => self.scan(std::slice::from_ref(item)),
            None => self.current.push(Arc::clone(item)),
        }
        self.close_current();
    }

    fn close_current(&mut self) {
        if !self.current.is_empty() {
            let items = std::mem::take(&mut self.current);
            self.batches.push(ExecutionBatch { items });
        }
    }

    fn finish(mut self) -> Vec<ExecutionBatch> {
        self.close_current();
        self.batches
    }
}

/// Composite provisionable running its children in parallel where allowed
pub struct ParallelProvisioner {
    named: Named,
    parallelizable: Parallelizable,
    provisionables: Vec<Arc<dyn Provisionable>>,
    worker_count: usize,
}

impl ParallelProvisioner {
    /// Composite that may run every operation in parallel
    pub fn new(provisionables: Vec<Arc<dyn Provisionable>>, name: impl Into<String>) -> Self {
        Self::with_parallelizable(provisionables, name, Parallelizable::all())
    }

    /// Composite that may only run `parallel_ops` in parallel; for every other
    /// operation its children run one after another.
    pub fn new_restricted(
        provisionables: Vec<Arc<dyn Provisionable>>,
        name: impl Into<String>,
        parallel_ops: impl IntoIterator<Item = ProvisionOperation>,
    ) -> Self {
        Self::with_parallelizable(provisionables, name, Parallelizable::only(parallel_ops))
    }

    fn with_parallelizable(
        provisionables: Vec<Arc<dyn Provisionable>>,
        name: impl Into<String>,
        parallelizable: Parallelizable,
    ) -> Self {
        Self {
            named: Named::new(name),
            parallelizable,
            provisionables,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }

    /// Override the number of worker tasks per batch (minimum 1)
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn len(&self) -> usize {
        self.provisionables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provisionables.is_empty()
    }

    pub fn provisionables(&self) -> &[Arc<dyn Provisionable>] {
        &self.provisionables
    }

    /// Compute the batches `op` would run in
    pub fn plan(&self, ctx: &ProvisionContext, op: ProvisionOperation) -> Vec<ExecutionBatch> {
        let mut planner = BatchPlanner::new(ctx, op);
        if self.parallelizable.is_executable_in_parallel(op) {
            planner.scan(&self.provisionables);
        } else {
            for item in &self.provisionables {
                planner.isolate(item);
            }
        }
        planner.finish()
    }

    /// Run `op` over every leaf, batch after batch
    #[instrument(skip_all, fields(provisioner = %self.named.name(), operation = %op))]
    pub async fn run(&self, ctx: &ProvisionContext, op: ProvisionOperation) -> Result<()> {
        let batches = self.plan(ctx, op);
        debug!(
            batches = batches.len(),
            items = batches.iter().map(ExecutionBatch::len).sum::<usize>(),
            "Planned execution batches"
        );

        for (index, batch) in batches.iter().enumerate() {
            if let Err(err) = self.run_batch(ctx, op, index, batch).await {
                warn!(
                    batch = index,
                    remaining = batches.len() - index - 1,
                    error = %err,
                    "Batch failed, stopping"
                );
                return Err(err);
            }
        }

        Ok(())
    }

    async fn run_batch(
        &self,
        ctx: &ProvisionContext,
        op: ProvisionOperation,
        index: usize,
        batch: &ExecutionBatch,
    ) -> Result<()> {
        if let [only] = batch.items() {
            return op.execute(ctx, only.as_ref()).await;
        }

        let shard_size = batch.len().div_ceil(self.worker_count);
        debug!(
            batch = index,
            items = batch.len(),
            shard_size,
            "Dispatching parallel batch"
        );

        let workers: Vec<_> = batch
            .items()
            .chunks(shard_size)
            .map(|shard| {
                let shard = shard.to_vec();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let mut failures = Vec::new();
                    for item in &shard {
                        if let Err(err) = op.execute(&ctx, item.as_ref()).await {
                            failures.push(err);
                        }
                    }
                    failures
                })
            })
            .collect();

        let mut failures = Vec::new();
        for joined in futures::future::join_all(workers).await {
            match joined {
                Ok(errs) => failures.extend(errs),
                Err(join_err) => failures.push(ProvisionError::WorkerPanicked {
                    batch: format!("{} batch {}", self.named.name(), index),
                    reason: join_err.to_string(),
                }),
            }
        }

        match ProvisionError::combine(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ParallelProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelProvisioner")
            .field("name", &self.named.name())
            .field("parallelizable", &self.parallelizable)
            .field("children", &self.provisionables.len())
            .field("worker_count", &self.worker_count)
            .finish()
    }
}

#[async_trait]
impl Provisionable for ParallelProvisioner {
    fn name(&self) -> &str {
        self.named.name()
    }

    async fn provision(&self, ctx: &ProvisionContext) -> Result<()> {
        self.run(ctx, ProvisionOperation::Provision).await
    }

    async fn validate(&self, ctx: &ProvisionContext) -> Result<()> {
        self.run(ctx, ProvisionOperation::Validate).await
    }

    async fn cleanup(&self, ctx: &ProvisionContext) -> Result<()> {
        self.run(ctx, ProvisionOperation::Cleanup).await
    }

    async fn close(&self, ctx: &ProvisionContext) -> Result<()> {
        self.run(ctx, ProvisionOperation::Close).await
    }

    fn is_executable_in_parallel(&self, _ctx: &ProvisionContext, op: ProvisionOperation) -> bool {
        self.parallelizable.is_executable_in_parallel(op)
    }

    fn children(&self) -> Option<&[Arc<dyn Provisionable>]> {
        Some(&self.provisionables)
    }
}
