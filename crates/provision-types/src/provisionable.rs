//! The provisionable capability and its helper building blocks

use crate::context::ProvisionContext;
use crate::error::Result;
use crate::operation::ProvisionOperation;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// A unit of idempotent resource lifecycle management.
///
/// Implementations are opaque to the scheduler: it only asks for the name,
/// whether an operation may overlap with siblings, and (for composites) the
/// list of children to splice into its scan.
#[async_trait]
pub trait Provisionable: Send + Sync {
    /// Stable identity used in logs and errors
    fn name(&self) -> &str;

    /// Create or update the resource. Must be safe to call repeatedly.
    async fn provision(&self, ctx: &ProvisionContext) -> Result<()>;

    /// Check, without mutating anything, that the resource matches expectation
    async fn validate(&self, ctx: &ProvisionContext) -> Result<()>;

    /// Remove the resource. Must tolerate the resource already being absent.
    async fn cleanup(&self, ctx: &ProvisionContext) -> Result<()>;

    /// Release held resources. The owner must always eventually call this.
    async fn close(&self, _ctx: &ProvisionContext) -> Result<()> {
        Ok(())
    }

    /// Whether `op` may run concurrently with other provisionables at the same level
    fn is_executable_in_parallel(&self, ctx: &ProvisionContext, op: ProvisionOperation) -> bool;

    /// Children of a composite provisionable.
    ///
    /// Composites returning `Some` are flattened by the batch planner: their
    /// children are scanned in place and the composite's own operation methods
    /// are never invoked by an enclosing scheduler.
    fn children(&self) -> Option<&[Arc<dyn Provisionable>]> {
        None
    }
}

/// Immutable name assigned at construction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Named {
    name: String,
}

impl Named {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Declares which operations may run in parallel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parallelizable {
    /// Every operation may run in parallel
    All,
    /// Only the listed operations may run in parallel
    Only(HashSet<ProvisionOperation>),
}

impl Parallelizable {
    pub fn all() -> Self {
        Parallelizable::All
    }

    pub fn only(ops: impl IntoIterator<Item = ProvisionOperation>) -> Self {
        Parallelizable::Only(ops.into_iter().collect())
    }

    /// No operation may run in parallel
    pub fn none() -> Self {
        Parallelizable::Only(HashSet::new())
    }

    pub fn is_executable_in_parallel(&self, op: ProvisionOperation) -> bool {
        match self {
            Parallelizable::All => true,
            Parallelizable::Only(ops) => ops.contains(&op),
        }
    }
}

impl Default for Parallelizable {
    fn default() -> Self {
        Self::none()
    }
}
