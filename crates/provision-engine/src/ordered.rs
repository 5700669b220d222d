//! Dependency-to-phase compiler
//!
//! Steps are registered as [`OrderedProvisionable`]s: a name, the names of the
//! steps that must finish first, and a factory producing the step's
//! provisionables. [`OrderedProvisioner::compile`] validates the graph, calls
//! every factory exactly once and groups the steps into phases. Phases run one
//! after another for every operation except `Validate`, which may overlap
//! across phases.

use crate::config::EngineConfig;
use crate::parallel::{ParallelProvisioner, DEFAULT_WORKER_COUNT};
use async_trait::async_trait;
use provision_types::{
    Named, ProvisionContext, ProvisionError, ProvisionOperation, Provisionable, Result,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

type Factory = Box<dyn FnOnce() -> Vec<Arc<dyn Provisionable>> + Send>;

/// A named step of an [`OrderedProvisioner`]
pub struct OrderedProvisionable {
    name: String,
    dependencies: Vec<String>,
    factory: Factory,
}

impl OrderedProvisionable {
    /// Wrap a factory; it is invoked once, when the owning provisioner compiles.
    pub fn new<F>(factory: F) -> Self
    where
        F: FnOnce() -> Vec<Arc<dyn Provisionable>> + Send + 'static,
    {
        Self {
            name: String::new(),
            dependencies: Vec::new(),
            factory: Box::new(factory),
        }
    }

    /// Step with an already materialised list of provisionables
    pub fn from_provisionables(provisionables: Vec<Arc<dyn Provisionable>>) -> Self {
        Self::new(move || provisionables)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Require the named steps to complete before this one starts
    pub fn after<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in dependencies {
            let dep = dep.into();
            if !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl fmt::Debug for OrderedProvisionable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedProvisionable")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Step after its factory ran
struct FinalizedStep {
    name: String,
    dependencies: Vec<String>,
    provisionables: Vec<Arc<dyn Provisionable>>,
}

/// One sequential unit of a compiled plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    /// 1-based position
    pub number: usize,
    /// Steps whose provisionables run in this phase, in registration order
    pub steps: Vec<String>,
}

/// Result of compiling an [`OrderedProvisioner`]
pub struct PhasePlan {
    phases: Vec<Phase>,
    skipped: Vec<String>,
    root: ParallelProvisioner,
}

impl PhasePlan {
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Steps whose factory produced nothing; they never occupy a phase
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Phase number a step was placed in, if any
    pub fn phase_of(&self, step: &str) -> Option<usize> {
        self.phases
            .iter()
            .find(|p| p.steps.iter().any(|s| s == step))
            .map(|p| p.number)
    }

    pub fn root(&self) -> &ParallelProvisioner {
        &self.root
    }

    pub fn into_provisionable(self) -> Arc<dyn Provisionable> {
        Arc::new(self.root)
    }
}

impl fmt::Debug for PhasePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhasePlan")
            .field("phases", &self.phases)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

/// Builder compiling named, dependency-ordered steps into one provisionable
pub struct OrderedProvisioner {
    name: String,
    steps: Vec<OrderedProvisionable>,
    worker_count: usize,
}

impl OrderedProvisioner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.worker_count = config.worker_count;
        self
    }

    pub fn add_provisionables(
        &mut self,
        steps: impl IntoIterator<Item = OrderedProvisionable>,
    ) -> &mut Self {
        self.steps.extend(steps);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check names are present and unique and every dependency is registered
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.steps.len());
        for step in &self.steps {
            if step.name.is_empty() {
                return Err(ProvisionError::EmptyName);
            }
            if !names.insert(step.name.as_str()) {
                return Err(ProvisionError::DuplicateName(step.name.clone()));
            }
        }

        for step in &self.steps {
            if let Some(dep) = step.dependencies.iter().find(|d| !names.contains(d.as_str())) {
                return Err(ProvisionError::UnresolvedDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        Ok(())
    }

    /// Validate, materialise every step and group them into phases
    pub fn compile(self) -> Result<PhasePlan> {
        self.validate()?;

        let OrderedProvisioner {
            name,
            steps,
            worker_count,
        } = self;
        let mut remaining = finalize(steps);

        let mut scheduled: HashSet<String> = HashSet::with_capacity(remaining.len());
        let mut phases = Vec::new();
        let mut phase_provisioners: Vec<Arc<dyn Provisionable>> = Vec::new();
        let mut skipped = Vec::new();

        while !remaining.is_empty() {
            let mut progressed = false;

            // steps without provisionables are folded in as soon as they are
            // ready so they never hold up a dependent
            loop {
                let (empty, rest): (Vec<_>, Vec<_>) = remaining
                    .into_iter()
                    .partition(|s| s.provisionables.is_empty() && is_ready(s, &scheduled));
                remaining = rest;
                if empty.is_empty() {
                    break;
                }
                for step in empty {
                    debug!(provisioner = %name, step = %step.name, "Step has no provisionables, skipping");
                    scheduled.insert(step.name.clone());
                    skipped.push(step.name);
                }
                progressed = true;
            }

            let (ready, rest): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|s| is_ready(s, &scheduled));
            remaining = rest;

            if !ready.is_empty() {
                let number = phases.len() + 1;
                let steps: Vec<String> = ready.iter().map(|s| s.name.clone()).collect();
                debug!(provisioner = %name, phase = number, steps = ?steps, "Scheduled phase");

                let phase_name = format!("{name}:Phase({number})");
                let mut members: Vec<Arc<dyn Provisionable>> =
                    vec![Arc::new(PhaseMarker::new(&phase_name, number, steps.len(), Edge::Start))];
                for step in ready {
                    members.extend(step.provisionables);
                    scheduled.insert(step.name);
                }
                members.push(Arc::new(PhaseMarker::new(
                    &phase_name,
                    number,
                    steps.len(),
                    Edge::End,
                )));

                phase_provisioners.push(Arc::new(
                    ParallelProvisioner::new(members, phase_name).with_worker_count(worker_count),
                ));
                phases.push(Phase { number, steps });
                progressed = true;
            }

            if !progressed {
                return Err(ProvisionError::Unschedulable {
                    remaining: remaining.into_iter().map(|s| s.name).collect(),
                });
            }
        }

        info!(
            provisioner = %name,
            phases = phases.len(),
            skipped = skipped.len(),
            "Compiled provisioning phases"
        );

        let root = ParallelProvisioner::new_restricted(
            phase_provisioners,
            name,
            [ProvisionOperation::Validate],
        )
        .with_worker_count(worker_count);

        Ok(PhasePlan {
            phases,
            skipped,
            root,
        })
    }

    /// Compile into the root provisionable
    pub fn create_provisionable(self) -> Result<Arc<dyn Provisionable>> {
        Ok(self.compile()?.into_provisionable())
    }
}

fn finalize(steps: Vec<OrderedProvisionable>) -> Vec<FinalizedStep> {
    steps
        .into_iter()
        .map(|step| FinalizedStep {
            name: step.name,
            dependencies: step.dependencies,
            provisionables: (step.factory)(),
        })
        .collect()
}

fn is_ready(step: &FinalizedStep, scheduled: &HashSet<String>) -> bool {
    step.dependencies.iter().all(|d| scheduled.contains(d))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// Logs phase boundaries.
///
/// Serial for every mutating operation so it brackets the phase members;
/// eligible for `Validate` so it never blocks cross-phase validation.
struct PhaseMarker {
    named: Named,
    phase: usize,
    steps: usize,
    edge: Edge,
}

impl PhaseMarker {
    fn new(phase_name: &str, phase: usize, steps: usize, edge: Edge) -> Self {
        let suffix = match edge {
            Edge::Start => "start",
            Edge::End => "end",
        };
        Self {
            named: Named::new(format!("{phase_name}:{suffix}")),
            phase,
            steps,
            edge,
        }
    }

    fn mark(&self, op: ProvisionOperation) {
        match self.edge {
            Edge::Start => info!(
                marker = %self.named.name(),
                phase = self.phase,
                steps = self.steps,
                operation = %op,
                "Phase started"
            ),
            Edge::End => info!(
                marker = %self.named.name(),
                phase = self.phase,
                operation = %op,
                "Phase finished"
            ),
        }
    }
}

#[async_trait]
impl Provisionable for PhaseMarker {
    fn name(&self) -> &str {
        self.named.name()
    }

    async fn provision(&self, _ctx: &ProvisionContext) -> Result<()> {
        self.mark(ProvisionOperation::Provision);
        Ok(())
    }

    async fn validate(&self, _ctx: &ProvisionContext) -> Result<()> {
        self.mark(ProvisionOperation::Validate);
        Ok(())
    }

    async fn cleanup(&self, _ctx: &ProvisionContext) -> Result<()> {
        self.mark(ProvisionOperation::Cleanup);
        Ok(())
    }

    async fn close(&self, _ctx: &ProvisionContext) -> Result<()> {
        self.mark(ProvisionOperation::Close);
        Ok(())
    }

    fn is_executable_in_parallel(&self, _ctx: &ProvisionContext, op: ProvisionOperation) -> bool {
        op == ProvisionOperation::Validate
    }
}
