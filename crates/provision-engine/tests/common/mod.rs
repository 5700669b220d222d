#![allow(dead_code)]

use async_trait::async_trait;
use provision_types::{
    Named, ProvisionContext, ProvisionError, ProvisionOperation, Provisionable, Result,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Start,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: usize,
    pub batch: usize,
    pub op: ProvisionOperation,
    pub mark: Mark,
}

/// Shared execution log, ordered by the moment each event was recorded
#[derive(Clone, Default)]
pub struct ExecutionLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn position(&self, id: usize, op: ProvisionOperation, mark: Mark) -> Option<usize> {
        self.events()
            .iter()
            .position(|e| e.id == id && e.op == op && e.mark == mark)
    }

    pub fn finished(&self, op: ProvisionOperation) -> Vec<usize> {
        self.events()
            .iter()
            .filter(|e| e.op == op && e.mark == Mark::Finish)
            .map(|e| e.id)
            .collect()
    }

    pub fn leaf(&self, id: usize, batch: usize, parallel: bool) -> Arc<Tracking> {
        Arc::new(Tracking {
            named: Named::new(id.to_string()),
            id,
            batch,
            parallel,
            delay: None,
            fail: HashSet::new(),
            log: self.clone(),
        })
    }

    /// `count` parallel leaves; ids stay unique across batches below 1000 items
    pub fn leaves(&self, count: usize, batch: usize) -> Vec<Arc<Tracking>> {
        self.leaves_with(&vec![true; count], batch)
    }

    /// One leaf per flag, parallel where the flag is set
    pub fn leaves_with(&self, parallel: &[bool], batch: usize) -> Vec<Arc<Tracking>> {
        parallel
            .iter()
            .enumerate()
            .map(|(i, p)| self.leaf(batch * 1000 + i, batch, *p))
            .collect()
    }
}

/// Leaf recording start/finish of every operation it runs
pub struct Tracking {
    named: Named,
    pub id: usize,
    pub batch: usize,
    pub parallel: bool,
    delay: Option<Duration>,
    fail: HashSet<ProvisionOperation>,
    log: ExecutionLog,
}

impl Tracking {
    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).ok().expect("leaf already shared");
        inner.delay = Some(delay);
        Arc::new(inner)
    }

    pub fn failing_on(self: Arc<Self>, op: ProvisionOperation) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).ok().expect("leaf already shared");
        inner.fail.insert(op);
        Arc::new(inner)
    }

    async fn track(&self, op: ProvisionOperation) -> Result<()> {
        let event = |mark| Event {
            id: self.id,
            batch: self.batch,
            op,
            mark,
        };

        self.log.push(event(Mark::Start));
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.log.push(event(Mark::Finish));

        if self.fail.contains(&op) {
            return Err(ProvisionError::resource(self.name(), "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Provisionable for Tracking {
    fn name(&self) -> &str {
        self.named.name()
    }

    async fn provision(&self, _ctx: &ProvisionContext) -> Result<()> {
        self.track(ProvisionOperation::Provision).await
    }

    async fn validate(&self, _ctx: &ProvisionContext) -> Result<()> {
        self.track(ProvisionOperation::Validate).await
    }

    async fn cleanup(&self, _ctx: &ProvisionContext) -> Result<()> {
        self.track(ProvisionOperation::Cleanup).await
    }

    async fn close(&self, _ctx: &ProvisionContext) -> Result<()> {
        self.track(ProvisionOperation::Close).await
    }

    fn is_executable_in_parallel(&self, _ctx: &ProvisionContext, _op: ProvisionOperation) -> bool {
        self.parallel
    }
}

pub fn dyns(leaves: &[Arc<Tracking>]) -> Vec<Arc<dyn Provisionable>> {
    leaves
        .iter()
        .map(|l| Arc::clone(l) as Arc<dyn Provisionable>)
        .collect()
}

/// Every serial leaf must neither overlap with nor be overtaken by any other
/// leaf of the flattened order: everything before it finishes before it
/// starts, everything after it starts after it finishes.
pub fn assert_serial_leaves_isolated(
    log: &ExecutionLog,
    flattened: &[Arc<Tracking>],
    op: ProvisionOperation,
) {
    let events = log.events();
    let pos = |id: usize, mark: Mark| {
        events
            .iter()
            .position(|e| e.id == id && e.op == op && e.mark == mark)
            .unwrap_or_else(|| panic!("leaf {id} never reached {mark:?} for {op}"))
    };

    for (k, leaf) in flattened.iter().enumerate() {
        if leaf.parallel {
            continue;
        }
        let start = pos(leaf.id, Mark::Start);
        let finish = pos(leaf.id, Mark::Finish);
        for before in &flattened[..k] {
            assert!(
                pos(before.id, Mark::Finish) < start,
                "leaf {} overlapped serial leaf {}",
                before.id,
                leaf.id
            );
        }
        for after in &flattened[k + 1..] {
            assert!(
                pos(after.id, Mark::Start) > finish,
                "leaf {} started before serial leaf {} finished",
                after.id,
                leaf.id
            );
        }
    }
}

/// Each leaf ran `op` exactly once
pub fn assert_each_ran_once(log: &ExecutionLog, leaves: &[Arc<Tracking>], op: ProvisionOperation) {
    let mut finished = log.finished(op);
    finished.sort_unstable();
    let mut expected: Vec<usize> = leaves.iter().map(|l| l.id).collect();
    expected.sort_unstable();
    assert_eq!(finished, expected, "{op} did not run exactly once per leaf");
}
