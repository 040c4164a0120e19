//! Bounded, compensating execution: a tier of apply units runs under a
//! shared semaphore, failures stream into a single consumer, and every
//! successful write leaves behind a closure that can undo it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::error::{error_strings, ApplyError, ApplyFailure, FailureGroup};
use crate::ports::BoxFuture;

/// Deadline for one unit of apply work against a downstream service.
pub(crate) const APPLY_UNIT_TIMEOUT: Duration = Duration::from_secs(30);

/// One unit of apply work: a single resource create/update, pre-bound to its
/// org, service handle, and reconciliation records.
pub(crate) struct ApplyUnit {
    /// Package-name, for error attribution when the unit itself cannot
    /// report (timeout).
    pub name: String,
    pub fut: BoxFuture<'static, Option<ApplyFailure>>,
}

/// A tier member: the units for one resource kind plus the closure that
/// undoes whatever those units recorded.
pub(crate) struct Applier {
    pub resource: &'static str,
    pub units: Vec<ApplyUnit>,
    pub rollback: Rollback,
}

type RollbackFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

pub(crate) struct Rollback {
    pub resource: &'static str,
    run: RollbackFn,
}

impl Rollback {
    pub(crate) fn new<F>(resource: &'static str, run: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), String>> + Send + 'static,
    {
        Rollback {
            resource,
            run: Box::new(run),
        }
    }

    /// A rollback that has nothing to undo.
    pub(crate) fn noop(resource: &'static str) -> Self {
        Rollback::new(resource, || Box::pin(async { Ok(()) }))
    }
}

struct ErrMsg {
    resource: &'static str,
    failure: ApplyFailure,
}

/// Aggregates per-resource failures produced by concurrent units. Producers
/// send; the single consumer drains on `close`, grouping by resource kind.
/// Nothing sent before close can be lost — the channel is unbounded and is
/// drained to completion after every producer is done.
struct ErrStream {
    tx: mpsc::UnboundedSender<ErrMsg>,
    rx: mpsc::UnboundedReceiver<ErrMsg>,
}

impl ErrStream {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        ErrStream { tx, rx }
    }

    fn sender(&self) -> mpsc::UnboundedSender<ErrMsg> {
        self.tx.clone()
    }

    async fn close(mut self) -> Option<ApplyError> {
        drop(self.tx);
        let mut grouped: BTreeMap<&'static str, Vec<ApplyFailure>> = BTreeMap::new();
        while let Some(msg) = self.rx.recv().await {
            grouped.entry(msg.resource).or_default().push(msg.failure);
        }

        if grouped.is_empty() {
            return None;
        }
        Some(ApplyError {
            groups: grouped
                .into_iter()
                .map(|(resource, failures)| FailureGroup {
                    resource_type: resource.to_string(),
                    action: error_strings::FAILED_TO_CREATE.to_string(),
                    failures,
                })
                .collect(),
        })
    }
}

/// Collects rollback closures as tiers execute and replays them, newest
/// kind first, when an apply fails or is abandoned.
pub(crate) struct RollbackCoordinator {
    sem: Arc<Semaphore>,
    rollbacks: Vec<Rollback>,
    armed: bool,
}

impl RollbackCoordinator {
    pub(crate) fn new(apply_req_limit: usize) -> Self {
        RollbackCoordinator {
            sem: Arc::new(Semaphore::new(apply_req_limit.max(1))),
            rollbacks: Vec::new(),
            armed: true,
        }
    }

    /// Run every unit of every applier in the tier, bounded by the shared
    /// semaphore, and wait for all of them even after a failure. Rollback
    /// closures are recorded before dispatch so partially-applied kinds are
    /// still covered.
    pub(crate) async fn run_til_end(
        &mut self,
        appliers: Vec<Applier>,
    ) -> Result<(), ApplyError> {
        let stream = ErrStream::new();
        let mut tasks = JoinSet::new();

        for applier in appliers {
            let resource = applier.resource;
            self.rollbacks.push(applier.rollback);

            for unit in applier.units {
                let sem = Arc::clone(&self.sem);
                let tx = stream.sender();
                tasks.spawn(async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return;
                    };
                    let failure = match timeout(APPLY_UNIT_TIMEOUT, unit.fut).await {
                        Ok(failure) => failure,
                        Err(_) => Some(ApplyFailure {
                            name: unit.name,
                            msg: format!(
                                "timed out after {}s",
                                APPLY_UNIT_TIMEOUT.as_secs()
                            ),
                        }),
                    };
                    if let Some(failure) = failure {
                        let _ = tx.send(ErrMsg { resource, failure });
                    }
                });
            }
        }

        while tasks.join_next().await.is_some() {}

        match stream.close().await {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Nothing more to undo; the apply committed.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
        self.rollbacks.clear();
    }

    /// Replay recorded rollbacks, last recorded kind first. Failures are
    /// logged, never returned — one failed undo must not stop the rest.
    pub(crate) async fn rollback(&mut self) {
        self.armed = false;
        let rollbacks = std::mem::take(&mut self.rollbacks);
        replay(rollbacks).await;
    }
}

impl Drop for RollbackCoordinator {
    /// An apply future dropped mid-flight (caller cancellation) still rolls
    /// back whatever was recorded, on a background task the cancellation
    /// cannot reach.
    fn drop(&mut self) {
        if !self.armed || self.rollbacks.is_empty() {
            return;
        }
        let rollbacks = std::mem::take(&mut self.rollbacks);
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(replay(rollbacks));
        } else {
            tracing::error!(
                pending = rollbacks.len(),
                "apply dropped outside a runtime; rollback skipped"
            );
        }
    }
}

async fn replay(rollbacks: Vec<Rollback>) {
    for rollback in rollbacks.into_iter().rev() {
        let resource = rollback.resource;
        if let Err(err) = (rollback.run)().await {
            tracing::error!(resource, error = %err, "failed to roll back");
        } else {
            tracing::debug!(resource, "rolled back");
        }
    }
}
