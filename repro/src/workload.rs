//! Load generator: bounded bursts of container/blob create-delete
//! cycles used purely as a bug trigger.
//!
//! Failures are recorded per cycle and never propagated out of a run;
//! the workload is not a correctness-critical transaction and a
//! partial failure must never prevent the thread diagnosis step from
//! running. Callers invoke the diagnoser as an explicit next step.

use crate::store::{ObjectStore, StoreError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tls13_repro_core::{blob_name, container_name, WorkloadShape};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Result of one container cycle.
#[derive(Debug)]
pub struct CycleOutcome {
    pub container: String,
    pub result: Result<(), StoreError>,
}

/// Aggregated per-cycle outcomes of one load round.
#[derive(Debug, Default)]
pub struct WorkloadReport {
    pub outcomes: Vec<CycleOutcome>,
}

impl WorkloadReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// Logs the round summary and every failed cycle.
    pub fn log(&self) {
        for outcome in &self.outcomes {
            if let Err(err) = &outcome.result {
                warn!(container = %outcome.container, "cycle failed: {err}");
            }
        }
        info!(
            cycles = self.outcomes.len(),
            failures = self.failures(),
            "load round finished"
        );
    }
}

/// One container cycle: create `container{index}`, put the fixed-size
/// blobs, delete the container. A failed blob put is recorded but does
/// not skip the container delete.
async fn run_cycle<S: ObjectStore>(
    store: &S,
    index: usize,
    shape: WorkloadShape,
) -> Result<(), StoreError> {
    let container = container_name(index);
    store.create_container(&container).await?;

    let mut first_err = None;
    for j in 0..shape.blobs_per_container {
        if let Err(err) = store.put_blob(&container, &blob_name(j), shape.blob_size).await {
            warn!(%container, blob = j, "blob creation failed: {err}");
            first_err.get_or_insert(err);
        }
    }

    store.delete_container(&container).await?;

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Runs the container cycles strictly in order. A failed cycle never
/// aborts the remaining ones.
pub async fn run_sequential<S: ObjectStore>(store: &S, shape: WorkloadShape) -> WorkloadReport {
    let mut report = WorkloadReport::default();
    for i in 0..shape.containers {
        let container = container_name(i);
        let result = run_cycle(store, i, shape).await;
        report.outcomes.push(CycleOutcome { container, result });
    }
    report
}

/// Runs the container cycles concurrently on the runtime's worker
/// pool, waiting up to `ceiling` for the whole batch. When the ceiling
/// is hit the remaining cycles are left to run out on their own and
/// the report covers only the finished ones; no further work may be
/// issued against the pool after this returns.
///
/// This is the async rendition of the concurrent round for callers on
/// the async store; the shipped legacy binary drives the thread-based
/// [`blocking::run_round`] instead.
pub async fn run_pooled<S>(store: Arc<S>, shape: WorkloadShape, ceiling: Duration) -> WorkloadReport
where
    S: ObjectStore + Send + Sync + 'static,
{
    let mut cycles = JoinSet::new();
    for i in 0..shape.containers {
        let store = Arc::clone(&store);
        cycles.spawn(async move {
            let container = container_name(i);
            let result = run_cycle(store.as_ref(), i, shape).await;
            CycleOutcome { container, result }
        });
    }

    let mut report = WorkloadReport::default();
    let deadline = Instant::now() + ceiling;
    while !cycles.is_empty() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, cycles.join_next()).await {
            Ok(Some(Ok(outcome))) => report.outcomes.push(outcome),
            Ok(Some(Err(join_err))) => warn!("container cycle panicked: {join_err}"),
            Ok(None) => break,
            Err(_) => {
                warn!(
                    outstanding = cycles.len(),
                    "pool wait ceiling hit, proceeding to diagnosis"
                );
                cycles.detach_all();
                break;
            }
        }
    }
    report
}

/// Deletes every pre-existing container in the account so a run
/// starts from a clean slate.
pub async fn clear_account<S: ObjectStore>(store: &S) -> Result<(), StoreError> {
    for name in store.list_containers().await? {
        store.delete_container_if_exists(&name).await?;
    }
    Ok(())
}

pub mod blocking {
    //! Synchronous load rounds for the legacy (Track 1) variant. The
    //! cycles of a round run concurrently on spawned threads with a
    //! bounded wait for the batch; straggler threads are left running.

    use super::{CycleOutcome, WorkloadReport};
    use crate::store::blocking::BlobStore;
    use crate::store::StoreError;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};
    use tls13_repro_core::{blob_name, container_name, WorkloadShape};
    use tracing::warn;

    fn run_cycle(store: &BlobStore, index: usize, shape: WorkloadShape) -> Result<(), StoreError> {
        let container = container_name(index);
        store.create_container(&container)?;

        let mut first_err = None;
        for j in 0..shape.blobs_per_container {
            if let Err(err) = store.put_blob(&container, &blob_name(j), shape.blob_size) {
                warn!(%container, blob = j, "blob creation failed: {err}");
                first_err.get_or_insert(err);
            }
        }

        store.delete_container(&container)?;

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// One legacy load round: clear the account, run the container
    /// cycles concurrently with a bounded wait, then issue the
    /// trailing delete of the bare `container` name.
    pub fn run_round(store: &Arc<BlobStore>, shape: WorkloadShape, ceiling: Duration) -> WorkloadReport {
        let mut report = WorkloadReport::default();

        if let Err(err) = clear_account(store) {
            warn!("failed to clear pre-existing containers: {err}");
        }

        let (tx, rx) = mpsc::channel();
        for i in 0..shape.containers {
            let store = Arc::clone(store);
            let tx = tx.clone();
            thread::spawn(move || {
                let container = container_name(i);
                let result = run_cycle(&store, i, shape);
                // The receiver may have given up on the batch already.
                let _ = tx.send(CycleOutcome { container, result });
            });
        }
        drop(tx);

        let deadline = Instant::now() + ceiling;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    warn!("pool wait ceiling hit, proceeding to diagnosis");
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        report.outcomes.push(CycleOutcome {
            container: "container".to_string(),
            result: store.delete_container("container"),
        });

        report
    }

    fn clear_account(store: &BlobStore) -> Result<(), StoreError> {
        for name in store.list_containers()? {
            store.delete_container_if_exists(&name)?;
        }
        Ok(())
    }
}
