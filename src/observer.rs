//! Anchor transaction pipeline: parallel batch assembly with ordered
//! commit into the operation index.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::{Result, SidetreeError};
use crate::operation::model::AnchoredOperation;
use crate::provider::{AnchorTransaction, OperationProvider};
use crate::store::OperationStore;

/// A batch failure surfaced on the error channel, distinct from the
/// operation output path.
#[derive(Debug)]
pub struct ObservedError {
    pub transaction: AnchorTransaction,
    pub error: SidetreeError,
}

type AssemblyResult = (u64, AnchorTransaction, Result<Vec<AnchoredOperation>>);

/// Consumes anchor transactions in observation order, assembles their
/// batches on a worker pool and commits operations to the store in the
/// original order. A failed batch commits nothing and is reported on the
/// error channel; later batches still commit.
pub struct Observer {
    work_tx: Sender<Option<(u64, AnchorTransaction)>>,
    error_rx: Receiver<ObservedError>,
    cancel: CancellationToken,
    next_seq: AtomicU64,
    num_workers: usize,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    committer: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Observer {
    pub fn start(
        provider: Arc<OperationProvider>,
        store: Arc<dyn OperationStore>,
        num_workers: usize,
    ) -> Self {
        let num_workers = num_workers.max(1);
        let (work_tx, work_rx) = unbounded::<Option<(u64, AnchorTransaction)>>();
        let (done_tx, done_rx) = unbounded::<AssemblyResult>();
        let (error_tx, error_rx) = unbounded::<ObservedError>();
        let cancel = CancellationToken::new();

        let mut workers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            let provider = provider.clone();
            let cancel = cancel.clone();
            workers.push(thread::spawn(move || {
                while let Ok(Some((seq, txn))) = work_rx.recv() {
                    let result = if cancel.is_cancelled() {
                        Err(SidetreeError::Cancelled)
                    } else {
                        provider.transaction_operations(&txn, &cancel)
                    };
                    if done_tx.send((seq, txn, result)).is_err() {
                        break;
                    }
                }
            }));
        }
        // Workers own the only senders; the committer exits once all of
        // them are gone.
        drop(done_tx);

        let committer = thread::spawn(move || {
            let mut pending: BTreeMap<u64, (AnchorTransaction, Result<Vec<AnchoredOperation>>)> =
                BTreeMap::new();
            let mut next_commit = 0u64;

            while let Ok((seq, txn, result)) = done_rx.recv() {
                pending.insert(seq, (txn, result));

                while let Some((txn, result)) = pending.remove(&next_commit) {
                    commit(&*store, &error_tx, txn, result);
                    next_commit += 1;
                }
            }

            if !pending.is_empty() {
                warn!(
                    dropped = pending.len(),
                    "observer stopped with unassembled batches pending"
                );
            }
        });

        Self {
            work_tx,
            error_rx,
            cancel,
            next_seq: AtomicU64::new(0),
            num_workers,
            workers: Mutex::new(workers),
            committer: Mutex::new(Some(committer)),
        }
    }

    /// Enqueues one observed anchor transaction. Submission order is the
    /// commit order.
    pub fn submit(&self, transaction: AnchorTransaction) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SidetreeError::Cancelled);
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.work_tx
            .send(Some((seq, transaction)))
            .map_err(|_| SidetreeError::Cancelled)
    }

    /// Receiver of per-batch failures.
    pub fn errors(&self) -> Receiver<ObservedError> {
        self.error_rx.clone()
    }

    /// Token shared with in-flight assembly work.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops accepting work, drains in-flight batches and joins the
    /// pipeline threads.
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            // Poison pill per worker.
            let _ = self.work_tx.send(None);
        }
        if let Ok(mut workers) = self.workers.lock() {
            for handle in workers.drain(..) {
                let _ = handle.join();
            }
        }
        if let Ok(mut committer) = self.committer.lock() {
            if let Some(handle) = committer.take() {
                let _ = handle.join();
            }
        }
    }
}

fn commit(
    store: &dyn OperationStore,
    error_tx: &Sender<ObservedError>,
    txn: AnchorTransaction,
    result: Result<Vec<AnchoredOperation>>,
) {
    match result {
        Ok(operations) => {
            debug!(
                anchor = %txn.anchor_string,
                count = operations.len(),
                "committing assembled batch"
            );
            for operation in operations {
                if let Err(error) = store.put(operation) {
                    warn!(anchor = %txn.anchor_string, %error, "operation index append failed");
                    let _ = error_tx.send(ObservedError {
                        transaction: txn,
                        error,
                    });
                    return;
                }
            }
        }
        Err(error) => {
            let _ = error_tx.send(ObservedError {
                transaction: txn,
                error,
            });
        }
    }
}
