// Controller - change stream to reconciles, one at a time per key
//
// A change for an idle key starts a reconcile; a spec change or deletion
// for an active key cancels the running reconcile and requeues. Status
// echoes (same spec hash) are ignored. Periodic resync re-enqueues every
// query; terminal-and-unchanged queries no-op inside the reconciler.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use maestro_contracts::{ObjectKey, ResourceKind};
use maestro_store::{ChangeEvent, ChangeOp, ResourceStore};

use crate::reconcile::QueryReconciler;

const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

struct ActiveRun {
    cancel: watch::Sender<bool>,
    spec_hash: String,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

/// Drives query reconciles off the store's change stream
pub struct Controller {
    store: ResourceStore,
    reconciler: Arc<QueryReconciler>,
}

impl Controller {
    pub fn new(store: ResourceStore, reconciler: Arc<QueryReconciler>) -> Self {
        Self { store, reconciler }
    }

    /// Run until the shutdown flag flips
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut changes = self.store.subscribe();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<ObjectKey>();
        let mut active: HashMap<ObjectKey, ActiveRun> = HashMap::new();
        let mut pending: HashSet<ObjectKey> = HashSet::new();
        let mut resync = tokio::time::interval(RESYNC_INTERVAL);
        resync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("controller started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }

                change = changes.recv() => {
                    match change {
                        Ok(event) => {
                            self.on_change(event, &mut active, &mut pending, &done_tx).await;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            // Dropped events are recovered by resync
                            debug!(missed, "change stream lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }

                Some(key) = done_rx.recv() => {
                    active.remove(&key);
                    if pending.remove(&key) {
                        self.start(key, &mut active, &done_tx).await;
                    }
                }

                _ = resync.tick() => {
                    for resource in self.store.list_all(ResourceKind::Query).await {
                        let key = resource.metadata().key();
                        if !active.contains_key(&key) {
                            self.start(key, &mut active, &done_tx).await;
                        }
                    }
                }
            }
        }

        // Cancel whatever is still in flight
        for (_, run) in active.iter() {
            let _ = run.cancel.send(true);
        }
        info!("controller stopped");
        Ok(())
    }

    async fn on_change(
        &self,
        event: ChangeEvent,
        active: &mut HashMap<ObjectKey, ActiveRun>,
        pending: &mut HashSet<ObjectKey>,
        done_tx: &mpsc::UnboundedSender<ObjectKey>,
    ) {
        if event.kind != ResourceKind::Query {
            return;
        }

        match event.op {
            ChangeOp::Deleted => {
                // Cancel in flight; no requeue for a deleted object
                if let Some(run) = active.get(&event.key) {
                    let _ = run.cancel.send(true);
                }
                pending.remove(&event.key);
            }
            ChangeOp::Applied => {
                let current_hash = match self.store.query(&event.key).await {
                    Some(query) => query.spec.hash(),
                    None => return,
                };
                if let Some(run) = active.get(&event.key) {
                    if run.spec_hash != current_hash {
                        // Spec changed under a running reconcile: cancel at
                        // the next suspension point and run again after
                        debug!(key = %event.key, "spec changed mid-reconcile, cancelling");
                        let _ = run.cancel.send(true);
                        pending.insert(event.key);
                    }
                    // Status echoes with the same hash are ignored
                } else {
                    self.start(event.key, active, done_tx).await;
                }
            }
        }
    }

    async fn start(
        &self,
        key: ObjectKey,
        active: &mut HashMap<ObjectKey, ActiveRun>,
        done_tx: &mpsc::UnboundedSender<ObjectKey>,
    ) {
        let Some(query) = self.store.query(&key).await else {
            return;
        };
        let spec_hash = query.spec.hash();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let reconciler = self.reconciler.clone();
        let done = done_tx.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = reconciler.reconcile(&task_key, cancel_rx).await {
                error!(key = %task_key, %err, "reconcile failed");
            }
            let _ = done.send(task_key);
        });

        active.insert(
            key,
            ActiveRun {
                cancel: cancel_tx,
                spec_hash,
                handle,
            },
        );
    }
}
