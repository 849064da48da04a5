//! Single-writer mutation queue in front of the engine.
//!
//! A worker thread owns the [`ReconciliationEngine`] and applies requests in
//! arrival order. After each drain cycle it publishes an immutable copy of the
//! records and notifies subscribers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwap;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use tracing::{debug, info};

use missionsync_core::{Category, CycleId, LocalSnapshot, RecordKey, RemoteSnapshot, VehicleId};
use missionsync_storage::{Record, RecordSet};

use crate::ReconciliationEngine;
use crate::config::QueueConfig;
use crate::error::EngineError;
use crate::promote::{Promotion, Transition};
use crate::report::{MergeReport, RemovedKeys};

/// Published after every drain cycle that changed the records.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub cycle: CycleId,
    /// Keys that left the view during the cycle and did not come back.
    pub removed: RemovedKeys,
    pub view: Arc<RecordSet>,
}

/// Lock-free read access to the last published records.
#[derive(Clone)]
pub struct StoreView {
    current: Arc<ArcSwap<RecordSet>>,
}

impl StoreView {
    fn new(initial: RecordSet) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn load(&self) -> Arc<RecordSet> {
        self.current.load_full()
    }

    pub fn snapshot(&self, category: Category) -> Vec<Record> {
        self.current.load().snapshot(category)
    }

    fn publish(&self, records: Arc<RecordSet>) {
        self.current.store(records);
    }
}

enum Mutation {
    Merge {
        vehicle: VehicleId,
        local: Option<LocalSnapshot>,
        remote: Option<RemoteSnapshot>,
        respond: Sender<MergeReport>,
    },
    Promote {
        promotion: Promotion,
        respond: Sender<Result<Transition, EngineError>>,
    },
    Subscribe {
        events: Sender<ChangeEvent>,
    },
    Shutdown,
}

/// Reply held back until the cycle's view is published.
enum Reply {
    Merge(Sender<MergeReport>, MergeReport),
    Promote(
        Sender<Result<Transition, EngineError>>,
        Result<Transition, EngineError>,
    ),
}

impl Reply {
    fn send(self) {
        // A producer that stopped waiting is not an error.
        match self {
            Reply::Merge(respond, report) => {
                let _ = respond.send(report);
            }
            Reply::Promote(respond, result) => {
                let _ = respond.send(result);
            }
        }
    }
}

/// Handle for a merge that was queued but not necessarily applied yet.
pub struct PendingMerge {
    respond: Receiver<MergeReport>,
}

impl PendingMerge {
    pub fn wait(self) -> Result<MergeReport, EngineError> {
        self.respond.recv().map_err(|_| EngineError::QueueClosed)
    }
}

/// Producer handle. Clone one per source of snapshots or user actions.
#[derive(Clone)]
pub struct MutationQueue {
    tx: Sender<Mutation>,
    view: StoreView,
    subscriber_capacity: usize,
}

impl MutationQueue {
    pub fn spawn(
        engine: ReconciliationEngine,
        config: QueueConfig,
    ) -> Result<(MutationQueue, QueueWorker), EngineError> {
        let (tx, rx) = channel::unbounded();
        let view = StoreView::new(engine.records().clone());
        let worker_view = view.clone();
        let handle = thread::Builder::new()
            .name("missionsync-queue".into())
            .spawn(move || run_queue_loop(engine, rx, worker_view, config))?;
        let queue = MutationQueue {
            tx: tx.clone(),
            view,
            subscriber_capacity: config.subscriber_capacity.max(1),
        };
        let worker = QueueWorker {
            tx,
            handle: Some(handle),
        };
        Ok((queue, worker))
    }

    fn send(&self, mutation: Mutation) -> Result<(), EngineError> {
        self.tx.send(mutation).map_err(|_| EngineError::QueueClosed)
    }

    pub fn submit_merge(
        &self,
        vehicle: VehicleId,
        local: Option<LocalSnapshot>,
        remote: Option<RemoteSnapshot>,
    ) -> Result<PendingMerge, EngineError> {
        let (respond, rx) = channel::bounded(1);
        self.send(Mutation::Merge {
            vehicle,
            local,
            remote,
            respond,
        })?;
        Ok(PendingMerge { respond: rx })
    }

    pub fn merge(
        &self,
        vehicle: VehicleId,
        local: Option<LocalSnapshot>,
        remote: Option<RemoteSnapshot>,
    ) -> Result<MergeReport, EngineError> {
        self.submit_merge(vehicle, local, remote)?.wait()
    }

    /// The mission editor changed; the vehicle side is unchanged.
    pub fn notify_local_edit(
        &self,
        vehicle: VehicleId,
        local: LocalSnapshot,
    ) -> Result<PendingMerge, EngineError> {
        self.submit_merge(vehicle, Some(local), None)
    }

    /// A poll of the vehicle completed. Pass [`RemoteSnapshot::empty`] when the
    /// vehicle did not answer.
    pub fn notify_remote_poll(
        &self,
        vehicle: VehicleId,
        remote: RemoteSnapshot,
    ) -> Result<PendingMerge, EngineError> {
        self.submit_merge(vehicle, None, Some(remote))
    }

    pub fn promote(&self, promotion: Promotion) -> Result<Transition, EngineError> {
        let (respond, rx) = channel::bounded(1);
        self.send(Mutation::Promote { promotion, respond })?;
        rx.recv().map_err(|_| EngineError::QueueClosed)?
    }

    pub fn accept_remote_as_local(
        &self,
        category: Category,
        key: RecordKey,
    ) -> Result<Transition, EngineError> {
        self.promote(Promotion::AcceptRemoteAsLocal { category, key })
    }

    pub fn discard_local_override(
        &self,
        category: Category,
        key: RecordKey,
    ) -> Result<Transition, EngineError> {
        self.promote(Promotion::DiscardLocalOverride { category, key })
    }

    pub fn forget_local(
        &self,
        category: Category,
        key: RecordKey,
    ) -> Result<Transition, EngineError> {
        self.promote(Promotion::ForgetLocal { category, key })
    }

    pub fn mark_synced(
        &self,
        category: Category,
        key: RecordKey,
    ) -> Result<Transition, EngineError> {
        self.promote(Promotion::MarkSynced { category, key })
    }

    pub fn adopt_remote_on_next_poll(
        &self,
        category: Category,
        key: RecordKey,
    ) -> Result<Transition, EngineError> {
        self.promote(Promotion::AdoptRemoteOnNextPoll { category, key })
    }

    /// Receive a [`ChangeEvent`] for every cycle processed after this request.
    pub fn subscribe(&self) -> Result<Receiver<ChangeEvent>, EngineError> {
        let (events, rx) = channel::bounded(self.subscriber_capacity);
        self.send(Mutation::Subscribe { events })?;
        Ok(rx)
    }

    pub fn view(&self) -> StoreView {
        self.view.clone()
    }

    pub fn snapshot(&self, category: Category) -> Vec<Record> {
        self.view.snapshot(category)
    }
}

/// Owner of the worker thread.
pub struct QueueWorker {
    tx: Sender<Mutation>,
    handle: Option<JoinHandle<ReconciliationEngine>>,
}

impl QueueWorker {
    /// Apply everything already queued, stop the worker and hand back the engine.
    pub fn shutdown(mut self) -> Result<ReconciliationEngine, EngineError> {
        let handle = self.handle.take().ok_or(EngineError::QueueClosed)?;
        self.tx
            .send(Mutation::Shutdown)
            .map_err(|_| EngineError::QueueClosed)?;
        handle.join().map_err(|_| EngineError::WorkerPanicked)
    }
}

impl Drop for QueueWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.tx.send(Mutation::Shutdown);
        }
    }
}

struct Subscriber {
    events: Sender<ChangeEvent>,
}

/// State accumulated over one drain cycle.
#[derive(Default)]
struct DrainCycle {
    processed: usize,
    changed: bool,
    stop: bool,
    removed: RemovedKeys,
    replies: Vec<Reply>,
}

impl DrainCycle {
    fn apply(
        &mut self,
        engine: &mut ReconciliationEngine,
        mutation: Mutation,
        subscribers: &mut Vec<Subscriber>,
    ) {
        match mutation {
            Mutation::Merge {
                vehicle,
                local,
                remote,
                respond,
            } => {
                let report = engine.merge(&vehicle, local, remote);
                self.removed.extend(report.removed.clone());
                self.changed = true;
                self.replies.push(Reply::Merge(respond, report));
            }
            Mutation::Promote { promotion, respond } => {
                let result = engine.apply(promotion);
                if let Ok(transition) = &result {
                    if transition.removed() {
                        self.removed
                            .insert(transition.category, transition.key.clone());
                    }
                    self.changed = true;
                }
                self.replies.push(Reply::Promote(respond, result));
            }
            Mutation::Subscribe { events } => subscribers.push(Subscriber { events }),
            Mutation::Shutdown => self.stop = true,
        }
        self.processed += 1;
    }

    fn finish(
        self,
        engine: &ReconciliationEngine,
        view: &StoreView,
        subscribers: &mut Vec<Subscriber>,
    ) {
        if self.changed {
            let published = Arc::new(engine.records().clone());
            view.publish(Arc::clone(&published));

            let mut removed = self.removed;
            for category in Category::ALL {
                let back: Vec<RecordKey> = removed
                    .get(category)
                    .iter()
                    .filter(|k| published.find(category, k).is_some())
                    .cloned()
                    .collect();
                for key in back {
                    removed.forget(category, &key);
                }
            }

            let event = ChangeEvent {
                cycle: CycleId::new(),
                removed,
                view: published,
            };
            subscribers.retain(|sub| match sub.events.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    debug!("dropping lagging change subscriber");
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("change subscriber went away");
                    false
                }
            });
        }
        for reply in self.replies {
            reply.send();
        }
    }
}

fn run_queue_loop(
    mut engine: ReconciliationEngine,
    rx: Receiver<Mutation>,
    view: StoreView,
    config: QueueConfig,
) -> ReconciliationEngine {
    let max_batch = config.max_batch.max(1);
    let mut subscribers = Vec::new();
    info!("mutation queue started");

    while let Ok(first) = rx.recv() {
        let mut cycle = DrainCycle::default();
        cycle.apply(&mut engine, first, &mut subscribers);
        while !cycle.stop && cycle.processed < max_batch {
            match rx.try_recv() {
                Ok(mutation) => cycle.apply(&mut engine, mutation, &mut subscribers),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        let stop = cycle.stop;
        debug!(processed = cycle.processed, changed = cycle.changed, "drain cycle complete");
        cycle.finish(&engine, &view, &mut subscribers);
        if stop {
            break;
        }
    }

    // Requests queued behind the shutdown marker are still applied.
    let mut tail = DrainCycle::default();
    while let Ok(mutation) = rx.try_recv() {
        tail.apply(&mut engine, mutation, &mut subscribers);
    }
    if tail.processed > 0 {
        debug!(processed = tail.processed, "drained requests after shutdown");
    }
    tail.finish(&engine, &view, &mut subscribers);

    info!("mutation queue stopped");
    engine
}
