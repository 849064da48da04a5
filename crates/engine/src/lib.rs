pub mod config;
pub mod error;
mod merge;
pub mod promote;
pub mod queue;
pub mod report;

pub use config::{EngineConfig, QueueConfig};
pub use error::{EngineError, MergeIssue};
pub use promote::{Promotion, Transition};
pub use queue::{ChangeEvent, MutationQueue, PendingMerge, QueueWorker, StoreView};
pub use report::{MergeReport, RemovedKeys};

use std::collections::{BTreeMap, BTreeSet};

use missionsync_core::{
    Blake3Digester, Category, ContentComparator, Digester, LocalSnapshot, RecordKey,
    RemoteSnapshot, VehicleId,
};
use missionsync_storage::{Record, RecordSet};

/// Last snapshots seen from one vehicle plus the keys waiting to take the remote copy.
#[derive(Debug, Default)]
pub(crate) struct VehicleState {
    pub(crate) local: LocalSnapshot,
    pub(crate) remote: RemoteSnapshot,
    pub(crate) pending_adoption: BTreeSet<(Category, RecordKey)>,
}

/// Owns the merged plan and beacon records of every vehicle.
///
/// Not thread-safe on its own; share it through [`MutationQueue`].
pub struct ReconciliationEngine {
    config: EngineConfig,
    comparator: ContentComparator,
    digester: Box<dyn Digester>,
    records: RecordSet,
    vehicles: BTreeMap<VehicleId, VehicleState>,
}

impl ReconciliationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_digester(config, Blake3Digester)
    }

    pub fn with_digester(config: EngineConfig, digester: impl Digester + 'static) -> Self {
        Self {
            comparator: ContentComparator::new(config.tolerance),
            config,
            digester: Box::new(digester),
            records: RecordSet::new(),
            vehicles: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Records of one category in key order.
    pub fn snapshot(&self, category: Category) -> Vec<Record> {
        self.records.snapshot(category)
    }

    /// Reconcile one vehicle. `None` reuses the snapshot from the previous call for
    /// this vehicle.
    pub fn merge(
        &mut self,
        vehicle: &VehicleId,
        local: Option<LocalSnapshot>,
        remote: Option<RemoteSnapshot>,
    ) -> MergeReport {
        let state = self.vehicles.entry(vehicle.clone()).or_default();
        if let Some(local) = local {
            state.local = local;
        }
        if let Some(remote) = remote {
            state.remote = remote;
        }

        let mut report = MergeReport::new(vehicle.clone());
        let ctx = merge::MergeContext {
            vehicle,
            comparator: &self.comparator,
            digester: self.digester.as_ref(),
        };
        for category in Category::ALL {
            merge::merge_category(
                &ctx,
                category,
                state,
                self.records.store_mut(category),
                &mut report,
            );
        }

        tracing::debug!(
            cycle = %report.cycle,
            %vehicle,
            records = self.records.len(),
            removed = report.removed.len(),
            issues = report.issues.len(),
            "merge complete"
        );
        report
    }
}
