use std::collections::BTreeSet;

use missionsync_core::{Category, CycleId, RecordKey, VehicleId};

use crate::error::MergeIssue;

/// Keys that left the merged view, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedKeys {
    pub plans: BTreeSet<RecordKey>,
    pub beacons: BTreeSet<RecordKey>,
}

impl RemovedKeys {
    pub fn get(&self, category: Category) -> &BTreeSet<RecordKey> {
        match category {
            Category::Plan => &self.plans,
            Category::Beacon => &self.beacons,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut BTreeSet<RecordKey> {
        match category {
            Category::Plan => &mut self.plans,
            Category::Beacon => &mut self.beacons,
        }
    }

    pub fn insert(&mut self, category: Category, key: RecordKey) -> bool {
        self.get_mut(category).insert(key)
    }

    pub fn forget(&mut self, category: Category, key: &RecordKey) -> bool {
        self.get_mut(category).remove(key)
    }

    pub fn contains(&self, category: Category, key: &RecordKey) -> bool {
        self.get(category).contains(key)
    }

    pub fn extend(&mut self, other: RemovedKeys) {
        self.plans.extend(other.plans);
        self.beacons.extend(other.beacons);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &RecordKey)> {
        self.plans
            .iter()
            .map(|k| (Category::Plan, k))
            .chain(self.beacons.iter().map(|k| (Category::Beacon, k)))
    }

    pub fn len(&self) -> usize {
        self.plans.len() + self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty() && self.beacons.is_empty()
    }
}

/// Outcome of one merge cycle for one vehicle.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub cycle: CycleId,
    pub vehicle: VehicleId,
    pub removed: RemovedKeys,
    /// Records whose remote content replaced the local definition this cycle.
    pub adopted: Vec<(Category, RecordKey)>,
    pub issues: Vec<MergeIssue>,
}

impl MergeReport {
    pub(crate) fn new(vehicle: VehicleId) -> Self {
        Self {
            cycle: CycleId::new(),
            vehicle,
            removed: RemovedKeys::default(),
            adopted: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub(crate) fn unresolvable(&mut self, category: Category, position: usize, reason: String) {
        tracing::warn!(
            vehicle = %self.vehicle,
            category = category.as_str(),
            position,
            "skipping remote item: {reason}"
        );
        self.issues.push(MergeIssue::UnresolvableRemoteItem {
            category,
            position,
            reason,
        });
    }

    pub(crate) fn comparator_failure(&mut self, category: Category, key: RecordKey, reason: String) {
        tracing::warn!(
            vehicle = %self.vehicle,
            category = category.as_str(),
            %key,
            "comparison failed, marking not synced: {reason}"
        );
        self.issues.push(MergeIssue::ComparatorFailure {
            category,
            key,
            reason,
        });
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
