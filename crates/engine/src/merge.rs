//! The three merge phases, run once per category.
//!
//! Phase A folds the local snapshot into the store, phase B folds the remote
//! snapshot and classifies records seen on both sides, phase C settles records one
//! side no longer reports.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use missionsync_core::{
    Category, ContentComparator, ContentDigest, CoreError, Digester, LocalContent,
    LocalSnapshot, RecordKey, RemoteContent, RemotePlan, RemoteSnapshot, VehicleId,
};
use missionsync_storage::{OrderedRecordStore, Record, RecordStore, SyncState};

use crate::VehicleState;
use crate::report::MergeReport;

pub(crate) struct MergeContext<'a> {
    pub(crate) vehicle: &'a VehicleId,
    pub(crate) comparator: &'a ContentComparator,
    pub(crate) digester: &'a dyn Digester,
}

#[derive(Default)]
struct SeenKeys {
    local: BTreeSet<RecordKey>,
    remote: BTreeSet<RecordKey>,
}

pub(crate) fn merge_category(
    ctx: &MergeContext<'_>,
    category: Category,
    state: &mut VehicleState,
    store: &mut OrderedRecordStore,
    report: &mut MergeReport,
) {
    let mut seen = SeenKeys::default();
    absorb_local(ctx, category, &state.local, store, &mut seen);
    absorb_remote(ctx, category, &state.remote, store, &mut seen, report);
    classify(ctx, category, state, store, &seen, report);
    reconcile_absence(ctx, category, store, &seen, report);
    state.pending_adoption.retain(|(cat, key)| {
        *cat != category
            || store
                .find(key)
                .is_some_and(|r| r.sync_state == SyncState::NotSync)
    });
}

fn local_entries(category: Category, local: &LocalSnapshot) -> Vec<(RecordKey, LocalContent)> {
    match category {
        Category::Plan => local
            .plans()
            .iter()
            .map(|(k, p)| (k.clone(), LocalContent::Plan(p.clone())))
            .collect(),
        Category::Beacon => local
            .beacons()
            .iter()
            .map(|(k, b)| (k.clone(), LocalContent::Beacon(b.clone())))
            .collect(),
    }
}

fn remote_entries(
    category: Category,
    remote: &RemoteSnapshot,
) -> Vec<Result<(RecordKey, RemoteContent), CoreError>> {
    match category {
        Category::Plan => remote.plans.iter().map(remote_plan_entry).collect(),
        Category::Beacon => remote
            .beacons
            .iter()
            .map(|b| -> Result<_, CoreError> {
                let content = b.to_content()?;
                let key = RecordKey::new(content.name.clone())?;
                Ok((key, RemoteContent::Beacon(content)))
            })
            .collect(),
    }
}

/// The plan body, when delivered, must describe the entry it came with.
fn remote_plan_entry(plan: &RemotePlan) -> Result<(RecordKey, RemoteContent), CoreError> {
    let key = RecordKey::new(plan.plan_id.clone())?;
    if let Some(body) = &plan.plan {
        let body_key = RecordKey::new(body.plan_id.clone())?;
        if body_key != key {
            return Err(CoreError::InvalidData(format!(
                "plan {key} carries the body of {body_key}"
            )));
        }
    }
    Ok((key, RemoteContent::Plan(plan.clone())))
}

fn local_digest(
    ctx: &MergeContext<'_>,
    key: &RecordKey,
    content: &LocalContent,
) -> Option<ContentDigest> {
    match content {
        LocalContent::Plan(plan) => match ctx.digester.digest(plan) {
            Ok(digest) => Some(digest),
            Err(e) => {
                warn!(vehicle = %ctx.vehicle, %key, "plan digest failed: {e}");
                None
            }
        },
        LocalContent::Beacon(_) => None,
    }
}

fn insert_new(store: &mut OrderedRecordStore, record: Record) {
    if let Err(e) = store.insert_sorted(record) {
        warn!("record rejected by store: {e}");
    }
}

/// Phase A.
fn absorb_local(
    ctx: &MergeContext<'_>,
    category: Category,
    local: &LocalSnapshot,
    store: &mut OrderedRecordStore,
    seen: &mut SeenKeys,
) {
    for (key, content) in local_entries(category, local) {
        let digest = local_digest(ctx, &key, &content);
        match store.find_mut(&key) {
            Some(record) => {
                if let Err(e) = record.rename_display(&key) {
                    warn!(%key, "keeping display key: {e}");
                }
                record.local = Some(content);
                record.content_digest = digest;
                record.origin_vehicle = ctx.vehicle.clone();
            }
            None => insert_new(
                store,
                Record::from_local(key.clone(), content, digest, ctx.vehicle.clone()),
            ),
        }
        seen.local.insert(key);
    }
}

/// Phase B, first half: store what the vehicle reports.
fn absorb_remote(
    ctx: &MergeContext<'_>,
    category: Category,
    remote: &RemoteSnapshot,
    store: &mut OrderedRecordStore,
    seen: &mut SeenKeys,
    report: &mut MergeReport,
) {
    for (position, entry) in remote_entries(category, remote).into_iter().enumerate() {
        let (key, content) = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.unresolvable(category, position, e.to_string());
                continue;
            }
        };
        if seen.remote.contains(&key) {
            report.unresolvable(category, position, format!("duplicate identification {key}"));
            continue;
        }
        let slot = match category {
            Category::Beacon => i32::try_from(position).ok(),
            Category::Plan => None,
        };
        match store.find_mut(&key) {
            Some(record) => {
                record.remote = Some(content);
                record.remote_index = slot;
                record.origin_vehicle = ctx.vehicle.clone();
            }
            None => {
                let mut record = Record::from_remote(key.clone(), content, ctx.vehicle.clone());
                record.remote_index = slot;
                insert_new(store, record);
            }
        }
        seen.remote.insert(key);
    }
}

/// Phase B, second half: compare records present on both sides.
fn classify(
    ctx: &MergeContext<'_>,
    category: Category,
    state: &mut VehicleState,
    store: &mut OrderedRecordStore,
    seen: &SeenKeys,
    report: &mut MergeReport,
) {
    for record in store.iter_mut() {
        if !seen.local.contains(record.key()) || !seen.remote.contains(record.key()) {
            continue;
        }
        let (Some(local), Some(remote)) = (&record.local, &record.remote) else {
            continue;
        };
        let verdict = ctx
            .comparator
            .equal(local, record.content_digest.as_ref(), remote);
        let pending = (category, record.key().clone());
        match verdict {
            Ok(true) => {
                record.sync_state = SyncState::Sync;
                state.pending_adoption.remove(&pending);
            }
            Ok(false) => match state
                .pending_adoption
                .contains(&pending)
                .then(|| remote.to_local())
                .flatten()
            {
                Some(adopted) => {
                    record.content_digest = remote.digest().cloned();
                    if let Err(e) = state.local.insert(adopted.clone()) {
                        warn!(key = %pending.1, "adopted content not cached: {e}");
                    }
                    record.local = Some(adopted);
                    record.sync_state = SyncState::Sync;
                    debug!(vehicle = %ctx.vehicle, key = %pending.1, "adopted remote content");
                    state.pending_adoption.remove(&pending);
                    report.adopted.push(pending);
                }
                None => record.sync_state = SyncState::NotSync,
            },
            Err(e) => {
                record.sync_state = SyncState::NotSync;
                report.comparator_failure(category, pending.1, e.to_string());
            }
        }
    }
}

/// Phase C.
fn reconcile_absence(
    ctx: &MergeContext<'_>,
    category: Category,
    store: &mut OrderedRecordStore,
    seen: &SeenKeys,
    report: &mut MergeReport,
) {
    let mut stale = BTreeSet::new();
    for record in store.iter_mut() {
        let in_local = seen.local.contains(record.key());
        let in_remote = seen.remote.contains(record.key());
        match (in_local, in_remote) {
            (true, true) => {}
            (true, false) => record.demote_to_local(),
            (false, true) => record.demote_to_remote(),
            (false, false) => {
                if record.origin_vehicle == *ctx.vehicle {
                    stale.insert(record.key().clone());
                }
            }
        }
    }
    for record in store.remove_set(&stale) {
        debug!(
            vehicle = %ctx.vehicle,
            category = category.as_str(),
            key = %record.key(),
            "removed stale record"
        );
        report.removed.insert(category, record.key().clone());
    }
}
