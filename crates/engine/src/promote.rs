use missionsync_core::{
    Category, CoreError, LocalContent, RecordKey, RemoteContent, RemotePlan, RemoteSnapshot,
};
use missionsync_storage::{Record, RecordSet, RecordStore, SyncState};

use crate::ReconciliationEngine;
use crate::error::EngineError;

/// A user decision about one record, as carried through the mutation queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    AcceptRemoteAsLocal { category: Category, key: RecordKey },
    DiscardLocalOverride { category: Category, key: RecordKey },
    ForgetLocal { category: Category, key: RecordKey },
    MarkSynced { category: Category, key: RecordKey },
    AdoptRemoteOnNextPoll { category: Category, key: RecordKey },
}

/// State change made by a promotion. `to` is `None` when the record was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub category: Category,
    pub key: RecordKey,
    pub from: SyncState,
    pub to: Option<SyncState>,
}

impl Transition {
    pub fn removed(&self) -> bool {
        self.to.is_none()
    }
}

fn find_record<'a>(
    records: &'a mut RecordSet,
    category: Category,
    key: &RecordKey,
) -> Result<&'a mut Record, EngineError> {
    records
        .store_mut(category)
        .find_mut(key)
        .ok_or_else(|| EngineError::RecordNotFound {
            category,
            key: key.clone(),
        })
}

fn require_state(
    record: &Record,
    allowed: &[SyncState],
    operation: &'static str,
) -> Result<SyncState, EngineError> {
    if allowed.contains(&record.sync_state) {
        Ok(record.sync_state)
    } else {
        Err(EngineError::InvalidStateTransition {
            category: record.category,
            key: record.key().clone(),
            from: record.sync_state,
            operation,
        })
    }
}

/// Slot of `key` in the vehicle's beacon list, if it is still reported.
fn remote_slot(category: Category, remote: &RemoteSnapshot, key: &RecordKey) -> Option<i32> {
    if category != Category::Beacon {
        return None;
    }
    let position = remote.beacons.iter().position(|b| {
        b.to_content()
            .and_then(|c| RecordKey::new(c.name))
            .is_ok_and(|k| k == *key)
    })?;
    i32::try_from(position).ok()
}

impl ReconciliationEngine {
    pub fn apply(&mut self, promotion: Promotion) -> Result<Transition, EngineError> {
        let transition = match promotion {
            Promotion::AcceptRemoteAsLocal { category, key } => {
                self.accept_remote_as_local(category, &key)
            }
            Promotion::DiscardLocalOverride { category, key } => {
                self.discard_local_override(category, &key)
            }
            Promotion::ForgetLocal { category, key } => self.forget_local(category, &key),
            Promotion::MarkSynced { category, key } => self.mark_synced(category, &key),
            Promotion::AdoptRemoteOnNextPoll { category, key } => {
                self.adopt_remote_on_next_poll(category, &key)
            }
        }?;
        tracing::debug!(
            category = transition.category.as_str(),
            key = %transition.key,
            from = transition.from.as_str(),
            to = transition.to.map_or("removed", |s| s.as_str()),
            "promotion applied"
        );
        Ok(transition)
    }

    /// Turn a vehicle-only record into a local definition.
    pub fn accept_remote_as_local(
        &mut self,
        category: Category,
        key: &RecordKey,
    ) -> Result<Transition, EngineError> {
        let record = find_record(&mut self.records, category, key)?;
        let from = require_state(record, &[SyncState::Remote], "accept remote as local")?;
        let local = record
            .remote
            .as_ref()
            .and_then(RemoteContent::to_local)
            .ok_or_else(|| EngineError::RemoteContentUnavailable {
                category,
                key: record.key().clone(),
            })?;
        let digest = match &local {
            LocalContent::Plan(plan) => Some(self.digester.digest(plan)?),
            LocalContent::Beacon(_) => None,
        };

        let state = self
            .vehicles
            .entry(record.origin_vehicle.clone())
            .or_default();
        state.local.insert(local.clone())?;

        record.local = Some(local);
        record.content_digest = digest;
        record.sync_state = SyncState::Local;
        record.remote_index = None;
        Ok(Transition {
            category,
            key: record.key().clone(),
            from,
            to: Some(SyncState::Local),
        })
    }

    /// Drop the local definition of a paired record and keep the vehicle's copy.
    pub fn discard_local_override(
        &mut self,
        category: Category,
        key: &RecordKey,
    ) -> Result<Transition, EngineError> {
        let record = find_record(&mut self.records, category, key)?;
        let from = require_state(
            record,
            &[SyncState::Sync, SyncState::NotSync],
            "discard local override",
        )?;

        let state = self
            .vehicles
            .entry(record.origin_vehicle.clone())
            .or_default();
        state.local.remove(category, key);
        state.pending_adoption.remove(&(category, key.clone()));

        record.demote_to_remote();
        Ok(Transition {
            category,
            key: record.key().clone(),
            from,
            to: Some(SyncState::Remote),
        })
    }

    /// Forget a local-only definition. The record falls back to the vehicle's copy
    /// if there is one and is removed otherwise.
    pub fn forget_local(
        &mut self,
        category: Category,
        key: &RecordKey,
    ) -> Result<Transition, EngineError> {
        let record = find_record(&mut self.records, category, key)?;
        let from = require_state(record, &[SyncState::Local], "forget local")?;
        let display_key = record.key().clone();

        let state = self
            .vehicles
            .entry(record.origin_vehicle.clone())
            .or_default();
        state.local.remove(category, key);

        if record.remote.is_some() {
            record.demote_to_remote();
            record.remote_index = remote_slot(category, &state.remote, key);
            return Ok(Transition {
                category,
                key: display_key,
                from,
                to: Some(SyncState::Remote),
            });
        }

        self.records.store_mut(category).remove(key);
        Ok(Transition {
            category,
            key: display_key,
            from,
            to: None,
        })
    }

    /// Record that the vehicle accepted an upload of this plan.
    pub fn mark_synced(
        &mut self,
        category: Category,
        key: &RecordKey,
    ) -> Result<Transition, EngineError> {
        if category != Category::Plan {
            return Err(EngineError::UnsupportedCategory {
                category,
                operation: "mark synced",
            });
        }
        let record = find_record(&mut self.records, category, key)?;
        let from = require_state(
            record,
            &[SyncState::Local, SyncState::NotSync],
            "mark synced",
        )?;
        let Some(LocalContent::Plan(plan)) = record.local.clone() else {
            return Err(EngineError::Core(CoreError::InvalidData(format!(
                "plan {key} has no local definition"
            ))));
        };
        let digest = self.digester.digest(&plan)?;
        let uploaded = RemotePlan::new(plan.plan_id.clone(), digest.clone()).with_plan(plan);

        let state = self
            .vehicles
            .entry(record.origin_vehicle.clone())
            .or_default();
        let cached = state
            .remote
            .plans
            .iter_mut()
            .find(|p| RecordKey::new(p.plan_id.clone()).is_ok_and(|k| k == *key));
        match cached {
            Some(entry) => *entry = uploaded.clone(),
            None => state.remote.plans.push(uploaded.clone()),
        }

        record.remote = Some(RemoteContent::Plan(uploaded));
        record.content_digest = Some(digest);
        record.sync_state = SyncState::Sync;
        Ok(Transition {
            category,
            key: record.key().clone(),
            from,
            to: Some(SyncState::Sync),
        })
    }

    /// Replace the local definition with the vehicle's copy on the next merge that
    /// still finds them different.
    pub fn adopt_remote_on_next_poll(
        &mut self,
        category: Category,
        key: &RecordKey,
    ) -> Result<Transition, EngineError> {
        let record = find_record(&mut self.records, category, key)?;
        let from = require_state(record, &[SyncState::NotSync], "adopt remote on next poll")?;
        self.vehicles
            .entry(record.origin_vehicle.clone())
            .or_default()
            .pending_adoption
            .insert((category, key.clone()));
        Ok(Transition {
            category,
            key: record.key().clone(),
            from,
            to: Some(SyncState::NotSync),
        })
    }

    /// Keys waiting to take the vehicle's copy.
    pub fn pending_adoptions(&self) -> impl Iterator<Item = &(Category, RecordKey)> {
        self.vehicles.values().flat_map(|s| s.pending_adoption.iter())
    }
}
