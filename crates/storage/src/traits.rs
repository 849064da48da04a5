use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use missionsync_core::{
    Category, ContentDigest, LocalContent, RecordKey, RemoteContent, VehicleId,
};

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Defined in the mission only.
    Local,
    /// Reported by the vehicle only.
    Remote,
    /// Present on both sides with equal content.
    Sync,
    /// Present on both sides with differing content.
    NotSync,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Sync => "sync",
            Self::NotSync => "not_sync",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "sync" => Ok(Self::Sync),
            "not_sync" => Ok(Self::NotSync),
            _ => Err(StorageError::Core(missionsync_core::CoreError::InvalidData(format!(
                "unknown sync state: {s}"
            )))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordContent<'a> {
    Local(&'a LocalContent),
    Remote(&'a RemoteContent),
}

/// One reconciled plan or beacon.
///
/// The local and remote halves are kept apart so the record can fall back to either
/// side when the other goes away. `remote_index` is the vehicle slot for beacons the
/// vehicle reports, `None` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    key: RecordKey,
    pub category: Category,
    pub local: Option<LocalContent>,
    pub remote: Option<RemoteContent>,
    pub content_digest: Option<ContentDigest>,
    pub sync_state: SyncState,
    pub remote_index: Option<i32>,
    pub origin_vehicle: VehicleId,
}

impl Record {
    pub fn from_local(
        key: RecordKey,
        content: LocalContent,
        digest: Option<ContentDigest>,
        vehicle: VehicleId,
    ) -> Self {
        Self {
            key,
            category: content.category(),
            local: Some(content),
            remote: None,
            content_digest: digest,
            sync_state: SyncState::Local,
            remote_index: None,
            origin_vehicle: vehicle,
        }
    }

    pub fn from_remote(key: RecordKey, content: RemoteContent, vehicle: VehicleId) -> Self {
        Self {
            key,
            category: content.category(),
            content_digest: content.digest().cloned(),
            local: None,
            remote: Some(content),
            sync_state: SyncState::Remote,
            remote_index: None,
            origin_vehicle: vehicle,
        }
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// Displayed payload: the local definition when there is one.
    pub fn content(&self) -> Option<RecordContent<'_>> {
        match (&self.local, &self.remote) {
            (Some(local), _) => Some(RecordContent::Local(local)),
            (None, Some(remote)) => Some(RecordContent::Remote(remote)),
            (None, None) => None,
        }
    }

    /// Change the display casing. The new key must fold to the same identity.
    pub fn rename_display(&mut self, key: &RecordKey) -> Result<(), StorageError> {
        if *key != self.key {
            return Err(StorageError::KeyMismatch {
                existing: self.key.to_string(),
                new: key.to_string(),
            });
        }
        if !self.key.same_casing(key) {
            self.key = key.clone();
        }
        Ok(())
    }

    /// Drop the remote half; the record becomes local-only.
    pub fn demote_to_local(&mut self) {
        self.remote = None;
        self.remote_index = None;
        self.sync_state = SyncState::Local;
    }

    /// Drop the local half; the record becomes remote-only.
    pub fn demote_to_remote(&mut self) {
        self.local = None;
        self.content_digest = self.remote.as_ref().and_then(|r| r.digest().cloned());
        self.sync_state = SyncState::Remote;
    }
}

/// Keyed container of records of one category, iterated in key order.
pub trait RecordStore {
    fn category(&self) -> Category;

    /// Insert keeping key order. An existing record with the same key is replaced
    /// and returned.
    fn insert_sorted(&mut self, record: Record) -> Result<Option<Record>, StorageError>;

    fn find(&self, key: &RecordKey) -> Option<&Record>;

    fn find_mut(&mut self, key: &RecordKey) -> Option<&mut Record>;

    fn remove(&mut self, key: &RecordKey) -> Option<Record>;

    /// Remove every listed key. Survivors keep their relative order.
    fn remove_set(&mut self, keys: &BTreeSet<RecordKey>) -> Vec<Record>;

    fn all(&self) -> &[Record];

    fn len(&self) -> usize {
        self.all().len()
    }

    fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    fn keys(&self) -> Vec<RecordKey> {
        self.all().iter().map(|r| r.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missionsync_core::{PlanContent, RemotePlan};

    fn plan_record() -> Record {
        Record::from_local(
            RecordKey::new("p1").unwrap(),
            LocalContent::Plan(PlanContent::new("p1")),
            None,
            VehicleId::from("auv-1"),
        )
    }

    #[test]
    fn sync_state_parse_round_trips() {
        for state in [
            SyncState::Local,
            SyncState::Remote,
            SyncState::Sync,
            SyncState::NotSync,
        ] {
            assert_eq!(SyncState::parse(state.as_str()).unwrap(), state);
        }
        assert!(matches!(
            SyncState::parse("synced"),
            Err(StorageError::Core(_))
        ));
    }

    #[test]
    fn content_prefers_local_half() {
        let mut record = plan_record();
        record.remote = Some(RemoteContent::Plan(RemotePlan::new(
            "p1",
            ContentDigest::from_bytes(vec![1]),
        )));
        assert!(matches!(record.content(), Some(RecordContent::Local(_))));

        record.demote_to_remote();
        assert!(matches!(record.content(), Some(RecordContent::Remote(_))));
        assert_eq!(record.content_digest, Some(ContentDigest::from_bytes(vec![1])));

        record.remote = None;
        assert_eq!(record.content(), None);
    }
}
