use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use missionsync_core::{Category, RecordKey};

use crate::error::StorageError;
use crate::traits::{Record, RecordStore};

/// Sorted vector of records. Lookups binary-search on the case-folded key; at the
/// tens of entries a vehicle carries this beats any map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedRecordStore {
    category: Category,
    records: Vec<Record>,
}

impl OrderedRecordStore {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            records: Vec::new(),
        }
    }

    fn position(&self, key: &RecordKey) -> Result<usize, usize> {
        self.records.binary_search_by(|r| r.key().cmp(key))
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Record> {
        self.records.iter_mut()
    }
}

impl RecordStore for OrderedRecordStore {
    fn category(&self) -> Category {
        self.category
    }

    fn insert_sorted(&mut self, record: Record) -> Result<Option<Record>, StorageError> {
        if record.category != self.category {
            return Err(StorageError::CategoryMismatch {
                key: record.key().to_string(),
                expected: self.category,
                actual: record.category,
            });
        }
        match self.position(record.key()) {
            Ok(idx) => Ok(Some(std::mem::replace(&mut self.records[idx], record))),
            Err(idx) => {
                self.records.insert(idx, record);
                Ok(None)
            }
        }
    }

    fn find(&self, key: &RecordKey) -> Option<&Record> {
        self.position(key).ok().map(|idx| &self.records[idx])
    }

    fn find_mut(&mut self, key: &RecordKey) -> Option<&mut Record> {
        match self.position(key) {
            Ok(idx) => Some(&mut self.records[idx]),
            Err(_) => None,
        }
    }

    fn remove(&mut self, key: &RecordKey) -> Option<Record> {
        self.position(key).ok().map(|idx| self.records.remove(idx))
    }

    fn remove_set(&mut self, keys: &BTreeSet<RecordKey>) -> Vec<Record> {
        if keys.is_empty() {
            return Vec::new();
        }
        let (removed, kept): (Vec<Record>, Vec<Record>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| keys.contains(r.key()));
        self.records = kept;
        removed
    }

    fn all(&self) -> &[Record] {
        &self.records
    }
}
