use serde::{Deserialize, Serialize};

use missionsync_core::{Category, RecordKey};

use crate::ordered::OrderedRecordStore;
use crate::traits::{Record, RecordStore};

/// One ordered store per category. This is the merged view handed to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    plans: OrderedRecordStore,
    beacons: OrderedRecordStore,
}

impl Default for RecordSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSet {
    pub fn new() -> Self {
        Self {
            plans: OrderedRecordStore::new(Category::Plan),
            beacons: OrderedRecordStore::new(Category::Beacon),
        }
    }

    pub fn store(&self, category: Category) -> &OrderedRecordStore {
        match category {
            Category::Plan => &self.plans,
            Category::Beacon => &self.beacons,
        }
    }

    pub fn store_mut(&mut self, category: Category) -> &mut OrderedRecordStore {
        match category {
            Category::Plan => &mut self.plans,
            Category::Beacon => &mut self.beacons,
        }
    }

    pub fn find(&self, category: Category, key: &RecordKey) -> Option<&Record> {
        self.store(category).find(key)
    }

    /// Owned copy of one category in display order.
    pub fn snapshot(&self, category: Category) -> Vec<Record> {
        self.store(category).all().to_vec()
    }

    pub fn len(&self) -> usize {
        self.plans.len() + self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty() && self.beacons.is_empty()
    }
}
