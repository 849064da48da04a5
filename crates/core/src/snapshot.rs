use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::content::{BeaconContent, Category, LocalContent, PlanContent, RemoteBeacon, RemotePlan};
use crate::error::CoreError;
use crate::ids::RecordKey;

/// Everything the mission editor currently defines, keyed per category.
///
/// Re-inserting a key that differs only in case replaces the content but keeps the
/// casing it was first inserted with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    plans: BTreeMap<RecordKey, PlanContent>,
    beacons: BTreeMap<RecordKey, BeaconContent>,
}

impl LocalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plan(&mut self, plan: PlanContent) -> Result<RecordKey, CoreError> {
        let key = RecordKey::new(plan.plan_id.clone())?;
        self.plans.insert(key.clone(), plan);
        Ok(key)
    }

    pub fn insert_beacon(&mut self, beacon: BeaconContent) -> Result<RecordKey, CoreError> {
        let key = RecordKey::new(beacon.name.clone())?;
        self.beacons.insert(key.clone(), beacon);
        Ok(key)
    }

    pub fn insert(&mut self, content: LocalContent) -> Result<RecordKey, CoreError> {
        match content {
            LocalContent::Plan(plan) => self.insert_plan(plan),
            LocalContent::Beacon(beacon) => self.insert_beacon(beacon),
        }
    }

    pub fn with_plan(mut self, plan: PlanContent) -> Result<Self, CoreError> {
        self.insert_plan(plan)?;
        Ok(self)
    }

    pub fn with_beacon(mut self, beacon: BeaconContent) -> Result<Self, CoreError> {
        self.insert_beacon(beacon)?;
        Ok(self)
    }

    pub fn remove(&mut self, category: Category, key: &RecordKey) -> bool {
        match category {
            Category::Plan => self.plans.remove(key).is_some(),
            Category::Beacon => self.beacons.remove(key).is_some(),
        }
    }

    pub fn contains(&self, category: Category, key: &RecordKey) -> bool {
        match category {
            Category::Plan => self.plans.contains_key(key),
            Category::Beacon => self.beacons.contains_key(key),
        }
    }

    pub fn plans(&self) -> &BTreeMap<RecordKey, PlanContent> {
        &self.plans
    }

    pub fn beacons(&self) -> &BTreeMap<RecordKey, BeaconContent> {
        &self.beacons
    }

    pub fn len(&self) -> usize {
        self.plans.len() + self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty() && self.beacons.is_empty()
    }
}

/// What the vehicle reported on its last successful poll. Beacon order is the
/// vehicle's slot order. An unreachable vehicle is [`RemoteSnapshot::empty`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub plans: Vec<RemotePlan>,
    pub beacons: Vec<RemoteBeacon>,
}

impl RemoteSnapshot {
    pub fn new(plans: Vec<RemotePlan>, beacons: Vec<RemoteBeacon>) -> Self {
        Self { plans, beacons }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty() && self.beacons.is_empty()
    }
}
