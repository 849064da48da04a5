use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::field_value::FieldValue;
use crate::ids::ContentDigest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Plan,
    Beacon,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Plan, Category::Beacon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Beacon => "beacon",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "plan" => Ok(Self::Plan),
            "beacon" => Ok(Self::Beacon),
            _ => Err(CoreError::InvalidData(format!("unknown category: {s}"))),
        }
    }
}

/// A mission plan as authored in the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanContent {
    pub plan_id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl PlanContent {
    pub fn new(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// MessagePack of `(plan_id, fields)`. Field order is fixed by the map, so two
    /// equal plans always encode to the same bytes.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(&(&self.plan_id, &self.fields))
            .map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// Plan entry as reported by the vehicle's plan database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlan {
    pub plan_id: String,
    pub digest: ContentDigest,
    pub size: u32,
    pub change_time_ms: u64,
    pub change_source: String,
    pub description: String,
    /// Full plan body, present only when the device delivered it.
    pub plan: Option<PlanContent>,
}

impl RemotePlan {
    pub fn new(plan_id: impl Into<String>, digest: ContentDigest) -> Self {
        Self {
            plan_id: plan_id.into(),
            digest,
            size: 0,
            change_time_ms: 0,
            change_source: String::new(),
            description: String::new(),
            plan: None,
        }
    }

    pub fn with_plan(mut self, plan: PlanContent) -> Self {
        self.plan = Some(plan);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub depth_m: f64,
}

impl Position {
    pub fn new(latitude_deg: f64, longitude_deg: f64, depth_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            depth_m,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude_deg.is_finite() && self.longitude_deg.is_finite() && self.depth_m.is_finite()
    }
}

/// Acoustic transponder configuration in console units (degrees, metres).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconContent {
    pub name: String,
    pub query_channel: u8,
    pub reply_channel: u8,
    pub transponder_delay_ms: u8,
    pub position: Position,
}

impl BeaconContent {
    /// Encode the way the vehicle stores it (angles in radians).
    pub fn to_remote(&self) -> RemoteBeacon {
        RemoteBeacon {
            beacon: self.name.clone(),
            lat_rad: self.position.latitude_deg.to_radians(),
            lon_rad: self.position.longitude_deg.to_radians(),
            depth: self.position.depth_m,
            query_channel: self.query_channel,
            reply_channel: self.reply_channel,
            transponder_delay: self.transponder_delay_ms,
        }
    }
}

/// One entry of the vehicle's beacon configuration list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteBeacon {
    pub beacon: String,
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub depth: f64,
    pub query_channel: u8,
    pub reply_channel: u8,
    pub transponder_delay: u8,
}

impl RemoteBeacon {
    /// Decode into console units. Fails for a blank identification or non-finite
    /// coordinates, which leave the entry unaddressable.
    pub fn to_content(&self) -> Result<BeaconContent, CoreError> {
        if self.beacon.trim().is_empty() {
            return Err(CoreError::InvalidKey(self.beacon.clone()));
        }
        let position = Position::new(
            self.lat_rad.to_degrees(),
            self.lon_rad.to_degrees(),
            self.depth,
        );
        if !position.is_finite() {
            return Err(CoreError::InvalidData(format!(
                "beacon {} has non-finite coordinates",
                self.beacon
            )));
        }
        Ok(BeaconContent {
            name: self.beacon.clone(),
            query_channel: self.query_channel,
            reply_channel: self.reply_channel,
            transponder_delay_ms: self.transponder_delay,
            position,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocalContent {
    Plan(PlanContent),
    Beacon(BeaconContent),
}

impl LocalContent {
    pub fn category(&self) -> Category {
        match self {
            Self::Plan(_) => Category::Plan,
            Self::Beacon(_) => Category::Beacon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoteContent {
    Plan(RemotePlan),
    Beacon(BeaconContent),
}

impl RemoteContent {
    pub fn category(&self) -> Category {
        match self {
            Self::Plan(_) => Category::Plan,
            Self::Beacon(_) => Category::Beacon,
        }
    }

    pub fn digest(&self) -> Option<&ContentDigest> {
        match self {
            Self::Plan(plan) => Some(&plan.digest),
            Self::Beacon(_) => None,
        }
    }

    /// The local definition a user gets by accepting this remote entry, if the
    /// device delivered enough to build one.
    pub fn to_local(&self) -> Option<LocalContent> {
        match self {
            Self::Plan(plan) => plan.plan.clone().map(LocalContent::Plan),
            Self::Beacon(beacon) => Some(LocalContent::Beacon(beacon.clone())),
        }
    }
}
