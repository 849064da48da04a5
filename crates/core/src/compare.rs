use serde::{Deserialize, Serialize};

use crate::content::{BeaconContent, LocalContent, RemoteContent};
use crate::error::CoreError;
use crate::ids::ContentDigest;

/// About one centimetre of latitude.
pub const DEFAULT_ANGLE_TOLERANCE_DEG: f64 = 1e-7;
pub const DEFAULT_DEPTH_TOLERANCE_M: f64 = 1e-3;

/// Allowed drift when comparing beacon positions. Coordinates make a round trip
/// through radians on the vehicle, so bit-exact comparison reports false drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    pub angle_deg: f64,
    pub depth_m: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            angle_deg: DEFAULT_ANGLE_TOLERANCE_DEG,
            depth_m: DEFAULT_DEPTH_TOLERANCE_M,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentComparator {
    tolerance: Tolerance,
}

impl ContentComparator {
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    pub fn plans_equal(&self, local: &ContentDigest, remote: &ContentDigest) -> bool {
        local.as_bytes() == remote.as_bytes()
    }

    pub fn beacons_equal(
        &self,
        local: &BeaconContent,
        remote: &BeaconContent,
    ) -> Result<bool, CoreError> {
        if !local.position.is_finite() || !remote.position.is_finite() {
            return Err(CoreError::Comparison(format!(
                "non-finite position on beacon {}",
                local.name
            )));
        }
        if !local.name.to_lowercase().eq(&remote.name.to_lowercase()) {
            return Ok(false);
        }
        if local.query_channel != remote.query_channel
            || local.reply_channel != remote.reply_channel
            || local.transponder_delay_ms != remote.transponder_delay_ms
        {
            return Ok(false);
        }
        let (a, b) = (&local.position, &remote.position);
        Ok(within(a.latitude_deg, b.latitude_deg, self.tolerance.angle_deg)
            && within(a.longitude_deg, b.longitude_deg, self.tolerance.angle_deg)
            && within(a.depth_m, b.depth_m, self.tolerance.depth_m))
    }

    /// Compare both halves of a record. `local_digest` is only consulted for plans.
    pub fn equal(
        &self,
        local: &LocalContent,
        local_digest: Option<&ContentDigest>,
        remote: &RemoteContent,
    ) -> Result<bool, CoreError> {
        match (local, remote) {
            (LocalContent::Plan(plan), RemoteContent::Plan(remote_plan)) => {
                let digest = local_digest.ok_or_else(|| {
                    CoreError::Comparison(format!("plan {} has no local digest", plan.plan_id))
                })?;
                Ok(self.plans_equal(digest, &remote_plan.digest))
            }
            (LocalContent::Beacon(a), RemoteContent::Beacon(b)) => self.beacons_equal(a, b),
            _ => Err(CoreError::Comparison(format!(
                "cannot compare {} content with {} content",
                local.category().as_str(),
                remote.category().as_str()
            ))),
        }
    }
}

fn within(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}
