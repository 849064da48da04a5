use missionsync_core::{
    BeaconContent, Blake3Digester, CoreError, Digester, PlanContent, RemotePlan, RemoteSnapshot,
    VehicleId,
};

/// Simulated vehicle: a plan database and a beacon list in slot order.
pub struct TestVehicle {
    pub id: VehicleId,
    pub plans: Vec<PlanContent>,
    pub beacons: Vec<BeaconContent>,
    pub reachable: bool,
    /// Include plan bodies in poll results.
    pub deliver_bodies: bool,
}

impl TestVehicle {
    pub fn new(name: &str) -> Self {
        Self {
            id: VehicleId::new(name),
            plans: Vec::new(),
            beacons: Vec::new(),
            reachable: true,
            deliver_bodies: true,
        }
    }

    /// Store a plan, replacing one with the same id.
    pub fn upload_plan(&mut self, plan: PlanContent) {
        match self
            .plans
            .iter_mut()
            .find(|p| p.plan_id.eq_ignore_ascii_case(&plan.plan_id))
        {
            Some(existing) => *existing = plan,
            None => self.plans.push(plan),
        }
    }

    pub fn delete_plan(&mut self, plan_id: &str) {
        self.plans.retain(|p| !p.plan_id.eq_ignore_ascii_case(plan_id));
    }

    pub fn set_beacons(&mut self, beacons: Vec<BeaconContent>) {
        self.beacons = beacons;
    }

    /// What the vehicle would report right now. Beacon coordinates go through the
    /// radian encoding the vehicle uses.
    pub fn poll(&self) -> Result<RemoteSnapshot, CoreError> {
        if !self.reachable {
            return Ok(RemoteSnapshot::empty());
        }
        let mut plans = Vec::with_capacity(self.plans.len());
        for plan in &self.plans {
            let mut entry = RemotePlan::new(plan.plan_id.clone(), Blake3Digester.digest(plan)?);
            entry.size = u32::try_from(plan.canonical_bytes()?.len()).unwrap_or(u32::MAX);
            entry.change_source = self.id.to_string();
            if self.deliver_bodies {
                entry = entry.with_plan(plan.clone());
            }
            plans.push(entry);
        }
        let beacons = self.beacons.iter().map(BeaconContent::to_remote).collect();
        Ok(RemoteSnapshot::new(plans, beacons))
    }
}
