use missionsync_core::CoreError;
use missionsync_engine::{MergeReport, ReconciliationEngine};

use crate::TestVehicle;

pub struct TestFleet {
    vehicles: Vec<TestVehicle>,
}

impl Default for TestFleet {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFleet {
    pub fn new() -> Self {
        Self {
            vehicles: Vec::new(),
        }
    }

    pub fn add_vehicle(&mut self, name: &str) -> usize {
        let index = self.vehicles.len();
        self.vehicles.push(TestVehicle::new(name));
        index
    }

    pub fn vehicle(&self, index: usize) -> &TestVehicle {
        &self.vehicles[index]
    }

    pub fn vehicle_mut(&mut self, index: usize) -> &mut TestVehicle {
        &mut self.vehicles[index]
    }

    /// Poll every vehicle and merge the result, keeping each vehicle's cached local
    /// snapshot.
    pub fn poll_all(
        &self,
        engine: &mut ReconciliationEngine,
    ) -> Result<Vec<MergeReport>, CoreError> {
        let mut reports = Vec::with_capacity(self.vehicles.len());
        for vehicle in &self.vehicles {
            let remote = vehicle.poll()?;
            reports.push(engine.merge(&vehicle.id, None, Some(remote)));
        }
        Ok(reports)
    }
}
