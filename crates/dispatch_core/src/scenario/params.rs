use std::collections::BTreeMap;

use bevy_ecs::prelude::Resource;

use crate::config::SimConfig;
use crate::model::{Admission, ClientId, DriverId};

/// Entities are placed away from the map edge.
const DEFAULT_COORD_MIN: f64 = 0.05;
const DEFAULT_COORD_MAX: f64 = 0.95;

const DEFAULT_DRIVER_RATING_MIN: f64 = 4.0;
const DEFAULT_DRIVER_RATING_MAX: f64 = 5.0;

/// Simulation end time in milliseconds. When set, the runner stops processing events
/// once the next event would be at or after this timestamp.
#[derive(Debug, Clone, Copy, Resource)]
pub struct SimulationEndTimeMs(pub u64);

/// Admission decisions handed over by onboarding. Entities without a record are admitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdmissionRecords {
    pub drivers: BTreeMap<DriverId, Admission>,
    pub clients: BTreeMap<ClientId, Admission>,
}

impl AdmissionRecords {
    pub fn driver(&self, driver_id: DriverId) -> Admission {
        self.drivers.get(&driver_id).cloned().unwrap_or_default()
    }

    pub fn client(&self, client_id: ClientId) -> Admission {
        self.clients.get(&client_id).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioParams {
    pub num_drivers: u32,
    pub num_clients: u32,
    /// Seed for placement, ratings and every actor RNG. `None` uses 0.
    pub seed: Option<u64>,
    pub coord_min: f64,
    pub coord_max: f64,
    pub driver_rating_min: f64,
    pub driver_rating_max: f64,
    pub admissions: AdmissionRecords,
    pub config: SimConfig,
    /// Optional simulation end time in ms. If set, runner stops when next event >= this time.
    pub simulation_end_time_ms: Option<u64>,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            num_drivers: 10,
            num_clients: 20,
            seed: None,
            coord_min: DEFAULT_COORD_MIN,
            coord_max: DEFAULT_COORD_MAX,
            driver_rating_min: DEFAULT_DRIVER_RATING_MIN,
            driver_rating_max: DEFAULT_DRIVER_RATING_MAX,
            admissions: AdmissionRecords::default(),
            config: SimConfig::default(),
            simulation_end_time_ms: None,
        }
    }
}

impl ScenarioParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_drivers(mut self, count: u32) -> Self {
        self.num_drivers = count;
        self
    }

    pub fn with_clients(mut self, count: u32) -> Self {
        self.num_clients = count;
        self
    }

    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Record an onboarding decision for one driver.
    pub fn with_driver_admission(mut self, driver_id: DriverId, admission: Admission) -> Self {
        self.admissions.drivers.insert(driver_id, admission);
        self
    }

    /// Record an onboarding decision for one client.
    pub fn with_client_admission(mut self, client_id: ClientId, admission: Admission) -> Self {
        self.admissions.clients.insert(client_id, admission);
        self
    }

    /// Set simulation end time in ms. Runner stops when the next event is at or after this time.
    pub fn with_simulation_end_time_ms(mut self, end_ms: u64) -> Self {
        self.simulation_end_time_ms = Some(end_ms);
        self
    }

    pub fn seed_or_default(&self) -> u64 {
        self.seed.unwrap_or(0)
    }
}
