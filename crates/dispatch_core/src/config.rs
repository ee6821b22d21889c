//! Configuration objects passed to the core, the actors, the schedulers and the
//! snapshot store at construction.
//!
//! Every struct has defaults matching the reference simulation and can be read
//! from JSON with any subset of fields present.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};

/// One day in milliseconds.
pub const ONE_DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Matching, ETA and settlement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum driver-to-origin distance for a match.
    pub search_radius: f64,
    /// Speed used for the pickup ETA quoted at assignment.
    pub pickup_speed: f64,
    /// Speed used for the remaining transit ETA.
    pub transit_speed: f64,
    /// Platform share of each fare.
    pub commission_rate: f64,
    /// Default number of trips flagged by one audit sample.
    pub audit_max_count: usize,
    /// Seed for the core RNG (audit sampling).
    pub seed: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            search_radius: 0.2,
            pickup_speed: 0.2,
            transit_speed: 0.24,
            commission_rate: crate::pricing::DEFAULT_COMMISSION_RATE,
            audit_max_count: 5,
            seed: 0,
        }
    }
}

impl DispatchConfig {
    pub fn with_search_radius(mut self, radius: f64) -> Self {
        self.search_radius = radius;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_audit_max_count(mut self, max_count: usize) -> Self {
        self.audit_max_count = max_count;
        self
    }

    fn validate(&self) -> DispatchResult<()> {
        if !(self.search_radius >= 0.0) {
            return Err(invalid("search_radius must be >= 0"));
        }
        if !(self.pickup_speed > 0.0) || !(self.transit_speed > 0.0) {
            return Err(invalid("pickup_speed and transit_speed must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.commission_rate) {
            return Err(invalid("commission_rate must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Driver actor movement parameters, per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverBehavior {
    pub pickup_step: f64,
    pub transit_step: f64,
    /// A leg ends once the driver is closer than this to its target.
    pub arrival_epsilon: f64,
    /// Maximum patrol displacement per axis.
    pub patrol_jitter: f64,
}

impl Default for DriverBehavior {
    fn default() -> Self {
        Self {
            pickup_step: 0.01,
            transit_step: 0.012,
            arrival_epsilon: 0.01,
            patrol_jitter: 0.003,
        }
    }
}

impl DriverBehavior {
    pub(crate) fn validate(&self) -> DispatchResult<()> {
        if !(self.pickup_step > 0.0) || !(self.transit_step > 0.0) {
            return Err(invalid("driver steps must be > 0"));
        }
        // A leg only converges if one step can land inside the arrival radius.
        if self.arrival_epsilon <= 0.0
            || self.pickup_step >= 2.0 * self.arrival_epsilon
            || self.transit_step >= 2.0 * self.arrival_epsilon
        {
            return Err(invalid(
                "arrival_epsilon must be > 0 and greater than half of each step",
            ));
        }
        if self.patrol_jitter < 0.0 {
            return Err(invalid("patrol_jitter must be >= 0"));
        }
        Ok(())
    }
}

/// Client actor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientBehavior {
    /// Chance per tick that a client who has not yet asked for a ride does so.
    pub request_probability: f64,
    pub rating_min: f64,
    pub rating_max: f64,
}

impl Default for ClientBehavior {
    fn default() -> Self {
        Self {
            request_probability: 0.05,
            rating_min: 3.5,
            rating_max: 5.0,
        }
    }
}

impl ClientBehavior {
    pub fn with_request_probability(mut self, probability: f64) -> Self {
        self.request_probability = probability;
        self
    }

    fn validate(&self) -> DispatchResult<()> {
        if !(0.0..=1.0).contains(&self.request_probability) {
            return Err(invalid("request_probability must be within [0, 1]"));
        }
        if !(self.rating_min <= self.rating_max) {
            return Err(invalid("rating_min must be <= rating_max"));
        }
        Ok(())
    }
}

/// Tick lengths for both schedulers, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    pub driver_tick_ms: u64,
    pub client_tick_ms: u64,
    /// Interval of the scheduled accounting closure.
    pub accounting_close_interval_ms: u64,
    /// Interval of scheduled audit sampling; `None` leaves auditing to operators.
    pub audit_interval_ms: Option<u64>,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            driver_tick_ms: 50,
            client_tick_ms: 1000,
            accounting_close_interval_ms: ONE_DAY_MS,
            audit_interval_ms: None,
        }
    }
}

impl TickConfig {
    fn validate(&self) -> DispatchResult<()> {
        if self.driver_tick_ms == 0 || self.client_tick_ms == 0 {
            return Err(invalid("tick lengths must be > 0"));
        }
        if self.accounting_close_interval_ms == 0 || self.audit_interval_ms == Some(0) {
            return Err(invalid("housekeeping intervals must be > 0"));
        }
        Ok(())
    }
}

/// Where trip and accounting snapshots are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding the snapshot files. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub trips_file: String,
    pub accounting_file: String,
    /// Create `data_dir` on first write if it does not exist.
    pub create_dir_if_missing: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            trips_file: "trips.json".to_string(),
            accounting_file: "accounting.json".to_string(),
            create_dir_if_missing: false,
        }
    }
}

impl PersistenceConfig {
    /// In-memory only.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Write snapshots into `dir`, creating it on first write.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            create_dir_if_missing: true,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.data_dir.is_some()
    }

    pub fn trips_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(&self.trips_file))
    }

    pub fn accounting_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(&self.accounting_file))
    }
}

/// Everything a simulation run needs, loadable from one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub dispatch: DispatchConfig,
    pub driver: DriverBehavior,
    pub client: ClientBehavior,
    pub ticks: TickConfig,
    pub persistence: PersistenceConfig,
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> DispatchResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> DispatchResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> DispatchResult<()> {
        self.dispatch.validate()?;
        self.driver.validate()?;
        self.client.validate()?;
        self.ticks.validate()
    }
}

fn invalid(message: &str) -> DispatchError {
    DispatchError::InvalidConfig(message.to_string())
}
