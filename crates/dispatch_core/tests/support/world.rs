#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use bevy_ecs::prelude::World;
use dispatch_core::clock::SimulationClock;
use dispatch_core::config::{DispatchConfig, PersistenceConfig, SimConfig, TickConfig};
use dispatch_core::dispatch::DispatchCore;
use dispatch_core::ecs::{DispatchHandle, TickSchedule, VirtualTime};
use dispatch_core::telemetry::SimTelemetry;
use dispatch_core::time::ManualClock;

/// Builder configuration for reproducible test worlds.
#[derive(Clone, Debug)]
pub struct TestWorldConfig {
    pub seed: u64,
    pub search_radius: f64,
    pub ticks: TickConfig,
    pub data_dir: Option<PathBuf>,
}

impl Default for TestWorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            search_radius: DispatchConfig::default().search_radius,
            ticks: TickConfig::default(),
            data_dir: None,
        }
    }
}

impl TestWorldConfig {
    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            dispatch: DispatchConfig::default()
                .with_seed(self.seed)
                .with_search_radius(self.search_radius),
            ticks: self.ticks,
            persistence: self
                .data_dir
                .clone()
                .map(PersistenceConfig::in_dir)
                .unwrap_or_default(),
            ..SimConfig::default()
        }
    }
}

/// Helper that populates the ECS world with the core and all shared resources.
#[derive(Debug, Default)]
pub struct TestWorldBuilder {
    config: TestWorldConfig,
}

impl TestWorldBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the seed of the core's audit RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_search_radius(mut self, radius: f64) -> Self {
        self.config.search_radius = radius;
        self
    }

    pub fn with_ticks(mut self, ticks: TickConfig) -> Self {
        self.config.ticks = ticks;
        self
    }

    /// Persist snapshots into `dir`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    /// Core on a manual clock, without a world around it.
    pub fn build_core(&self) -> (Arc<DispatchCore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let core = DispatchCore::from_config(&self.config.sim_config(), clock.clone());
        (Arc::new(core), clock)
    }

    /// Build the ECS world with the configured resources.
    pub fn build(self) -> World {
        let (core, clock) = self.build_core();
        let mut world = World::new();
        world.insert_resource(SimulationClock::default());
        world.insert_resource(SimTelemetry::default());
        world.insert_resource(TickSchedule(self.config.ticks));
        world.insert_resource(VirtualTime(clock));
        world.insert_resource(DispatchHandle(core));
        world
    }
}

/// The core inside a world built by [`TestWorldBuilder`].
pub fn core_of(world: &World) -> Arc<DispatchCore> {
    world.resource::<DispatchHandle>().0.clone()
}
