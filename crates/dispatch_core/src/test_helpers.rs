//! Test helpers for common test setup and utilities.
//!
//! This module provides shared test utilities to reduce duplication across test files.

use std::sync::Arc;

use bevy_ecs::prelude::{Entity, World};

use crate::actors::{ClientActor, DriverActor};
use crate::clock::SimulationClock;
use crate::config::{ClientBehavior, DispatchConfig, DriverBehavior, PersistenceConfig, TickConfig};
use crate::dispatch::DispatchCore;
use crate::ecs::{ClientAgent, DispatchHandle, DriverAgent, TickSchedule, VirtualTime};
use crate::geometry::Point;
use crate::model::{ClientId, ClientProfile, DriverId, DriverProfile};
use crate::telemetry::SimTelemetry;
use crate::time::ManualClock;

/// Origin and destination used by [`spawn_client`]: one fare unit apart vertically.
pub const TEST_ORIGIN: Point = Point::new(0.5, 0.4);
pub const TEST_DESTINATION: Point = Point::new(0.5, 0.6);

/// In-memory core on a manual clock starting at 0.
pub fn test_core() -> (Arc<DispatchCore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let core = DispatchCore::new(
        DispatchConfig::default(),
        PersistenceConfig::disabled(),
        clock.clone(),
    );
    (Arc::new(core), clock)
}

/// Create a basic test world with essential resources and an empty core.
///
/// For full scenarios, use [`crate::scenario::build_scenario`].
pub fn create_test_world() -> World {
    let (core, clock) = test_core();
    let mut world = World::new();
    world.insert_resource(SimulationClock::default());
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(TickSchedule(TickConfig::default()));
    world.insert_resource(VirtualTime(clock));
    world.insert_resource(DispatchHandle(core));
    world
}

/// Register a driver with the world's core and spawn its agent.
pub fn spawn_driver(world: &mut World, id: u32, x: f64, y: f64) -> Entity {
    let core = world.resource::<DispatchHandle>().0.clone();
    let driver = core.register_driver(DriverProfile::new(DriverId(id), 4.5), Point::new(x, y));
    world
        .spawn(DriverAgent(DriverActor::new(driver, DriverBehavior::default(), u64::from(id))))
        .id()
}

/// Register a client travelling [`TEST_ORIGIN`] → [`TEST_DESTINATION`] and spawn its agent.
pub fn spawn_client(world: &mut World, id: u32, request_probability: f64) -> Entity {
    let core = world.resource::<DispatchHandle>().0.clone();
    let client = core.register_client(ClientProfile::new(ClientId(id), TEST_ORIGIN, TEST_DESTINATION));
    let behavior = ClientBehavior::default().with_request_probability(request_probability);
    world
        .spawn(ClientAgent(ClientActor::new(client, behavior, u64::from(id))))
        .id()
}
