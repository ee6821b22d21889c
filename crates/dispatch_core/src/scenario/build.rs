use std::sync::Arc;

use bevy_ecs::prelude::World;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::actors::{ClientActor, DriverActor};
use crate::clock::SimulationClock;
use crate::dispatch::DispatchCore;
use crate::ecs::{ClientAgent, DispatchHandle, DriverAgent, TickSchedule, VirtualTime};
use crate::geometry::Point;
use crate::model::{ClientId, ClientProfile, DriverId, DriverProfile};
use crate::scenario::params::{ScenarioParams, SimulationEndTimeMs};
use crate::telemetry::SimTelemetry;
use crate::time::{Clock, ManualClock};

const DRIVER_SEED_SALT: u64 = 0xdead_beef;
const CLIENT_SEED_SALT: u64 = 0xcafe_babe;

/// Drivers with their starting positions, and clients with their standing requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    pub drivers: Vec<(DriverProfile, Point)>,
    pub clients: Vec<ClientProfile>,
}

/// Seed for one actor's RNG, derived from the scenario seed.
pub fn actor_seed(seed: u64, salt: u64, id: u32) -> u64 {
    seed.wrapping_add(salt)
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(u64::from(id))
}

fn random_point<R: Rng>(rng: &mut R, min: f64, max: f64) -> Point {
    if max > min {
        Point::new(rng.gen_range(min..=max), rng.gen_range(min..=max))
    } else {
        Point::new(min, min)
    }
}

/// Place drivers and clients uniformly inside the coordinate range and draw
/// driver ratings. Ids start at 1. Deterministic for a given seed.
pub fn generate_population(params: &ScenarioParams) -> Population {
    let mut rng = StdRng::seed_from_u64(params.seed_or_default());
    let (min, max) = (params.coord_min, params.coord_max);

    let drivers = (1..=params.num_drivers)
        .map(|id| {
            let driver_id = DriverId(id);
            let rating = if params.driver_rating_max > params.driver_rating_min {
                rng.gen_range(params.driver_rating_min..=params.driver_rating_max)
            } else {
                params.driver_rating_min
            };
            let rating = (rating * 10.0).round() / 10.0;
            let profile = DriverProfile::new(driver_id, rating)
                .with_admission(params.admissions.driver(driver_id));
            (profile, random_point(&mut rng, min, max))
        })
        .collect();

    let clients = (1..=params.num_clients)
        .map(|id| {
            let client_id = ClientId(id);
            let origin = random_point(&mut rng, min, max);
            let destination = random_point(&mut rng, min, max);
            ClientProfile::new(client_id, origin, destination)
                .with_admission(params.admissions.client(client_id))
        })
        .collect();

    Population { drivers, clients }
}

/// Register the population with `core` and build one actor per entity.
pub fn build_actors(
    core: &DispatchCore,
    params: &ScenarioParams,
    population: Population,
) -> (Vec<DriverActor>, Vec<ClientActor>) {
    let seed = params.seed_or_default();
    let behavior = &params.config;

    let drivers = population
        .drivers
        .into_iter()
        .map(|(profile, location)| {
            let id = profile.id.0;
            let driver = core.register_driver(profile, location);
            DriverActor::new(driver, behavior.driver, actor_seed(seed, DRIVER_SEED_SALT, id))
                .with_rating_range(behavior.client.rating_min, behavior.client.rating_max)
        })
        .collect();

    let clients = population
        .clients
        .into_iter()
        .map(|profile| {
            let id = profile.id.0;
            let client = core.register_client(profile);
            ClientActor::new(client, behavior.client, actor_seed(seed, CLIENT_SEED_SALT, id))
        })
        .collect();

    (drivers, clients)
}

/// Core for `params` on the given clock. The core's audit RNG follows the scenario seed.
pub fn build_core(params: &ScenarioParams, clock: Arc<dyn Clock>) -> DispatchCore {
    let mut config = params.config.clone();
    if let Some(seed) = params.seed {
        config.dispatch.seed = seed;
    }
    DispatchCore::from_config(&config, clock)
}

/// Populate `world` for the virtual-time runner: core, actors as entities, clock and telemetry.
pub fn build_scenario(world: &mut World, params: ScenarioParams) {
    let virtual_time = Arc::new(ManualClock::new(0));
    let core = Arc::new(build_core(&params, virtual_time.clone()));

    world.insert_resource(SimulationClock::default());
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(VirtualTime(virtual_time));
    world.insert_resource(TickSchedule(params.config.ticks));
    if let Some(end_ms) = params.simulation_end_time_ms {
        world.insert_resource(SimulationEndTimeMs(end_ms));
    }

    let population = generate_population(&params);
    let (drivers, clients) = build_actors(&core, &params, population);
    for actor in drivers {
        world.spawn(DriverAgent(actor));
    }
    for actor in clients {
        world.spawn(ClientAgent(actor));
    }
    world.insert_resource(DispatchHandle(core));
}
