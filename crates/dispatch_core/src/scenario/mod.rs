//! Scenario setup: place drivers and clients, register them with a dispatch core,
//! and wrap each in an actor for either scheduler.

mod build;
mod params;

pub use build::{actor_seed, build_actors, build_core, build_scenario, generate_population, Population};
pub use params::{AdmissionRecords, ScenarioParams, SimulationEndTimeMs};
