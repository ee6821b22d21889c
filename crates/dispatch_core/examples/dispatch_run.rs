//! Run a seeded scenario in virtual time and print the dispatch report.
//!
//! Run with: cargo run -p dispatch_core --example dispatch_run
//! Optional: RUST_LOG=dispatch_core=debug, DISPATCH_CONFIG=path/to/config.json

use bevy_ecs::prelude::World;
use dispatch_core::config::SimConfig;
use dispatch_core::ecs::DispatchHandle;
use dispatch_core::runner::{initialize_simulation, run_until, simulation_schedule};
use dispatch_core::scenario::{build_scenario, ScenarioParams};
use dispatch_core::telemetry::SimTelemetry;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    const NUM_DRIVERS: u32 = 40;
    const NUM_CLIENTS: u32 = 120;
    const SIMULATION_MINUTES: u64 = 30;

    let config = match std::env::var("DISPATCH_CONFIG") {
        Ok(path) => SimConfig::from_json_file(&path).unwrap_or_else(|err| {
            eprintln!("failed to load {path}: {err}");
            std::process::exit(1);
        }),
        Err(_) => SimConfig::default(),
    };

    let mut world = World::new();
    build_scenario(
        &mut world,
        ScenarioParams::default()
            .with_drivers(NUM_DRIVERS)
            .with_clients(NUM_CLIENTS)
            .with_seed(123)
            .with_config(config),
    );
    initialize_simulation(&mut world);

    let mut schedule = simulation_schedule();
    let steps = run_until(&mut world, &mut schedule, SIMULATION_MINUTES * 60 * 1000);

    let core = world.resource::<DispatchHandle>().0.clone();
    let accounting = core.close_accounting();
    let audited = core.audit_default();
    let counts = core.counts();
    let telemetry = world.resource::<SimTelemetry>();

    println!(
        "--- Dispatch run ({} drivers, {} clients, {} min, seed 123) ---",
        NUM_DRIVERS, NUM_CLIENTS, SIMULATION_MINUTES
    );
    println!("Steps executed: {}", steps);
    println!("Requests submitted: {}", telemetry.requests_submitted);
    println!("Still queued: {}", counts.queue_length);
    println!("Active trips: {}", counts.active_trips);
    println!("Finished trips: {}", counts.finished_trips);
    println!("Audited trips: {}", audited.len());
    println!("Company total: {:.2}", accounting.company_total);

    let quality = core.quality_by_driver();
    if !quality.is_empty() {
        println!("\nDriver quality (rated trips):");
        for (driver_id, record) in &quality {
            let paid = accounting
                .per_driver_total
                .get(driver_id)
                .copied()
                .unwrap_or(0.0);
            println!(
                "  driver={}  avg={:.2}  n={}  payout={:.2}",
                driver_id, record.average, record.count, paid
            );
        }
    }
    if core.persistence_failures() > 0 {
        println!("\nSnapshot write failures: {}", core.persistence_failures());
    }
}
