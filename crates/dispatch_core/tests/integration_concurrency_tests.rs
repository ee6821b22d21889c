mod support;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use dispatch_core::dispatch::DispatchCore;
use dispatch_core::geometry::Point;
use dispatch_core::model::{ClientId, ClientProfile, DriverId, DriverProfile};

use support::world::TestWorldBuilder;

const DRIVERS: u32 = 10;
const CLIENTS: u32 = 40;
const THREADS: u32 = 8;

fn crowded_core() -> Arc<DispatchCore> {
    let (core, _clock) = TestWorldBuilder::new().with_search_radius(1.5).build_core();
    for id in 1..=DRIVERS {
        core.register_driver(
            DriverProfile::new(DriverId(id), 4.0 + f64::from(id % 10) / 10.0),
            Point::new(0.1 + 0.08 * f64::from(id % 10), 0.5),
        );
    }
    for id in 1..=CLIENTS {
        core.register_client(ClientProfile::new(
            ClientId(id),
            Point::new(0.5, 0.5),
            Point::new(0.5, 0.8),
        ));
    }
    core
}

fn submit_concurrently(core: &Arc<DispatchCore>) {
    let handles: Vec<_> = (0..THREADS)
        .map(|offset| {
            let core = Arc::clone(core);
            thread::spawn(move || {
                for id in (1..=CLIENTS).filter(|id| id % THREADS == offset) {
                    let client = core.client(ClientId(id)).expect("client");
                    core.submit(client.profile().request());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("submit thread");
    }
}

/// Keep cycling until nothing more can be matched.
fn drain(core: &DispatchCore) {
    while core.dispatch_cycle().matched > 0 {}
}

#[test]
fn concurrent_submissions_never_double_assign_a_driver() {
    let core = crowded_core();

    submit_concurrently(&core);
    drain(&core);

    let active = core.list_active_trips();
    assert_eq!(active.len(), DRIVERS as usize);
    let drivers: BTreeSet<DriverId> = active.iter().map(|trip| trip.driver_id).collect();
    assert_eq!(drivers.len(), DRIVERS as usize);
    let clients: BTreeSet<ClientId> = active.iter().map(|trip| trip.client_id).collect();
    assert_eq!(clients.len(), DRIVERS as usize);

    assert_eq!(core.queue_length(), (CLIENTS - DRIVERS) as usize);
    assert_eq!(core.available_driver_count(), 0);
    assert!(core.fleet_is_consistent());
}

#[test]
fn concurrent_finalizations_settle_each_trip_once() {
    let core = crowded_core();
    submit_concurrently(&core);
    drain(&core);

    let active = core.list_active_trips();
    // Two threads race to finalize every trip; only one may win each.
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let core = Arc::clone(&core);
            let trips = active.clone();
            thread::spawn(move || {
                trips
                    .iter()
                    .filter(|trip| {
                        let driver = core.driver(trip.driver_id).expect("driver");
                        core.finalize(&driver, trip.client_id, Some(4.5)).is_some()
                    })
                    .count()
            })
        })
        .collect();
    let settled: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("finalize thread"))
        .sum();

    assert_eq!(settled, DRIVERS as usize);
    assert_eq!(core.finished_trip_count(), DRIVERS as usize);
    assert_eq!(core.accounting_snapshot().per_driver_total.len(), DRIVERS as usize);
    let quality = core.quality_tracker().drivers();
    assert!(quality.values().all(|record| record.count == 1));
    assert!(core.fleet_is_consistent());

    // The released drivers pick up the next batch from the backlog.
    drain(&core);
    assert_eq!(core.active_trip_count(), DRIVERS as usize);
    assert_eq!(core.queue_length(), (CLIENTS - 2 * DRIVERS) as usize);
    assert!(core.fleet_is_consistent());
}

#[test]
fn readers_run_alongside_writers() {
    let core = crowded_core();

    let reader = {
        let core = Arc::clone(&core);
        thread::spawn(move || {
            let mut observed = 0;
            for _ in 0..200 {
                let counts = core.counts();
                assert!(counts.active_trips <= DRIVERS as usize);
                assert!(counts.available_drivers <= DRIVERS as usize);
                observed += core.list_active_trips().len();
                let _ = core.close_accounting();
            }
            observed
        })
    };
    submit_concurrently(&core);
    reader.join().expect("reader thread");

    drain(&core);
    assert_eq!(core.active_trip_count(), DRIVERS as usize);
    assert_eq!(core.accounting_snapshot().company_total, 0.0);
}
