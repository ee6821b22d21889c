mod support;

use std::fs;

use dispatch_core::config::SimConfig;
use dispatch_core::model::{ClientId, DriverId};
use dispatch_core::persistence::{load_accounting, load_trips};
use dispatch_core::trips::TripStatus;

use support::entities::{ClientBuilder, DriverBuilder};
use support::world::{core_of, TestWorldBuilder};

#[test]
fn trips_and_books_are_written_through() {
    let dir = tempfile::tempdir().expect("temp dir");
    let data_dir = dir.path().join("data");
    let mut world = TestWorldBuilder::new().with_data_dir(&data_dir).build();
    let (_, driver) = DriverBuilder::new(1).at(0.5, 0.45).spawn(&mut world);
    let (_, client) = ClientBuilder::new(1).spawn(&mut world);
    let core = core_of(&world);

    core.submit(client.profile().request());
    let on_disk = load_trips(data_dir.join("trips.json"));
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0].status, TripStatus::Active);

    core.finalize(&driver, ClientId(1), Some(5.0)).expect("settled");
    let on_disk = core.snapshot_store().load_trips();
    assert_eq!(on_disk[0].status, TripStatus::Finished);
    assert_eq!(on_disk[0].rating, Some(5.0));
    assert_eq!(on_disk[0].id, core.all_trips()[0].id);
    assert_eq!(on_disk[0].fare_estimate, 5.0);

    let books = core.close_accounting();
    let stored = load_accounting(data_dir.join("accounting.json"));
    assert_eq!(stored, books);
    assert!((stored.per_driver_total[&DriverId(1)] - 4.0).abs() < 1e-9);
    assert_eq!(core.persistence_failures(), 0);
}

#[test]
fn books_are_written_at_settlement_without_a_closure() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut world = TestWorldBuilder::new()
        .with_search_radius(1.0)
        .with_data_dir(dir.path())
        .build();
    let (_, driver) = DriverBuilder::new(1).at(0.0, 0.0).spawn(&mut world);
    let (_, client) = ClientBuilder::new(1)
        .from_to((0.0, 0.0), (0.0, 1.0))
        .spawn(&mut world);
    let core = core_of(&world);
    core.submit(client.profile().request());
    assert!(!dir.path().join("accounting.json").exists());

    core.finalize(&driver, ClientId(1), Some(4.0)).expect("settled");

    let stored = load_accounting(dir.path().join("accounting.json"));
    let in_memory = core.accounting_snapshot();
    assert_eq!(stored.timestamp, in_memory.timestamp);
    assert_eq!(stored.per_driver_total.len(), 1);
    // fare 13.0 split 20/80
    assert!((stored.company_total - 2.6).abs() < 1e-9);
    assert!((stored.per_driver_total[&DriverId(1)] - 10.4).abs() < 1e-9);
    assert_eq!(core.persistence_failures(), 0);
}

#[test]
fn pickup_is_written_but_progress_ticks_are_not() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut world = TestWorldBuilder::new().with_data_dir(dir.path()).build();
    let (_, driver) = DriverBuilder::new(1).at(0.5, 0.45).spawn(&mut world);
    let (_, client) = ClientBuilder::new(1).spawn(&mut world);
    let core = core_of(&world);
    core.submit(client.profile().request());

    assert!(core.mark_in_transit(&driver));
    let stored = core.snapshot_store().load_trips();
    assert!(stored[0].picked_up_ts.is_some());
    assert_eq!(stored[0].progress, 0.0);

    assert!(core.update_progress(&driver, 0.5));
    let stored = core.snapshot_store().load_trips();
    assert_eq!(stored[0].progress, 0.0);
    assert_eq!(core.all_trips()[0].progress, 0.5);
}

#[test]
fn audit_flags_reach_storage() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut world = TestWorldBuilder::new().with_data_dir(dir.path()).build();
    let (_, driver) = DriverBuilder::new(1).at(0.5, 0.45).spawn(&mut world);
    let (_, client) = ClientBuilder::new(1).spawn(&mut world);
    let core = core_of(&world);
    core.submit(client.profile().request());
    core.finalize(&driver, ClientId(1), None).expect("settled");

    let picked = core.audit_default();

    assert_eq!(picked.len(), 1);
    let stored = core.snapshot_store().load_trips();
    assert!(stored[0].audited);
}

#[test]
fn write_failures_are_counted_and_not_fatal() {
    let dir = tempfile::tempdir().expect("temp dir");
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"occupied").expect("write blocker");
    let mut world = TestWorldBuilder::new().with_data_dir(&blocker).build();
    let (_, driver) = DriverBuilder::new(1).at(0.5, 0.45).spawn(&mut world);
    let (_, client) = ClientBuilder::new(1).spawn(&mut world);
    let core = core_of(&world);

    let outcome = core.submit(client.profile().request());
    assert!(outcome.assignment.is_some());
    core.finalize(&driver, ClientId(1), Some(4.0)).expect("settled");
    let books = core.close_accounting();

    assert!(core.persistence_failures() >= 3);
    assert_eq!(core.finished_trip_count(), 1);
    assert!((books.company_total - 1.0).abs() < 1e-9);
    assert!(core.fleet_is_consistent());
}

#[test]
fn loaders_tolerate_missing_and_malformed_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("missing.json");
    let garbage = dir.path().join("garbage.json");
    let empty = dir.path().join("empty.json");
    fs::write(&garbage, b"{ not json").expect("write garbage");
    fs::write(&empty, b"").expect("write empty");

    assert!(load_trips(&missing).is_empty());
    assert!(load_trips(&garbage).is_empty());
    assert!(load_trips(&empty).is_empty());
    assert_eq!(load_accounting(&garbage).company_total, 0.0);
    assert!(load_accounting(&missing).per_driver_total.is_empty());
}

#[test]
fn config_file_is_loaded_and_validated() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("dispatch.json");
    fs::write(
        &path,
        r#"{
            "dispatch": { "search_radius": 0.05, "commission_rate": 0.5 },
            "ticks": { "driver_tick_ms": 20, "audit_interval_ms": 60000 }
        }"#,
    )
    .expect("write config");

    let config = SimConfig::from_json_file(&path).expect("config");
    assert_eq!(config.ticks.driver_tick_ms, 20);
    assert_eq!(config.ticks.audit_interval_ms, Some(60_000));
    assert_eq!(config.dispatch.commission_rate, 0.5);
    assert!(!config.persistence.is_enabled());

    fs::write(&path, r#"{ "dispatch": { "commission_rate": 1.5 } }"#).expect("rewrite config");
    assert!(SimConfig::from_json_file(&path).is_err());
    assert!(SimConfig::from_json_file(dir.path().join("absent.json")).is_err());
}
