//! The dispatch core: request intake, matching, assignment and trip finalization.
//!
//! There is no dispatcher thread. A dispatch cycle runs synchronously inside
//! whoever calls [`DispatchCore::submit`] or [`DispatchCore::dispatch_cycle`].
//! Each shared collection has its own lock; when more than one is held the order
//! is fleet registry → driver state → trip ledger, and snapshot writes happen
//! after every data lock has been released.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::accounting::{AccountingLedger, AccountingSnapshot};
use crate::config::{DispatchConfig, PersistenceConfig, SimConfig};
use crate::fleet::FleetRegistry;
use crate::geometry::{eta, Point};
use crate::matching::{MatchingAlgorithm, NearestRatedMatching};
use crate::model::{Assignment, Client, ClientId, ClientProfile, Driver, DriverId, DriverProfile, RideRequest, ServiceLeg, TripId};
use crate::persistence::SnapshotStore;
use crate::pricing::{fare, FareSplit};
use crate::quality::{sample_for_audit, QualityRecord, QualityTracker};
use crate::queue::{DrainOutcome, HeadOfLinePolicy, RequestQueue};
use crate::telemetry::{DispatchCounts, ReportSnapshot};
use crate::time::Clock;
use crate::trips::{NewTrip, Trip, TripLedger};

/// Rematch attempts per request when the chosen driver is claimed by a concurrent cycle.
const MAX_CLAIM_ATTEMPTS: usize = 8;

/// What the submitter learns when its request is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentReceipt {
    pub trip_id: TripId,
    pub client_id: ClientId,
    pub driver_id: DriverId,
    pub plate: String,
    pub driver_name: String,
    pub pickup_eta: f64,
    pub fare_estimate: f64,
}

impl From<&Trip> for AssignmentReceipt {
    fn from(trip: &Trip) -> Self {
        Self {
            trip_id: trip.id,
            client_id: trip.client_id,
            driver_id: trip.driver_id,
            plate: trip.plate.clone(),
            driver_name: trip.driver_name.clone(),
            pickup_eta: trip.pickup_eta,
            fare_estimate: trip.fare_estimate,
        }
    }
}

/// Outcome of a submission: the dispatch cycle it triggered, plus the receipt
/// for the submitted request if that cycle assigned it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub cycle: DrainOutcome,
    pub assignment: Option<AssignmentReceipt>,
}

#[derive(Debug)]
pub struct DispatchCore {
    config: DispatchConfig,
    clock: Arc<dyn Clock>,
    algorithm: Box<dyn MatchingAlgorithm>,
    queue: RequestQueue,
    fleet: FleetRegistry,
    trips: TripLedger,
    accounting: AccountingLedger,
    quality: QualityTracker,
    store: SnapshotStore,
    drivers: RwLock<BTreeMap<DriverId, Arc<Driver>>>,
    clients: RwLock<BTreeMap<ClientId, Arc<Client>>>,
    rng: Mutex<StdRng>,
}

impl DispatchCore {
    pub fn new(config: DispatchConfig, persistence: PersistenceConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            algorithm: Box::new(NearestRatedMatching),
            queue: RequestQueue::new(),
            fleet: FleetRegistry::new(),
            trips: TripLedger::new(),
            accounting: AccountingLedger::new(config.commission_rate),
            quality: QualityTracker::new(),
            store: SnapshotStore::new(persistence),
            drivers: RwLock::new(BTreeMap::new()),
            clients: RwLock::new(BTreeMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
        }
    }

    pub fn from_config(config: &SimConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.dispatch, config.persistence.clone(), clock)
    }

    /// Replace the matching rule. Only meaningful before any request is submitted.
    pub fn with_algorithm(mut self, algorithm: Box<dyn MatchingAlgorithm>) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Create a driver and, if admitted, make it available for matching.
    ///
    /// Registering an id twice returns the existing driver unchanged.
    pub fn register_driver(&self, profile: DriverProfile, location: Point) -> Arc<Driver> {
        let driver = {
            let mut drivers = self.drivers.write();
            if let Some(existing) = drivers.get(&profile.id) {
                return Arc::clone(existing);
            }
            let driver = Arc::new(Driver::new(profile, location));
            drivers.insert(driver.id(), Arc::clone(&driver));
            driver
        };
        if driver.is_admitted() {
            self.fleet.add(&driver);
        } else {
            tracing::info!(
                driver = %driver.id(),
                reason = %driver.profile().admission.reason,
                "driver not admitted, kept out of the fleet"
            );
        }
        driver
    }

    /// Create a client. Registering an id twice returns the existing client.
    pub fn register_client(&self, profile: ClientProfile) -> Arc<Client> {
        let mut clients = self.clients.write();
        if let Some(existing) = clients.get(&profile.id) {
            return Arc::clone(existing);
        }
        let client = Arc::new(Client::new(profile));
        if !client.is_admitted() {
            tracing::info!(
                client = %client.id(),
                reason = %client.profile().admission.reason,
                "client not admitted, requests will not be submitted"
            );
        }
        clients.insert(client.id(), Arc::clone(&client));
        client
    }

    pub fn driver(&self, driver_id: DriverId) -> Option<Arc<Driver>> {
        self.drivers.read().get(&driver_id).cloned()
    }

    pub fn client(&self, client_id: ClientId) -> Option<Arc<Client>> {
        self.clients.read().get(&client_id).cloned()
    }

    /// All registered drivers in ascending id order.
    pub fn drivers(&self) -> Vec<Arc<Driver>> {
        self.drivers.read().values().cloned().collect()
    }

    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.read().values().cloned().collect()
    }

    /// Enqueue `request` and run one dispatch cycle.
    pub fn submit(&self, request: RideRequest) -> SubmitOutcome {
        tracing::debug!(client = %request.client_id, "ride request enqueued");
        self.queue.submit(request);
        let (cycle, assigned) = self.run_cycle();
        let assignment = assigned
            .into_iter()
            .find(|receipt| receipt.client_id == request.client_id);
        SubmitOutcome { cycle, assignment }
    }

    /// Run one dispatch cycle over the backlog without submitting anything.
    pub fn dispatch_cycle(&self) -> DrainOutcome {
        self.run_cycle().0
    }

    fn run_cycle(&self) -> (DrainOutcome, Vec<AssignmentReceipt>) {
        let mut assigned = Vec::new();
        let outcome = self.queue.drain_once(HeadOfLinePolicy, |request| {
            match self.try_dispatch(request) {
                Some(trip) => {
                    assigned.push(AssignmentReceipt::from(&trip));
                    true
                }
                None => false,
            }
        });
        (outcome, assigned)
    }

    /// Pick the driver `request` would be assigned to right now, without claiming it.
    pub fn match_request(&self, request: &RideRequest) -> Option<DriverId> {
        let candidates = self.fleet.snapshot_available();
        self.algorithm
            .find_match(request, &candidates, self.config.search_radius)
    }

    /// Match and assign, rematching when a concurrent cycle claims the chosen driver first.
    fn try_dispatch(&self, request: &RideRequest) -> Option<Trip> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let driver_id = self.match_request(request)?;
            if let Some(trip) = self.assign(request, driver_id) {
                return Some(trip);
            }
            tracing::debug!(driver = %driver_id, client = %request.client_id, "driver claimed concurrently, rematching");
        }
        None
    }

    /// Claim `driver_id` for `request` and open an Active trip.
    ///
    /// The driver leaves the registry, is marked occupied, receives its assignment
    /// and the trip is appended, all while the registry lock is held. Returns `None`
    /// if the driver was not available.
    pub fn assign(&self, request: &RideRequest, driver_id: DriverId) -> Option<Trip> {
        let now = self.clock.now_ms();
        let fare_estimate = fare(request.origin, request.destination);
        let trip = self.fleet.claim(driver_id, |driver, state| {
            let profile = driver.profile();
            let trip = self.trips.append(NewTrip {
                client_id: request.client_id,
                driver_id,
                origin: request.origin,
                destination: request.destination,
                start_ts: now,
                fare_estimate,
                pickup_eta: eta(state.location, request.origin, self.config.pickup_speed),
                plate: profile.plate.clone(),
                driver_name: profile.driver_name.clone(),
                driver_rating: profile.rating,
            });
            state.assignment = Some(Assignment::new(trip.id, *request));
            trip
        })?;
        tracing::info!(
            trip = %trip.id,
            driver = %driver_id,
            client = %request.client_id,
            fare = trip.fare_estimate,
            pickup_eta = trip.pickup_eta,
            "driver assigned"
        );
        self.persist_trips();
        Some(trip)
    }

    /// Set transit progress on the driver's current trip. No-op if it has none.
    pub fn update_progress(&self, driver: &Driver, value: f64) -> bool {
        let Some(assignment) = driver.assignment() else {
            return false;
        };
        self.trips
            .update_progress(assignment.request.client_id, driver.id(), value)
    }

    /// Record the pickup of the driver's current client.
    pub fn mark_in_transit(&self, driver: &Driver) -> bool {
        let Some(assignment) = driver.assignment() else {
            return false;
        };
        let marked = self.trips.mark_in_transit(
            assignment.request.client_id,
            driver.id(),
            self.clock.now_ms(),
        );
        if marked {
            tracing::debug!(trip = %assignment.trip_id, driver = %driver.id(), "client picked up");
            self.persist_trips();
        }
        marked
    }

    /// Close the Active trip for `(client_id, driver)` and settle its fare.
    ///
    /// The trip becomes Finished, the recomputed fare is split into the accounting
    /// ledger, the rating (if any) is folded into the running tallies, both
    /// snapshots are written, and only then is the driver released back to the
    /// fleet. Returns the split, or `None` if no such trip was Active.
    pub fn finalize(&self, driver: &Arc<Driver>, client_id: ClientId, rating: Option<f64>) -> Option<FareSplit> {
        let now = self.clock.now_ms();
        let Some(trip) = self.trips.finish(client_id, driver.id(), rating, now) else {
            self.release_stale_assignment(driver, client_id);
            return None;
        };
        let split = self
            .accounting
            .record(driver.id(), fare(trip.origin, trip.destination), now);
        if let Some(value) = rating {
            self.quality.record(driver.id(), client_id, value);
        }
        tracing::info!(
            trip = %trip.id,
            driver = %driver.id(),
            client = %client_id,
            fare = split.fare,
            commission = split.commission,
            rating = ?rating,
            "trip finished"
        );
        self.persist_trips();
        self.persist_accounting();
        self.fleet.release(driver);
        Some(split)
    }

    fn release_stale_assignment(&self, driver: &Arc<Driver>, client_id: ClientId) {
        let serving = driver
            .assignment()
            .is_some_and(|assignment| assignment.request.client_id == client_id);
        if serving {
            tracing::warn!(driver = %driver.id(), client = %client_id, "no active trip to finalize, releasing driver");
            self.fleet.release(driver);
        }
    }

    /// Remaining transit time of `trip` at the configured transit speed.
    pub fn eta_remaining(&self, trip: &Trip) -> f64 {
        trip.eta_remaining(self.config.transit_speed)
    }

    /// Remaining pickup time, from the driver's live position. Zero once the
    /// transit leg has started or the trip is over.
    pub fn pickup_eta_remaining(&self, trip: &Trip) -> f64 {
        if !trip.is_active() || trip.leg != ServiceLeg::Pickup {
            return 0.0;
        }
        self.driver(trip.driver_id)
            .map(|driver| eta(driver.location(), trip.origin, self.config.pickup_speed))
            .unwrap_or(trip.pickup_eta)
    }

    /// Write the current accounting books through to storage and return them.
    ///
    /// Safe at any time, including with Active trips. Two closures without a
    /// finalization in between return identical snapshots.
    pub fn close_accounting(&self) -> AccountingSnapshot {
        let (revision, books) = self.accounting.snapshot();
        self.store.persist_accounting(revision, &books);
        tracing::info!(
            company_total = books.company_total,
            drivers = books.per_driver_total.len(),
            "accounting closed"
        );
        books
    }

    /// Flag up to `max_count` Finished trips, chosen uniformly at random, for audit.
    pub fn audit_sample(&self, max_count: usize) -> Vec<TripId> {
        let finished = self.trips.finished_ids();
        if finished.is_empty() {
            return Vec::new();
        }
        let picked = {
            let mut rng = self.rng.lock();
            sample_for_audit(&finished, max_count, &mut *rng)
        };
        let flagged = self.trips.mark_audited(&picked);
        tracing::info!(flagged, finished = finished.len(), "audit sample taken");
        self.persist_trips();
        picked
    }

    /// [`Self::audit_sample`] with the configured default size.
    pub fn audit_default(&self) -> Vec<TripId> {
        self.audit_sample(self.config.audit_max_count)
    }

    pub fn quality_by_driver(&self) -> BTreeMap<DriverId, QualityRecord> {
        self.trips.quality_by_driver()
    }

    pub fn quality_by_client(&self) -> BTreeMap<ClientId, QualityRecord> {
        self.trips.quality_by_client()
    }

    /// Running tallies updated at every rated finalization.
    pub fn quality_tracker(&self) -> &QualityTracker {
        &self.quality
    }

    pub fn accounting_snapshot(&self) -> AccountingSnapshot {
        self.accounting.snapshot().1
    }

    pub fn list_active_trips(&self) -> Vec<Trip> {
        self.trips.list_active()
    }

    pub fn trip(&self, trip_id: TripId) -> Option<Trip> {
        self.trips.get(trip_id)
    }

    /// Every trip ever assigned, in id order.
    pub fn all_trips(&self) -> Vec<Trip> {
        self.trips.snapshot().trips
    }

    pub fn pending_requests(&self) -> Vec<RideRequest> {
        self.queue.snapshot()
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    pub fn active_trip_count(&self) -> usize {
        self.trips.active_count()
    }

    pub fn finished_trip_count(&self) -> usize {
        self.trips.finished_count()
    }

    pub fn is_available(&self, driver_id: DriverId) -> bool {
        self.fleet.contains(driver_id)
    }

    pub fn available_driver_count(&self) -> usize {
        self.fleet.len()
    }

    pub fn counts(&self) -> DispatchCounts {
        DispatchCounts {
            queue_length: self.queue.len(),
            active_trips: self.trips.active_count(),
            finished_trips: self.trips.finished_count(),
            audited_trips: self.trips.audited_count(),
            available_drivers: self.fleet.len(),
            registered_drivers: self.drivers.read().len(),
            registered_clients: self.clients.read().len(),
        }
    }

    pub fn report_snapshot(&self) -> ReportSnapshot {
        ReportSnapshot {
            quality_by_driver: self.quality_by_driver(),
            quality_by_client: self.quality_by_client(),
            accounting: self.accounting_snapshot(),
            finished_trips: self.finished_trip_count(),
        }
    }

    /// Snapshot writes that failed and were downgraded to warnings.
    pub fn persistence_failures(&self) -> u64 {
        self.store.failures()
    }

    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.store
    }

    /// `occupied ⇔ not registered` for every admitted driver.
    pub fn fleet_is_consistent(&self) -> bool {
        let drivers = self.drivers();
        self.fleet.is_consistent_with(drivers.iter())
    }

    fn persist_trips(&self) {
        if self.store.config().is_enabled() {
            self.store.persist_trips(&self.trips.snapshot());
        }
    }

    fn persist_accounting(&self) {
        if self.store.config().is_enabled() {
            let (revision, books) = self.accounting.snapshot();
            self.store.persist_accounting(revision, &books);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    fn core() -> DispatchCore {
        DispatchCore::new(
            DispatchConfig::default(),
            PersistenceConfig::disabled(),
            Arc::new(ManualClock::new(1_000)),
        )
    }

    fn request(client: u32, origin: Point, destination: Point) -> RideRequest {
        RideRequest {
            client_id: ClientId(client),
            origin,
            destination,
        }
    }

    #[test]
    fn higher_rating_wins_a_distance_tie() {
        let core = core();
        let a = core.register_driver(DriverProfile::new(DriverId(1), 4.5), Point::new(0.51, 0.51));
        let b = core.register_driver(DriverProfile::new(DriverId(2), 4.9), Point::new(0.51, 0.51));
        let outcome = core.submit(request(1, Point::new(0.5, 0.5), Point::new(0.9, 0.9)));
        let receipt = outcome.assignment.expect("assigned");
        assert_eq!(receipt.driver_id, b.id());
        assert_eq!(receipt.plate, "UNI-002");
        assert!(b.is_occupied());
        assert!(core.is_available(a.id()));
        assert!(core.fleet_is_consistent());
    }

    #[test]
    fn out_of_radius_request_stays_queued() {
        let core = core();
        core.register_driver(DriverProfile::new(DriverId(1), 4.5), Point::new(0.9, 0.9));
        let outcome = core.submit(request(1, Point::new(0.1, 0.1), Point::new(0.2, 0.2)));
        assert!(outcome.assignment.is_none());
        assert!(outcome.cycle.stalled);
        assert_eq!(core.active_trip_count(), 0);
        assert_eq!(core.queue_length(), 1);
    }

    #[test]
    fn assignment_fills_fare_and_pickup_eta() {
        let core = core();
        core.register_driver(DriverProfile::new(DriverId(1), 4.5), Point::new(0.0, 0.1));
        let receipt = core
            .submit(request(1, Point::new(0.0, 0.0), Point::new(0.0, 1.0)))
            .assignment
            .expect("assigned");
        assert_eq!(receipt.fare_estimate, 13.0);
        assert!((receipt.pickup_eta - 0.5).abs() < 1e-9);
        let trip = core.trip(receipt.trip_id).expect("trip");
        assert_eq!(trip.start_ts, 1_000);
        assert!(trip.is_active());
    }

    #[test]
    fn finalize_settles_and_releases() {
        let core = core();
        let driver = core.register_driver(DriverProfile::new(DriverId(1), 4.5), Point::new(0.0, 0.0));
        core.submit(request(7, Point::new(0.0, 0.0), Point::new(0.0, 1.0)));
        assert!(!core.is_available(driver.id()));

        let split = core
            .finalize(&driver, ClientId(7), Some(4.0))
            .expect("settled");
        assert!((split.commission - 2.6).abs() < 1e-9);
        assert!((split.payout - 10.4).abs() < 1e-9);
        assert!(core.is_available(driver.id()));
        assert!(driver.assignment().is_none());
        assert_eq!(core.finished_trip_count(), 1);
        assert_eq!(core.quality_tracker().driver(driver.id()).map(|r| r.count), Some(1));
        assert!(core.finalize(&driver, ClientId(7), Some(4.0)).is_none());
        assert!((core.accounting_snapshot().company_total - 2.6).abs() < 1e-9);
    }

    #[test]
    fn release_triggers_no_dispatch_until_next_submit() {
        let core = core();
        let driver = core.register_driver(DriverProfile::new(DriverId(1), 4.5), Point::new(0.5, 0.5));
        core.submit(request(1, Point::new(0.5, 0.5), Point::new(0.6, 0.6)));
        core.submit(request(2, Point::new(0.5, 0.5), Point::new(0.6, 0.6)));
        assert_eq!(core.queue_length(), 1);

        core.finalize(&driver, ClientId(1), None);
        assert_eq!(core.queue_length(), 1);
        assert_eq!(core.dispatch_cycle().matched, 1);
        assert_eq!(core.queue_length(), 0);
    }

    #[test]
    fn rejected_driver_is_never_matched() {
        let core = core();
        core.register_driver(
            DriverProfile::new(DriverId(1), 5.0).with_admission(crate::model::Admission::rejected("no insurance")),
            Point::new(0.5, 0.5),
        );
        assert!(core
            .submit(request(1, Point::new(0.5, 0.5), Point::new(0.6, 0.6)))
            .assignment
            .is_none());
        assert_eq!(core.available_driver_count(), 0);
    }

    #[test]
    fn closing_twice_without_finalization_is_idempotent() {
        let core = core();
        let driver = core.register_driver(DriverProfile::new(DriverId(1), 4.5), Point::new(0.5, 0.5));
        core.submit(request(1, Point::new(0.5, 0.5), Point::new(0.6, 0.6)));
        core.finalize(&driver, ClientId(1), Some(5.0));
        core.submit(request(2, Point::new(0.5, 0.5), Point::new(0.6, 0.6)));
        assert_eq!(core.close_accounting(), core.close_accounting());
    }

    #[test]
    fn audit_without_finished_trips_is_a_no_op() {
        let core = core();
        assert!(core.audit_default().is_empty());
        assert_eq!(core.counts().audited_trips, 0);
    }

    #[test]
    fn pickup_eta_tracks_driver_position() {
        let core = core();
        let driver = core.register_driver(DriverProfile::new(DriverId(1), 4.5), Point::new(0.5, 0.65));
        let receipt = core
            .submit(request(1, Point::new(0.5, 0.5), Point::new(0.5, 0.9)))
            .assignment
            .expect("assigned");
        let trip = core.trip(receipt.trip_id).expect("trip");
        assert!((core.pickup_eta_remaining(&trip) - 0.75).abs() < 1e-9);

        driver.state().location = Point::new(0.5, 0.6);
        assert!((core.pickup_eta_remaining(&trip) - 0.5).abs() < 1e-9);

        core.mark_in_transit(&driver);
        let trip = core.trip(receipt.trip_id).expect("trip");
        assert_eq!(core.pickup_eta_remaining(&trip), 0.0);
    }
}
