//! Trip ledger: every trip ever assigned, with its lifecycle state and progress.
//!
//! Trips move `Active → Finished` and never back. The ledger only grows; a trip's
//! [`TripId`] is its index. Every mutation bumps a revision number that persistence
//! uses to drop out-of-order snapshot writes.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::geometry::{distance, Point};
use crate::model::{ClientId, DriverId, ServiceLeg, TripId};
use crate::quality::{fold_ratings, QualityRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripStatus {
    Active,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub client_id: ClientId,
    pub driver_id: DriverId,
    pub origin: Point,
    pub destination: Point,
    pub status: TripStatus,
    #[serde(default)]
    pub leg: ServiceLeg,
    pub start_ts: u64,
    /// When the driver reached the origin and the transit leg began.
    #[serde(default)]
    pub picked_up_ts: Option<u64>,
    #[serde(default)]
    pub end_ts: Option<u64>,
    pub fare_estimate: f64,
    /// Transit-leg progress in `[0, 1]`; stays 0 for the whole pickup leg.
    pub progress: f64,
    /// Pickup ETA computed at assignment.
    pub pickup_eta: f64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub audited: bool,
    pub plate: String,
    pub driver_name: String,
    pub driver_rating: f64,
}

impl Trip {
    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    pub fn is_finished(&self) -> bool {
        self.status == TripStatus::Finished
    }

    /// Remaining transit time: `(1 - progress) * distance(origin, destination) / transit_speed`.
    pub fn eta_remaining(&self, transit_speed: f64) -> f64 {
        let total = distance(self.origin, self.destination) / transit_speed.max(crate::geometry::MIN_SPEED);
        ((1.0 - self.progress) * total).max(0.0)
    }

    fn matches(&self, client_id: ClientId, driver_id: DriverId) -> bool {
        self.is_active() && self.client_id == client_id && self.driver_id == driver_id
    }
}

/// Everything needed to open a trip; the ledger fills in id, status and progress.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    pub client_id: ClientId,
    pub driver_id: DriverId,
    pub origin: Point,
    pub destination: Point,
    pub start_ts: u64,
    pub fare_estimate: f64,
    pub pickup_eta: f64,
    pub plate: String,
    pub driver_name: String,
    pub driver_rating: f64,
}

#[derive(Debug, Default)]
struct LedgerInner {
    trips: Vec<Trip>,
    revision: u64,
}

impl LedgerInner {
    fn find_active_mut(&mut self, client_id: ClientId, driver_id: DriverId) -> Option<&mut Trip> {
        self.trips
            .iter_mut()
            .rev()
            .find(|trip| trip.matches(client_id, driver_id))
    }
}

/// Full copy of the ledger tagged with the revision it was taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub revision: u64,
    pub trips: Vec<Trip>,
}

#[derive(Debug, Default)]
pub struct TripLedger {
    inner: Mutex<LedgerInner>,
}

impl TripLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new Active trip with zero progress.
    pub fn append(&self, new_trip: NewTrip) -> Trip {
        let mut inner = self.inner.lock();
        let trip = Trip {
            id: TripId(inner.trips.len() as u32),
            client_id: new_trip.client_id,
            driver_id: new_trip.driver_id,
            origin: new_trip.origin,
            destination: new_trip.destination,
            status: TripStatus::Active,
            leg: ServiceLeg::Pickup,
            start_ts: new_trip.start_ts,
            picked_up_ts: None,
            end_ts: None,
            fare_estimate: new_trip.fare_estimate,
            progress: 0.0,
            pickup_eta: new_trip.pickup_eta,
            rating: None,
            audited: false,
            plate: new_trip.plate,
            driver_name: new_trip.driver_name,
            driver_rating: new_trip.driver_rating,
        };
        inner.trips.push(trip.clone());
        inner.revision += 1;
        trip
    }

    /// Set progress on the Active trip for `(client_id, driver_id)`, clamped to `[0, 1]`.
    ///
    /// Returns `false` (and changes nothing) if no such trip is Active, which is how
    /// late updates racing a finalization are absorbed.
    pub fn update_progress(&self, client_id: ClientId, driver_id: DriverId, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let mut inner = self.inner.lock();
        let Some(trip) = inner.find_active_mut(client_id, driver_id) else {
            return false;
        };
        trip.progress = value.clamp(0.0, 1.0);
        inner.revision += 1;
        true
    }

    /// Record that the driver picked the client up and the transit leg started.
    pub fn mark_in_transit(&self, client_id: ClientId, driver_id: DriverId, now_ms: u64) -> bool {
        let mut inner = self.inner.lock();
        let Some(trip) = inner.find_active_mut(client_id, driver_id) else {
            return false;
        };
        trip.leg = ServiceLeg::Transit;
        trip.picked_up_ts = Some(now_ms);
        inner.revision += 1;
        true
    }

    /// Transition the Active trip for `(client_id, driver_id)` to Finished.
    pub fn finish(
        &self,
        client_id: ClientId,
        driver_id: DriverId,
        rating: Option<f64>,
        now_ms: u64,
    ) -> Option<Trip> {
        let mut inner = self.inner.lock();
        let trip = inner.find_active_mut(client_id, driver_id)?;
        trip.status = TripStatus::Finished;
        trip.end_ts = Some(now_ms);
        trip.rating = rating;
        let finished = trip.clone();
        inner.revision += 1;
        Some(finished)
    }

    pub fn active_for(&self, client_id: ClientId, driver_id: DriverId) -> Option<Trip> {
        self.inner
            .lock()
            .trips
            .iter()
            .rev()
            .find(|trip| trip.matches(client_id, driver_id))
            .cloned()
    }

    pub fn get(&self, trip_id: TripId) -> Option<Trip> {
        self.inner.lock().trips.get(trip_id.0 as usize).cloned()
    }

    pub fn list_active(&self) -> Vec<Trip> {
        self.inner
            .lock()
            .trips
            .iter()
            .filter(|trip| trip.is_active())
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().trips.iter().filter(|t| t.is_active()).count()
    }

    pub fn finished_count(&self) -> usize {
        self.inner.lock().trips.iter().filter(|t| t.is_finished()).count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().trips.is_empty()
    }

    pub fn finished_ids(&self) -> Vec<TripId> {
        self.inner
            .lock()
            .trips
            .iter()
            .filter(|trip| trip.is_finished())
            .map(|trip| trip.id)
            .collect()
    }

    /// Set the audit flag on the given Finished trips. Returns how many were flagged.
    pub fn mark_audited(&self, trip_ids: &[TripId]) -> usize {
        let mut inner = self.inner.lock();
        let mut flagged = 0;
        for trip_id in trip_ids {
            if let Some(trip) = inner.trips.get_mut(trip_id.0 as usize) {
                if trip.is_finished() {
                    trip.audited = true;
                    flagged += 1;
                }
            }
        }
        if flagged > 0 {
            inner.revision += 1;
        }
        flagged
    }

    pub fn audited_count(&self) -> usize {
        self.inner.lock().trips.iter().filter(|t| t.audited).count()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.inner.lock();
        LedgerSnapshot {
            revision: inner.revision,
            trips: inner.trips.clone(),
        }
    }

    pub fn quality_by_driver(&self) -> BTreeMap<DriverId, QualityRecord> {
        let inner = self.inner.lock();
        fold_ratings(
            inner
                .trips
                .iter()
                .filter(|trip| trip.is_finished())
                .map(|trip| (trip.driver_id, trip.rating)),
        )
    }

    pub fn quality_by_client(&self) -> BTreeMap<ClientId, QualityRecord> {
        let inner = self.inner.lock();
        fold_ratings(
            inner
                .trips
                .iter()
                .filter(|trip| trip.is_finished())
                .map(|trip| (trip.client_id, trip.rating)),
        )
    }
}
