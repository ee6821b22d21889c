//! Fleet registry: the drivers currently eligible for a new assignment.
//!
//! Membership and `DriverState::occupied` change together, under the registry
//! lock, so `occupied ⇔ not registered` holds for every admitted driver at any
//! instant. Lock order is registry → driver state → trip ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::geometry::Point;
use crate::model::{Driver, DriverId, DriverState};

/// A driver as seen by the matching engine at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub driver_id: DriverId,
    pub location: Point,
    pub rating: f64,
}

#[derive(Debug, Default)]
pub struct FleetRegistry {
    available: Mutex<BTreeMap<DriverId, Arc<Driver>>>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `driver` as available. No-op if already present, occupied or not admitted.
    pub fn add(&self, driver: &Arc<Driver>) {
        if !driver.is_admitted() {
            return;
        }
        let mut available = self.available.lock();
        if driver.state().occupied {
            return;
        }
        available
            .entry(driver.id())
            .or_insert_with(|| Arc::clone(driver));
    }

    /// Drop `driver_id` from the registry. No-op if absent.
    pub fn remove(&self, driver_id: DriverId) {
        if let Some(driver) = self.available.lock().remove(&driver_id) {
            tracing::debug!(driver = %driver.id(), "driver withdrawn from fleet");
        }
    }

    pub fn contains(&self, driver_id: DriverId) -> bool {
        self.available.lock().contains_key(&driver_id)
    }

    pub fn len(&self) -> usize {
        self.available.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.lock().is_empty()
    }

    /// Point-in-time list of available, non-occupied drivers in ascending id order.
    ///
    /// The lock is held only while the list is built; selection happens afterwards.
    pub fn snapshot_available(&self) -> Vec<Candidate> {
        let available = self.available.lock();
        available
            .values()
            .filter_map(|driver| {
                let state = driver.state();
                (!state.occupied).then(|| Candidate {
                    driver_id: driver.id(),
                    location: state.location,
                    rating: driver.rating(),
                })
            })
            .collect()
    }

    /// Take `driver_id` out of the registry and mark it occupied, then run `commit`
    /// with the registry and driver locks still held.
    ///
    /// Returns `None` if the driver is no longer available, which happens when a
    /// concurrent dispatch cycle claimed it first.
    pub fn claim<T>(
        &self,
        driver_id: DriverId,
        commit: impl FnOnce(&Arc<Driver>, &mut DriverState) -> T,
    ) -> Option<T> {
        let mut available = self.available.lock();
        let driver = available.remove(&driver_id)?;
        let mut state = driver.state();
        if state.occupied {
            return None;
        }
        state.occupied = true;
        Some(commit(&driver, &mut state))
    }

    /// Clear the driver's assignment, mark it free and put it back in the registry.
    pub fn release(&self, driver: &Arc<Driver>) {
        let mut available = self.available.lock();
        let mut state = driver.state();
        state.occupied = false;
        state.assignment = None;
        if driver.is_admitted() {
            available
                .entry(driver.id())
                .or_insert_with(|| Arc::clone(driver));
        }
    }

    /// Check `occupied ⇔ not registered` for every admitted driver in `drivers`,
    /// atomically with respect to claims and releases.
    pub fn is_consistent_with<'a>(&self, drivers: impl IntoIterator<Item = &'a Arc<Driver>>) -> bool {
        let available = self.available.lock();
        drivers
            .into_iter()
            .filter(|driver| driver.is_admitted())
            .all(|driver| driver.state().occupied != available.contains_key(&driver.id()))
    }
}
