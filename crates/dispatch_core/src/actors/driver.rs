use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ClientBehavior, DriverBehavior};
use crate::dispatch::DispatchCore;
use crate::geometry::{distance, move_toward, MIN_SPEED};
use crate::model::{ClientId, Driver, DriverState, ServiceLeg};
use crate::pricing::FareSplit;

/// What one driver tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverTick {
    /// No assignment; the driver drifted around its position.
    Patrolled,
    /// Moving toward the client's origin.
    Approaching,
    /// Reached the origin this tick and started the transit leg.
    PickedUp { progress: f64 },
    /// Moving toward the destination.
    InTransit { progress: f64 },
    /// Reached the destination and finalized the trip.
    Arrived { split: Option<FareSplit> },
}

/// Movement computed under the driver lock, applied to the core after it is released.
#[derive(Debug, Clone, Copy)]
struct ServiceStep {
    client_id: ClientId,
    picked_up: bool,
    progress: Option<f64>,
    arrived: bool,
}

/// Per-driver behavior: patrol while free, serve the assignment while occupied.
#[derive(Debug)]
pub struct DriverActor {
    driver: Arc<Driver>,
    behavior: DriverBehavior,
    rating_min: f64,
    rating_max: f64,
    rng: StdRng,
}

impl DriverActor {
    /// A behavior whose steps can overshoot the arrival radius is replaced by
    /// the default one, since such a driver would never finish a leg.
    pub fn new(driver: Arc<Driver>, behavior: DriverBehavior, seed: u64) -> Self {
        let behavior = match behavior.validate() {
            Ok(()) => behavior,
            Err(err) => {
                tracing::warn!(
                    driver_id = %driver.id(),
                    error = %err,
                    "unusable driver behavior, falling back to defaults"
                );
                DriverBehavior::default()
            }
        };
        let ratings = ClientBehavior::default();
        Self {
            driver,
            behavior,
            rating_min: ratings.rating_min,
            rating_max: ratings.rating_max,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Bounds of the rating the served client gives on arrival.
    pub fn with_rating_range(mut self, min: f64, max: f64) -> Self {
        self.rating_min = min;
        self.rating_max = max;
        self
    }

    pub fn driver(&self) -> &Arc<Driver> {
        &self.driver
    }

    pub fn behavior(&self) -> &DriverBehavior {
        &self.behavior
    }

    pub fn tick(&mut self, core: &DispatchCore) -> DriverTick {
        let driver = Arc::clone(&self.driver);
        let step = {
            let mut state = driver.state();
            if state.assignment.is_none() {
                self.patrol(&mut state);
                return DriverTick::Patrolled;
            }
            self.advance(&mut state)
        };
        let Some(step) = step else {
            return DriverTick::Patrolled;
        };
        self.apply(core, step)
    }

    fn patrol(&mut self, state: &mut DriverState) {
        let jitter = self.behavior.patrol_jitter;
        if jitter <= 0.0 {
            return;
        }
        let dx = self.rng.gen_range(-jitter..=jitter);
        let dy = self.rng.gen_range(-jitter..=jitter);
        state.location = state.location.offset(dx, dy);
    }

    /// Move one step along the current leg. A pickup that lands this tick is
    /// followed by a transit step in the same tick.
    fn advance(&self, state: &mut DriverState) -> Option<ServiceStep> {
        let mut location = state.location;
        let assignment = state.assignment.as_mut()?;
        let request = assignment.request;
        let eps = self.behavior.arrival_epsilon;
        let mut step = ServiceStep {
            client_id: request.client_id,
            picked_up: false,
            progress: None,
            arrived: false,
        };

        if assignment.leg == ServiceLeg::Pickup {
            if distance(location, request.origin) > eps {
                state.location = move_toward(location, request.origin, self.behavior.pickup_step);
                step.progress = Some(0.0);
                return Some(step);
            }
            assignment.leg = ServiceLeg::Transit;
            assignment.traveled = 0.0;
            step.picked_up = true;
        }

        if distance(location, request.destination) > eps {
            let next = move_toward(location, request.destination, self.behavior.transit_step);
            assignment.traveled += distance(location, next);
            let total = distance(request.origin, request.destination).max(MIN_SPEED);
            step.progress = Some((assignment.traveled / total).min(1.0));
            location = next;
        } else {
            step.progress = Some(1.0);
            step.arrived = true;
        }
        state.location = location;
        Some(step)
    }

    fn apply(&mut self, core: &DispatchCore, step: ServiceStep) -> DriverTick {
        let client = core.client(step.client_id);
        if step.picked_up {
            if let Some(client) = &client {
                client.set_en_route(true);
            }
            core.mark_in_transit(&self.driver);
        }
        if let Some(progress) = step.progress {
            core.update_progress(&self.driver, progress);
        }
        if step.arrived {
            let rating = client.as_ref().map(|client| {
                client.set_en_route(false);
                client.rate_service(&mut self.rng, self.rating_min, self.rating_max)
            });
            let split = core.finalize(&self.driver, step.client_id, rating);
            return DriverTick::Arrived { split };
        }
        let progress = step.progress.unwrap_or(0.0);
        match (step.picked_up, self.driver.assignment().map(|a| a.leg)) {
            (true, _) => DriverTick::PickedUp { progress },
            (false, Some(ServiceLeg::Transit)) => DriverTick::InTransit { progress },
            _ => DriverTick::Approaching,
        }
    }
}
