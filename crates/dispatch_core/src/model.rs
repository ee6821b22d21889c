//! Entities shared by the registries and the actors: identifiers, requests,
//! drivers and clients.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

macro_rules! typed_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_id! {
    /// Identifier of a client (rider).
    ClientId
}

typed_id! {
    /// Identifier of a driver.
    DriverId
}

typed_id! {
    /// Position of a trip in the trip ledger. Stable because trips are never deleted.
    TripId
}

/// Admission decision handed over by onboarding; read once when the entity is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub admitted: bool,
    pub reason: String,
}

impl Admission {
    pub fn admitted() -> Self {
        Self {
            admitted: true,
            reason: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            admitted: false,
            reason: reason.into(),
        }
    }
}

impl Default for Admission {
    fn default() -> Self {
        Self::admitted()
    }
}

/// A pending ride request. Consumed exactly once by a successful match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    pub client_id: ClientId,
    pub origin: Point,
    pub destination: Point,
}

/// Which leg of a service a driver (and its trip) is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceLeg {
    /// Driving to the client's origin. Trip progress stays at 0.
    #[default]
    Pickup,
    /// Carrying the client to the destination.
    Transit,
}

/// Static driver attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverProfile {
    pub id: DriverId,
    pub plate: String,
    pub driver_name: String,
    pub rating: f64,
    pub admission: Admission,
}

impl DriverProfile {
    /// Profile with the default plate (`UNI-007`) and name (`Driver-7`) for `id`.
    pub fn new(id: DriverId, rating: f64) -> Self {
        Self {
            id,
            plate: format!("UNI-{:03}", id.0),
            driver_name: format!("Driver-{}", id.0),
            rating,
            admission: Admission::admitted(),
        }
    }

    pub fn with_plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = plate.into();
        self
    }

    pub fn with_driver_name(mut self, name: impl Into<String>) -> Self {
        self.driver_name = name.into();
        self
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }
}

/// The service a driver is currently carrying out.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub trip_id: TripId,
    pub request: RideRequest,
    pub leg: ServiceLeg,
    /// Distance covered on the transit leg so far.
    pub traveled: f64,
}

impl Assignment {
    pub fn new(trip_id: TripId, request: RideRequest) -> Self {
        Self {
            trip_id,
            request,
            leg: ServiceLeg::Pickup,
            traveled: 0.0,
        }
    }
}

/// Mutable driver state. `occupied` is set and cleared only while the fleet
/// registry lock is held, so it always agrees with registry membership.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverState {
    pub location: Point,
    pub occupied: bool,
    pub assignment: Option<Assignment>,
}

/// A driver shared between its actor, the fleet registry and the dispatcher.
#[derive(Debug)]
pub struct Driver {
    profile: DriverProfile,
    state: Mutex<DriverState>,
}

impl Driver {
    pub fn new(profile: DriverProfile, location: Point) -> Self {
        Self {
            profile,
            state: Mutex::new(DriverState {
                location: location.clamped(),
                occupied: false,
                assignment: None,
            }),
        }
    }

    pub fn id(&self) -> DriverId {
        self.profile.id
    }

    pub fn profile(&self) -> &DriverProfile {
        &self.profile
    }

    pub fn rating(&self) -> f64 {
        self.profile.rating
    }

    pub fn is_admitted(&self) -> bool {
        self.profile.admission.admitted
    }

    pub fn location(&self) -> Point {
        self.state.lock().location
    }

    pub fn is_occupied(&self) -> bool {
        self.state.lock().occupied
    }

    pub fn assignment(&self) -> Option<Assignment> {
        self.state.lock().assignment.clone()
    }

    /// Point-in-time copy of the mutable state.
    pub fn snapshot(&self) -> DriverState {
        self.state.lock().clone()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock()
    }
}

/// Static client attributes, including the one standing request the client will make.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientProfile {
    pub id: ClientId,
    pub name: String,
    pub origin: Point,
    pub destination: Point,
    pub admission: Admission,
}

impl ClientProfile {
    pub fn new(id: ClientId, origin: Point, destination: Point) -> Self {
        Self {
            id,
            name: format!("Client-{}", id.0),
            origin: origin.clamped(),
            destination: destination.clamped(),
            admission: Admission::admitted(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }

    pub fn request(&self) -> RideRequest {
        RideRequest {
            client_id: self.id,
            origin: self.origin,
            destination: self.destination,
        }
    }
}

/// A client shared between its actor and the driver that carries it.
#[derive(Debug)]
pub struct Client {
    profile: ClientProfile,
    request_submitted: AtomicBool,
    en_route: AtomicBool,
}

impl Client {
    pub fn new(profile: ClientProfile) -> Self {
        Self {
            profile,
            request_submitted: AtomicBool::new(false),
            en_route: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ClientId {
        self.profile.id
    }

    pub fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    pub fn is_admitted(&self) -> bool {
        self.profile.admission.admitted
    }

    pub fn has_submitted(&self) -> bool {
        self.request_submitted.load(Ordering::Acquire)
    }

    /// Flip the one-shot flag. Returns `false` if the client had already submitted.
    pub(crate) fn mark_submitted(&self) -> bool {
        !self.request_submitted.swap(true, Ordering::AcqRel)
    }

    pub fn is_en_route(&self) -> bool {
        self.en_route.load(Ordering::Acquire)
    }

    pub(crate) fn set_en_route(&self, en_route: bool) {
        self.en_route.store(en_route, Ordering::Release);
    }

    /// Rating for a finished service: uniform in `[min, max]`, one decimal.
    pub fn rate_service<R: Rng + ?Sized>(&self, rng: &mut R, min: f64, max: f64) -> f64 {
        let value = if max > min { rng.gen_range(min..=max) } else { min };
        ((value * 10.0).round() / 10.0).clamp(min, max.max(min))
    }
}
