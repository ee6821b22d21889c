#![allow(dead_code)]

use std::sync::Arc;

use bevy_ecs::prelude::{Entity, World};
use dispatch_core::actors::{ClientActor, DriverActor};
use dispatch_core::config::{ClientBehavior, DriverBehavior};
use dispatch_core::ecs::{ClientAgent, DispatchHandle, DriverAgent};
use dispatch_core::geometry::Point;
use dispatch_core::model::{Admission, Client, ClientId, ClientProfile, Driver, DriverId, DriverProfile};

/// Builder for driver fixtures registered with the world's core.
#[derive(Clone, Debug)]
pub struct DriverBuilder {
    id: u32,
    location: Point,
    rating: f64,
    admission: Admission,
    behavior: DriverBehavior,
}

impl DriverBuilder {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            location: Point::new(0.5, 0.5),
            rating: 4.5,
            admission: Admission::admitted(),
            behavior: DriverBehavior::default(),
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.location = Point::new(x, y);
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn rejected(mut self, reason: &str) -> Self {
        self.admission = Admission::rejected(reason);
        self
    }

    /// No patrol drift, so positions stay where the test put them.
    pub fn stationary(mut self) -> Self {
        self.behavior.patrol_jitter = 0.0;
        self
    }

    fn profile(&self) -> DriverProfile {
        DriverProfile::new(DriverId(self.id), self.rating).with_admission(self.admission.clone())
    }

    /// Register with the world's core and spawn the agent entity.
    pub fn spawn(self, world: &mut World) -> (Entity, Arc<Driver>) {
        let core = world.resource::<DispatchHandle>().0.clone();
        let driver = core.register_driver(self.profile(), self.location);
        let actor = DriverActor::new(driver.clone(), self.behavior, u64::from(self.id));
        (world.spawn(DriverAgent(actor)).id(), driver)
    }
}

/// Builder for client fixtures registered with the world's core.
#[derive(Clone, Debug)]
pub struct ClientBuilder {
    id: u32,
    origin: Point,
    destination: Point,
    admission: Admission,
    request_probability: f64,
}

impl ClientBuilder {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            origin: Point::new(0.5, 0.5),
            destination: Point::new(0.5, 0.7),
            admission: Admission::admitted(),
            request_probability: 1.0,
        }
    }

    pub fn from_to(mut self, origin: (f64, f64), destination: (f64, f64)) -> Self {
        self.origin = origin.into();
        self.destination = destination.into();
        self
    }

    pub fn with_request_probability(mut self, probability: f64) -> Self {
        self.request_probability = probability;
        self
    }

    pub fn rejected(mut self, reason: &str) -> Self {
        self.admission = Admission::rejected(reason);
        self
    }

    pub fn profile(&self) -> ClientProfile {
        ClientProfile::new(ClientId(self.id), self.origin, self.destination)
            .with_admission(self.admission.clone())
    }

    /// Register with the world's core and spawn the agent entity.
    pub fn spawn(self, world: &mut World) -> (Entity, Arc<Client>) {
        let core = world.resource::<DispatchHandle>().0.clone();
        let client = core.register_client(self.profile());
        let behavior = ClientBehavior::default().with_request_probability(self.request_probability);
        let actor = ClientActor::new(client.clone(), behavior, u64::from(self.id));
        (world.spawn(ClientAgent(actor)).id(), client)
    }
}
