use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ClientBehavior;
use crate::dispatch::{DispatchCore, SubmitOutcome};
use crate::model::Client;

/// What one client tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientTick {
    /// Not admitted; the client never asks for a ride.
    Ineligible,
    /// The roll failed this tick.
    Waiting,
    /// The standing request was submitted this tick.
    Submitted(SubmitOutcome),
    /// The one request this client makes has already been submitted.
    Done,
}

/// Per-client behavior: roll once per tick to submit the standing request.
#[derive(Debug)]
pub struct ClientActor {
    client: Arc<Client>,
    behavior: ClientBehavior,
    rng: StdRng,
}

impl ClientActor {
    pub fn new(client: Arc<Client>, behavior: ClientBehavior, seed: u64) -> Self {
        Self {
            client,
            behavior,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// A client submits at most once over its lifetime; after that every tick is `Done`.
    pub fn tick(&mut self, core: &DispatchCore) -> ClientTick {
        if !self.client.is_admitted() {
            return ClientTick::Ineligible;
        }
        if self.client.has_submitted() {
            return ClientTick::Done;
        }
        if !self.rng.gen_bool(self.behavior.request_probability.clamp(0.0, 1.0)) {
            return ClientTick::Waiting;
        }
        if !self.client.mark_submitted() {
            return ClientTick::Done;
        }
        let outcome = core.submit(self.client.profile().request());
        if let Some(receipt) = &outcome.assignment {
            tracing::debug!(
                client = %self.client.id(),
                plate = %receipt.plate,
                driver_name = %receipt.driver_name,
                pickup_eta = receipt.pickup_eta,
                "ride confirmed"
            );
        }
        ClientTick::Submitted(outcome)
    }
}
