//! Read-only counters and report payloads for dashboards and reporting.

use std::collections::BTreeMap;

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::accounting::AccountingSnapshot;
use crate::model::{ClientId, DriverId};
use crate::quality::QualityRecord;

/// Point-in-time counts. Each field is read under its own lock, so the set is
/// not a consistent cut across collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchCounts {
    pub queue_length: usize,
    pub active_trips: usize,
    pub finished_trips: usize,
    pub audited_trips: usize,
    pub available_drivers: usize,
    pub registered_drivers: usize,
    pub registered_clients: usize,
}

/// Everything the reporting side reads: per-entity quality, the accounting
/// books and how many trips have finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSnapshot {
    pub quality_by_driver: BTreeMap<DriverId, QualityRecord>,
    pub quality_by_client: BTreeMap<ClientId, QualityRecord>,
    pub accounting: AccountingSnapshot,
    pub finished_trips: usize,
}

impl ReportSnapshot {
    /// Sum of every driver's payout total.
    pub fn total_payouts(&self) -> f64 {
        self.accounting.per_driver_total.values().sum()
    }
}

/// Counts captured by the virtual-time runner while it steps the world.
#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub driver_ticks: u64,
    pub client_ticks: u64,
    pub requests_submitted: u64,
    pub pickups: u64,
    pub trips_finished: u64,
    pub accounting_closures: u64,
    pub audits: u64,
    /// Counts sampled after each accounting closure, oldest first.
    pub samples: Vec<(u64, DispatchCounts)>,
}

impl SimTelemetry {
    pub fn last_sample(&self) -> Option<&(u64, DispatchCounts)> {
        self.samples.last()
    }
}
