//! Timer-driven operator actions: accounting closure and audit sampling.

use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::ecs::{DispatchHandle, TickSchedule};
use crate::telemetry::SimTelemetry;

pub fn close_accounting_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    core: Res<DispatchHandle>,
    ticks: Res<TickSchedule>,
    telemetry: Option<ResMut<SimTelemetry>>,
) {
    if event.0.kind != EventKind::CloseAccounting {
        return;
    }

    core.0.close_accounting();
    if let Some(mut telemetry) = telemetry {
        telemetry.accounting_closures += 1;
        let sample = (clock.now(), core.0.counts());
        telemetry.samples.push(sample);
    }

    clock.schedule_in(
        ticks.0.accounting_close_interval_ms,
        EventKind::CloseAccounting,
        None,
    );
}

pub fn audit_sample_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    core: Res<DispatchHandle>,
    ticks: Res<TickSchedule>,
    telemetry: Option<ResMut<SimTelemetry>>,
) {
    if event.0.kind != EventKind::AuditSample {
        return;
    }

    core.0.audit_default();
    if let Some(mut telemetry) = telemetry {
        telemetry.audits += 1;
    }

    if let Some(interval) = ticks.0.audit_interval_ms {
        clock.schedule_in(interval, EventKind::AuditSample, None);
    }
}
