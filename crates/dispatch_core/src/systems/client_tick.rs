use bevy_ecs::prelude::{Query, Res, ResMut};

use crate::actors::ClientTick;
use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{ClientAgent, DispatchHandle, TickSchedule};
use crate::telemetry::SimTelemetry;

/// Ticks one client. Clients that have submitted (or may never submit) drop out
/// of the schedule.
pub fn client_tick_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    core: Res<DispatchHandle>,
    ticks: Res<TickSchedule>,
    telemetry: Option<ResMut<SimTelemetry>>,
    mut clients: Query<&mut ClientAgent>,
) {
    if event.0.kind != EventKind::ClientTick {
        return;
    }
    let Some(EventSubject::Client(client_entity)) = event.0.subject else {
        return;
    };
    let Ok(mut agent) = clients.get_mut(client_entity) else {
        return;
    };

    let outcome = agent.0.tick(&core.0);

    if let Some(mut telemetry) = telemetry {
        telemetry.client_ticks += 1;
        if matches!(outcome, ClientTick::Submitted(_)) {
            telemetry.requests_submitted += 1;
        }
    }

    if outcome == ClientTick::Waiting {
        clock.schedule_in(
            ticks.0.client_tick_ms,
            EventKind::ClientTick,
            Some(EventSubject::Client(client_entity)),
        );
    }
}
