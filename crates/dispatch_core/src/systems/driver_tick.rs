use bevy_ecs::prelude::{Query, Res, ResMut};

use crate::actors::DriverTick;
use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::ecs::{DispatchHandle, DriverAgent, TickSchedule};
use crate::telemetry::SimTelemetry;

pub fn driver_tick_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    core: Res<DispatchHandle>,
    ticks: Res<TickSchedule>,
    telemetry: Option<ResMut<SimTelemetry>>,
    mut drivers: Query<&mut DriverAgent>,
) {
    if event.0.kind != EventKind::DriverTick {
        return;
    }
    let Some(EventSubject::Driver(driver_entity)) = event.0.subject else {
        return;
    };
    let Ok(mut agent) = drivers.get_mut(driver_entity) else {
        return;
    };

    let outcome = agent.0.tick(&core.0);

    if let Some(mut telemetry) = telemetry {
        telemetry.driver_ticks += 1;
        match outcome {
            DriverTick::PickedUp { .. } => telemetry.pickups += 1,
            DriverTick::Arrived { split: Some(_) } => telemetry.trips_finished += 1,
            _ => {}
        }
    }

    clock.schedule_in(
        ticks.0.driver_tick_ms,
        EventKind::DriverTick,
        Some(EventSubject::Driver(driver_entity)),
    );
}
