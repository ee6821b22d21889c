//! Virtual-time runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each step
//! pops the next event from [SimulationClock], moves the core's clock to the
//! event time, inserts it as [CurrentEvent], then runs the schedule.

use bevy_ecs::prelude::{Entity, Res, Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;

use crate::clock::{CurrentEvent, Event, EventKind, EventSubject, SimulationClock};
use crate::ecs::{ClientAgent, DriverAgent, TickSchedule, VirtualTime};
use crate::scenario::SimulationEndTimeMs;
use crate::systems::{
    client_tick::client_tick_system,
    driver_tick::driver_tick_system,
    housekeeping::{audit_sample_system, close_accounting_system},
};

fn is_driver_tick(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::DriverTick)
        .unwrap_or(false)
}

fn is_client_tick(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ClientTick)
        .unwrap_or(false)
}

fn is_close_accounting(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::CloseAccounting)
        .unwrap_or(false)
}

fn is_audit_sample(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::AuditSample)
        .unwrap_or(false)
}

/// Runs one simulation step. Returns `true` if an event was processed, `false` if
/// the clock was empty or the next event is at or past [SimulationEndTimeMs].
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    run_next_event_with_hook(world, schedule, |_, _| {})
}

/// Runs one simulation step and invokes `hook` after the schedule completes.
pub fn run_next_event_with_hook<F>(world: &mut World, schedule: &mut Schedule, mut hook: F) -> bool
where
    F: FnMut(&World, &Event),
{
    let stop_at = world.get_resource::<SimulationEndTimeMs>().map(|e| e.0);
    let next_ts = world
        .get_resource::<SimulationClock>()
        .and_then(|c| c.next_event_time());
    if let (Some(end_ms), Some(ts)) = (stop_at, next_ts) {
        if ts >= end_ms {
            return false;
        }
    }

    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    if let Some(time) = world.get_resource::<VirtualTime>() {
        time.0.set(event.timestamp);
    }
    world.insert_resource(CurrentEvent(event));

    schedule.run(world);
    hook(world, &event);
    true
}

/// Runs simulation steps until the event queue is empty or `max_steps` is reached.
/// Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}

/// Runs every event strictly before `end_ms`. Returns the number of steps executed.
pub fn run_until(world: &mut World, schedule: &mut Schedule, end_ms: u64) -> usize {
    let mut steps = 0;
    loop {
        let next = world
            .get_resource::<SimulationClock>()
            .and_then(|c| c.next_event_time());
        match next {
            Some(ts) if ts < end_ms => {}
            _ => break,
        }
        if !run_next_event(world, schedule) {
            break;
        }
        steps += 1;
    }
    steps
}

/// Builds the default schedule: one system per event kind, each gated on the current event.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((
        driver_tick_system.run_if(is_driver_tick),
        client_tick_system.run_if(is_client_tick),
        close_accounting_system.run_if(is_close_accounting),
        audit_sample_system.run_if(is_audit_sample),
    ));
    schedule
}

/// Schedules the first tick of every actor plus the housekeeping timers.
/// Call this after building the scenario and before running events.
pub fn initialize_simulation(world: &mut World) {
    let ticks = world
        .get_resource::<TickSchedule>()
        .map(|t| t.0)
        .unwrap_or_default();
    let drivers: Vec<Entity> = world
        .query_filtered::<Entity, bevy_ecs::prelude::With<DriverAgent>>()
        .iter(world)
        .collect();
    let clients: Vec<Entity> = world
        .query_filtered::<Entity, bevy_ecs::prelude::With<ClientAgent>>()
        .iter(world)
        .collect();

    let mut clock = world.resource_mut::<SimulationClock>();
    for entity in drivers {
        clock.schedule_at(0, EventKind::DriverTick, Some(EventSubject::Driver(entity)));
    }
    for entity in clients {
        clock.schedule_at(
            ticks.client_tick_ms,
            EventKind::ClientTick,
            Some(EventSubject::Client(entity)),
        );
    }
    clock.schedule_at(ticks.accounting_close_interval_ms, EventKind::CloseAccounting, None);
    if let Some(interval) = ticks.audit_interval_ms {
        clock.schedule_at(interval, EventKind::AuditSample, None);
    }
}
