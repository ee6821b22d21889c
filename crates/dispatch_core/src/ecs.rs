use std::sync::Arc;

use bevy_ecs::prelude::{Component, Resource};

use crate::actors::{ClientActor, DriverActor};
use crate::config::TickConfig;
use crate::dispatch::DispatchCore;
use crate::time::ManualClock;

#[derive(Debug, Component)]
pub struct DriverAgent(pub DriverActor);

#[derive(Debug, Component)]
pub struct ClientAgent(pub ClientActor);

/// Shared handle to the core the actors act on.
#[derive(Debug, Clone, Resource)]
pub struct DispatchHandle(pub Arc<DispatchCore>);

/// Clock the core stamps trips with, kept equal to the simulation clock.
#[derive(Debug, Clone, Resource)]
pub struct VirtualTime(pub Arc<ManualClock>);

#[derive(Debug, Clone, Copy, Resource)]
pub struct TickSchedule(pub TickConfig);
