//! Scheduler-agnostic actors. Each `tick` is one unit of work; the virtual-time
//! runner and the live runtime only decide when ticks happen.

pub mod client;
pub mod driver;

pub use client::{ClientActor, ClientTick};
pub use driver::{DriverActor, DriverTick};
