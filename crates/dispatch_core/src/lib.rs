pub mod accounting;
pub mod actors;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod ecs;
pub mod error;
pub mod fleet;
pub mod geometry;
pub mod live;
pub mod matching;
pub mod model;
pub mod persistence;
pub mod pricing;
pub mod quality;
pub mod queue;
pub mod runner;
pub mod scenario;
pub mod systems;
pub mod telemetry;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod time;
pub mod trips;
