//! Live runtime: every actor on its own tokio task and interval.
//!
//! Actor ticks are synchronous and take core locks only for their duration, so
//! no lock is ever held across an `.await`. With persistence enabled a tick may
//! write snapshot files, so on a multi-threaded runtime it runs under
//! `block_in_place`. Shutdown is broadcast through a `watch` channel; each task
//! finishes its current tick and exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::task::{self, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::actors::{ClientActor, ClientTick, DriverActor};
use crate::config::TickConfig;
use crate::dispatch::DispatchCore;
use crate::scenario::{build_actors, build_core, generate_population, ScenarioParams};
use crate::time::SystemClock;

pub struct LiveRuntime {
    core: Arc<DispatchCore>,
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl LiveRuntime {
    /// Start one task per actor plus the housekeeping timers. Must be called
    /// from within a tokio runtime.
    pub fn spawn(
        core: Arc<DispatchCore>,
        drivers: Vec<DriverActor>,
        clients: Vec<ClientActor>,
        ticks: TickConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let mut tasks = JoinSet::new();

        let driver_period = Duration::from_millis(ticks.driver_tick_ms.max(1));
        for actor in drivers {
            tasks.spawn(run_driver(actor, core.clone(), driver_period, shutdown.subscribe()));
        }
        let client_period = Duration::from_millis(ticks.client_tick_ms.max(1));
        for actor in clients {
            tasks.spawn(run_client(actor, core.clone(), client_period, shutdown.subscribe()));
        }

        let close_period = Duration::from_millis(ticks.accounting_close_interval_ms.max(1));
        tasks.spawn(run_timer(close_period, shutdown.subscribe(), {
            let core = core.clone();
            move || {
                blocking_tick(&core, || core.close_accounting());
            }
        }));
        if let Some(interval) = ticks.audit_interval_ms {
            let core = core.clone();
            tasks.spawn(run_timer(
                Duration::from_millis(interval.max(1)),
                shutdown.subscribe(),
                move || {
                    blocking_tick(&core, || core.audit_default());
                },
            ));
        }

        tracing::info!(tasks = tasks.len(), "live runtime started");
        Self {
            core,
            shutdown,
            tasks,
        }
    }

    /// Build the scenario on the wall clock and start it.
    pub fn from_scenario(params: &ScenarioParams) -> Self {
        let core = Arc::new(build_core(params, Arc::new(SystemClock)));
        let (drivers, clients) = build_actors(&core, params, generate_population(params));
        Self::spawn(core, drivers, clients, params.config.ticks)
    }

    pub fn core(&self) -> &Arc<DispatchCore> {
        &self.core
    }

    /// Number of tasks still running.
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task to stop and wait for all of them. Returns the core for
    /// final inspection.
    pub async fn shutdown(mut self) -> Arc<DispatchCore> {
        let _ = self.shutdown.send(true);
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(error = %err, "actor task ended abnormally");
            }
        }
        tracing::info!("live runtime stopped");
        self.core
    }
}

/// Run `tick` where it may block on snapshot writes without stalling other
/// tasks on the same worker. `block_in_place` is unavailable on the
/// current-thread runtime, where the tick runs inline.
fn blocking_tick<T>(core: &DispatchCore, tick: impl FnOnce() -> T) -> T {
    let writes_files = core.snapshot_store().config().is_enabled();
    if writes_files && Handle::current().runtime_flavor() == RuntimeFlavor::MultiThread {
        task::block_in_place(tick)
    } else {
        tick()
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_driver(
    mut actor: DriverActor,
    core: Arc<DispatchCore>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                blocking_tick(&core, || actor.tick(&core));
            }
        }
    }
}

async fn run_client(
    mut actor: ClientActor,
    core: Arc<DispatchCore>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = ticker(period);
    // The first tick of an interval completes immediately; clients wait one period.
    interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                if blocking_tick(&core, || actor.tick(&core)) != ClientTick::Waiting {
                    break;
                }
            }
        }
    }
}

async fn run_timer<F>(period: Duration, mut shutdown: watch::Receiver<bool>, mut action: F)
where
    F: FnMut() + Send + 'static,
{
    let mut interval = ticker(period);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => action(),
        }
    }
}
