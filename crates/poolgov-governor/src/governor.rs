//! The governor: periodic tick scheduling, power-state coordination, and
//! the enable/disable lifecycle.
//!
//! One spawned task owns the loop state and the manager/probe capabilities.
//! Ticks, power events, and shutdown are serialized through a single
//! `tokio::select!`, so no topology mutation can race another. `disable`
//! awaits the task, which gives synchronous, wait-for-completion
//! cancellation of the scheduled tick and the event subscription.

use std::mem;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use poolgov_config::ConfigStore;
use poolgov_pool::{Action, RateProbe, RateSampler, TopologyController, UnitId, UnitManager};

use crate::engine::decide;
use crate::error::GovernorError;

/// Delay before the first tick after enable, decoupling the loop from
/// boot-time load transients.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(20);

/// A coarse power-state transition delivered by an external notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    /// The system is going to sleep: pause ticking, collapse the pool.
    PowerOff,
    /// The system woke up: restore the pool, resume ticking.
    PowerOn,
}

/// Published after every tick and power transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GovernorStatus {
    pub suspended: bool,
    /// Ticks since the last applied action.
    pub cycle: u32,
    pub online_count: u32,
    pub last_action: Option<Action>,
}

/// Handle into a running governor: delivers power events and observes
/// status. Clonable; all clones feed the same loop.
#[derive(Debug, Clone)]
pub struct GovernorHandle {
    events_tx: mpsc::UnboundedSender<PowerEvent>,
    status_rx: watch::Receiver<GovernorStatus>,
}

impl GovernorHandle {
    /// Deliver a power-state transition to the loop.
    ///
    /// Returns `false` once the governor has been disabled.
    pub fn send_power_event(&self, event: PowerEvent) -> bool {
        self.events_tx.send(event).is_ok()
    }

    /// The most recently published status.
    pub fn status(&self) -> GovernorStatus {
        self.status_rx.borrow().clone()
    }

    /// A watch receiver for status updates.
    pub fn status_stream(&self) -> watch::Receiver<GovernorStatus> {
        self.status_rx.clone()
    }
}

/// The scaling governor for one unit pool.
///
/// Owns the capability seams and the config store reference; `enable`
/// moves the loop state into a spawned task, `disable` gets it back.
pub struct Governor<M: UnitManager, P: RateProbe> {
    config: ConfigStore,
    startup_delay: Duration,
    state: State<M, P>,
}

enum State<M: UnitManager, P: RateProbe> {
    Idle(Core<M, P>),
    Running(Running<M, P>),
    /// The loop task panicked; the subsystem is dead.
    Failed,
}

struct Running<M: UnitManager, P: RateProbe> {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Core<M, P>>,
    events_tx: mpsc::UnboundedSender<PowerEvent>,
    status_rx: watch::Receiver<GovernorStatus>,
}

impl<M: UnitManager, P: RateProbe> Governor<M, P> {
    /// Governor with the reference unit fixed at id 0.
    pub fn new(manager: M, probe: P, config: ConfigStore) -> Self {
        Self::with_reference_unit(manager, probe, config, 0)
    }

    /// Governor anchored on an explicit reference unit.
    pub fn with_reference_unit(
        manager: M,
        probe: P,
        config: ConfigStore,
        reference: UnitId,
    ) -> Self {
        let cached_interval_ms = config.get().tick_interval_ms;
        Self {
            config: config.clone(),
            startup_delay: DEFAULT_STARTUP_DELAY,
            state: State::Idle(Core {
                topology: TopologyController::new(manager, reference),
                sampler: RateSampler::new(probe, reference),
                config,
                cycle: 0,
                cached_interval_ms,
                last_action: None,
            }),
        }
    }

    /// Override the delay before the first tick.
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// The config store this governor reads each tick.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// Handle into the running loop, if enabled.
    pub fn handle(&self) -> Option<GovernorHandle> {
        match &self.state {
            State::Running(running) => Some(GovernorHandle {
                events_tx: running.events_tx.clone(),
                status_rx: running.status_rx.clone(),
            }),
            _ => None,
        }
    }

    /// Start the control loop. The first tick fires after the startup
    /// delay; subsequent ticks reschedule from the live `tick_interval_ms`.
    pub fn enable(&mut self) -> Result<GovernorHandle, GovernorError> {
        match mem::replace(&mut self.state, State::Failed) {
            State::Idle(core) => {
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                let (status_tx, status_rx) = watch::channel(core.status(false));

                let startup_delay = self.startup_delay;
                let handle = tokio::spawn(run_loop(
                    core,
                    startup_delay,
                    events_rx,
                    shutdown_rx,
                    status_tx,
                ));

                let governor_handle = GovernorHandle {
                    events_tx: events_tx.clone(),
                    status_rx: status_rx.clone(),
                };
                self.state = State::Running(Running {
                    shutdown_tx,
                    handle,
                    events_tx,
                    status_rx,
                });
                info!(
                    startup_delay_ms = startup_delay.as_millis() as u64,
                    "governor enabled"
                );
                Ok(governor_handle)
            }
            other => {
                self.state = other;
                Err(GovernorError::AlreadyEnabled)
            }
        }
    }

    /// Stop the control loop and wait for it to fully exit.
    ///
    /// Cancels the scheduled tick and any queued power events, then
    /// restores the pool to `max_units` so disabling leaves the topology
    /// in a deterministic state.
    pub async fn disable(&mut self) -> Result<(), GovernorError> {
        match mem::replace(&mut self.state, State::Failed) {
            State::Running(running) => {
                let _ = running.shutdown_tx.send(true);
                drop(running.events_tx);
                match running.handle.await {
                    Ok(core) => {
                        self.state = State::Idle(core);
                        info!("governor disabled");
                        Ok(())
                    }
                    Err(error) => Err(GovernorError::Scheduler(error.to_string())),
                }
            }
            other => {
                self.state = other;
                Err(GovernorError::NotEnabled)
            }
        }
    }
}

/// The loop state: everything one tick needs, owned by the spawned task
/// while enabled and handed back on disable.
struct Core<M: UnitManager, P: RateProbe> {
    topology: TopologyController<M>,
    sampler: RateSampler<P>,
    config: ConfigStore,
    cycle: u32,
    cached_interval_ms: u64,
    last_action: Option<Action>,
}

impl<M: UnitManager, P: RateProbe> Core<M, P> {
    /// One control cycle. Returns the delay until the next tick, read from
    /// the config snapshot taken at the top of this tick.
    fn tick(&mut self) -> Duration {
        let cfg = self.config.get();
        if cfg.tick_interval_ms != self.cached_interval_ms {
            debug!(
                from_ms = self.cached_interval_ms,
                to_ms = cfg.tick_interval_ms,
                "tick interval changed"
            );
            self.cached_interval_ms = cfg.tick_interval_ms;
        }

        let online = self.topology.online_units();
        match self.sampler.sample(&online) {
            Ok(snapshot) => {
                let action = decide(&snapshot, &cfg, self.cycle, online.len() as u32);
                self.last_action = Some(action);
                if action == Action::Hold {
                    self.cycle += 1;
                } else {
                    // The counter resets whether or not the manager call
                    // succeeded; the next tick re-evaluates from fresh
                    // state instead of retrying.
                    if let Err(error) = self.topology.apply(action, &snapshot) {
                        warn!(%error, ?action, "scale action failed");
                    }
                    self.cycle = 0;
                }
            }
            Err(error) => {
                debug!(%error, "sample unavailable, holding");
                self.last_action = Some(Action::Hold);
                self.cycle += 1;
            }
        }

        Duration::from_millis(cfg.tick_interval_ms)
    }

    /// Suspend sweep: collapse to the reference unit only.
    fn suspend(&mut self) -> usize {
        self.cycle = 0;
        self.last_action = None;
        self.topology.force_min()
    }

    /// Resume sweep: refill up to `max_units`, return the new online count
    /// and the tick interval to rearm with.
    fn resume(&mut self) -> (usize, Duration) {
        let cfg = self.config.get();
        self.cycle = 0;
        let online = self.topology.restore_max(cfg.max_units as usize);
        (online, Duration::from_millis(cfg.tick_interval_ms))
    }

    /// Teardown sweep: leave the pool at `max_units` on disable.
    fn teardown(&mut self) -> usize {
        let cfg = self.config.get();
        self.topology.restore_max(cfg.max_units as usize)
    }

    fn status(&self, suspended: bool) -> GovernorStatus {
        GovernorStatus {
            suspended,
            cycle: self.cycle,
            online_count: self.topology.online_count() as u32,
            last_action: self.last_action,
        }
    }
}

/// The single serialized execution context for this subsystem.
async fn run_loop<M: UnitManager, P: RateProbe>(
    mut core: Core<M, P>,
    startup_delay: Duration,
    mut events: mpsc::UnboundedReceiver<PowerEvent>,
    mut shutdown: watch::Receiver<bool>,
    status_tx: watch::Sender<GovernorStatus>,
) -> Core<M, P> {
    let mut suspended = false;
    let mut events_open = true;
    let mut next_tick = Instant::now() + startup_delay;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_tick), if !suspended => {
                let interval = core.tick();
                next_tick = Instant::now() + interval;
                let _ = status_tx.send(core.status(suspended));
            }
            event = events.recv(), if events_open => {
                match event {
                    Some(PowerEvent::PowerOff) if !suspended => {
                        suspended = true;
                        let online = core.suspend();
                        info!(online, "suspended, ticking paused");
                        let _ = status_tx.send(core.status(suspended));
                    }
                    Some(PowerEvent::PowerOn) if suspended => {
                        suspended = false;
                        let (online, interval) = core.resume();
                        next_tick = Instant::now() + interval;
                        info!(online, "resumed, ticking restarted");
                        let _ = status_tx.send(core.status(suspended));
                    }
                    // Already in the target state: idempotent no-op.
                    Some(event) => debug!(?event, suspended, "power event ignored"),
                    None => events_open = false,
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    let online = core.teardown();
    info!(online, "governor stopped, pool restored");
    core
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};

    /// Shared fake pool; manager and probe views clone the same state.
    #[derive(Clone)]
    struct FakePool {
        inner: Arc<Mutex<PoolState>>,
    }

    struct PoolState {
        present: Vec<UnitId>,
        online: BTreeSet<UnitId>,
        rates: HashMap<UnitId, u64>,
        max_rate: Option<u64>,
    }

    impl FakePool {
        fn new(present: u32, online: &[UnitId], max_rate: u64) -> Self {
            Self {
                inner: Arc::new(Mutex::new(PoolState {
                    present: (0..present).collect(),
                    online: online.iter().copied().collect(),
                    rates: HashMap::new(),
                    max_rate: Some(max_rate),
                })),
            }
        }

        fn set_all_rates(&self, rate: u64) {
            let mut state = self.inner.lock().unwrap();
            let present = state.present.clone();
            for unit in present {
                state.rates.insert(unit, rate);
            }
        }

        fn online(&self) -> Vec<UnitId> {
            let state = self.inner.lock().unwrap();
            state.online.iter().copied().collect()
        }
    }

    impl UnitManager for FakePool {
        fn bring_online(&mut self, unit: UnitId) -> anyhow::Result<()> {
            self.inner.lock().unwrap().online.insert(unit);
            Ok(())
        }

        fn take_offline(&mut self, unit: UnitId) -> anyhow::Result<()> {
            self.inner.lock().unwrap().online.remove(&unit);
            Ok(())
        }

        fn is_online(&self, unit: UnitId) -> bool {
            self.inner.lock().unwrap().online.contains(&unit)
        }

        fn present_units(&self) -> Vec<UnitId> {
            self.inner.lock().unwrap().present.clone()
        }
    }

    impl RateProbe for FakePool {
        fn current_rate(&self, unit: UnitId) -> Option<u64> {
            self.inner.lock().unwrap().rates.get(&unit).copied()
        }

        fn max_rate(&self, _unit: UnitId) -> Option<u64> {
            self.inner.lock().unwrap().max_rate
        }
    }

    fn core_for(pool: &FakePool, store: &ConfigStore) -> Core<FakePool, FakePool> {
        Core {
            topology: TopologyController::new(pool.clone(), 0),
            sampler: RateSampler::new(pool.clone(), 0),
            config: store.clone(),
            cycle: 0,
            cached_interval_ms: store.get().tick_interval_ms,
            last_action: None,
        }
    }

    #[test]
    fn cycle_increments_on_hold_and_resets_on_action() {
        let pool = FakePool::new(3, &[0, 1], 1_000_000);
        pool.set_all_rates(950_000);
        let store = ConfigStore::new(3);
        store.set_cycles_to_scale_up(2).unwrap();
        let mut core = core_for(&pool, &store);

        // Saturated, but the gate needs two accumulated cycles.
        core.tick();
        assert_eq!(core.cycle, 1);
        core.tick();
        assert_eq!(core.cycle, 2);

        // Third tick fires the scale-up and resets the counter.
        core.tick();
        assert_eq!(core.cycle, 0);
        assert_eq!(core.last_action, Some(Action::ScaleUp));
        assert_eq!(pool.online(), vec![0, 1, 2]);
    }

    #[test]
    fn failed_sample_holds_and_still_counts() {
        let pool = FakePool::new(2, &[0, 1], 1_000_000);
        // No rates at all: every sample fails.
        let store = ConfigStore::new(2);
        let mut core = core_for(&pool, &store);

        core.tick();
        core.tick();
        assert_eq!(core.cycle, 2);
        assert_eq!(core.last_action, Some(Action::Hold));
        assert_eq!(pool.online(), vec![0, 1]);
    }

    #[test]
    fn tick_returns_live_interval() {
        let pool = FakePool::new(2, &[0], 1_000_000);
        pool.set_all_rates(500_000);
        let store = ConfigStore::new(2);
        let mut core = core_for(&pool, &store);

        assert_eq!(core.tick(), Duration::from_millis(100));
        store.set_tick_interval_ms(250).unwrap();
        assert_eq!(core.tick(), Duration::from_millis(250));
        assert_eq!(core.cached_interval_ms, 250);
    }

    #[test]
    fn suspend_and_resume_sweeps() {
        let pool = FakePool::new(4, &[0, 1, 2, 3], 1_000_000);
        let store = ConfigStore::new(4);
        store.set_max_units(3).unwrap();
        let mut core = core_for(&pool, &store);
        core.cycle = 5;

        assert_eq!(core.suspend(), 1);
        assert_eq!(core.cycle, 0);
        assert_eq!(pool.online(), vec![0]);

        let (online, interval) = core.resume();
        assert_eq!(online, 3);
        assert_eq!(interval, Duration::from_millis(100));
        assert_eq!(pool.online(), vec![0, 1, 2]);
    }

    #[test]
    fn teardown_restores_to_max_units() {
        let pool = FakePool::new(4, &[0], 1_000_000);
        let store = ConfigStore::new(4);
        store.set_max_units(2).unwrap();
        let mut core = core_for(&pool, &store);

        assert_eq!(core.teardown(), 2);
        assert_eq!(pool.online(), vec![0, 1]);
    }

    #[tokio::test]
    async fn enable_twice_is_rejected() {
        let pool = FakePool::new(2, &[0], 1_000_000);
        let store = ConfigStore::new(2);
        let mut governor = Governor::new(pool.clone(), pool, store)
            .with_startup_delay(Duration::from_secs(60));

        governor.enable().unwrap();
        assert!(matches!(
            governor.enable(),
            Err(GovernorError::AlreadyEnabled)
        ));
        governor.disable().await.unwrap();
    }

    #[tokio::test]
    async fn disable_without_enable_is_rejected() {
        let pool = FakePool::new(2, &[0], 1_000_000);
        let store = ConfigStore::new(2);
        let mut governor = Governor::new(pool.clone(), pool, store);

        assert!(matches!(
            governor.disable().await,
            Err(GovernorError::NotEnabled)
        ));
    }

    #[tokio::test]
    async fn enable_disable_round_trips_the_core() {
        let pool = FakePool::new(2, &[0], 1_000_000);
        let store = ConfigStore::new(2);
        let mut governor = Governor::new(pool.clone(), pool, store)
            .with_startup_delay(Duration::from_secs(60));

        governor.enable().unwrap();
        assert!(governor.is_enabled());
        governor.disable().await.unwrap();
        assert!(!governor.is_enabled());

        // The core came back; a second cycle works.
        governor.enable().unwrap();
        governor.disable().await.unwrap();
    }
}
