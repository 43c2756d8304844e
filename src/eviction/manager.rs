//! Eviction Manager
//!
//! Owns the background eviction thread.
//!
//! ## State Machine
//! ```text
//!            start()                      stop()
//!   Stopped ─────────▶ Running(worker) ─────────▶ Stopped
//!      ▲  start() while Running: no-op               │
//!      └──── stop() while Stopped: no-op ◀───────────┘
//! ```
//!
//! `stop()` drops the worker's stop channel and joins the thread. The loop
//! notices at the next tick boundary; a sweep already in progress runs to
//! completion first.

use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::EvictionConfig;
use crate::error::Result;

use super::sweep::{EvictionReport, Sweeper};

/// Parameters of a running eviction loop
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionPolicy {
    /// Usage fraction above which a cycle evicts
    pub disk_usage_threshold: f64,

    /// Time between cycles
    pub check_interval: Duration,

    /// Max evictions per cycle
    pub batch_size: usize,
}

impl From<&EvictionConfig> for EvictionPolicy {
    fn from(config: &EvictionConfig) -> Self {
        Self {
            disk_usage_threshold: config.disk_usage_threshold,
            // A zero interval would spin
            check_interval: Duration::from_secs(config.check_interval.max(1)),
            batch_size: config.batch_size,
        }
    }
}

/// Handle to a running loop
struct Worker {
    /// Dropping this sender tells the loop to exit
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
    policy: EvictionPolicy,
}

enum State {
    Stopped,
    Running(Worker),
}

/// Starts, stops and restarts the background eviction loop
///
/// ## Concurrency:
/// - `state` serializes start/stop transitions only; it is never held by
///   the loop itself, so sweeps run without any manager-wide lock
pub struct EvictionManager {
    sweeper: Arc<Sweeper>,
    state: Mutex<State>,
}

impl EvictionManager {
    pub fn new(sweeper: Arc<Sweeper>) -> Self {
        Self {
            sweeper,
            state: Mutex::new(State::Stopped),
        }
    }

    /// Start the loop; a no-op if it is already running
    pub fn start(&self, policy: EvictionPolicy) -> Result<()> {
        let mut state = self.state.lock();
        self.start_locked(&mut state, policy)
    }

    /// Stop the loop and wait for its thread; a no-op if it is stopped
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::stop_locked(&mut state);
        Ok(())
    }

    /// Stop any running loop, then start one with `policy`
    ///
    /// The old thread is joined before the new one is spawned, so two
    /// loops never overlap.
    pub fn restart(&self, policy: EvictionPolicy) -> Result<()> {
        let mut state = self.state.lock();
        Self::stop_locked(&mut state);
        self.start_locked(&mut state, policy)
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running(_))
    }

    /// Policy of the running loop, if any
    pub fn policy(&self) -> Option<EvictionPolicy> {
        match &*self.state.lock() {
            State::Running(worker) => Some(worker.policy.clone()),
            State::Stopped => None,
        }
    }

    /// Run one cycle on the calling thread
    pub fn run_cycle(&self, policy: &EvictionPolicy) -> Result<EvictionReport> {
        self.sweeper.check_and_evict(policy)
    }

    /// Evict up to `batch_size` keys now, regardless of disk usage
    pub fn evict_now(&self, batch_size: usize) -> Result<EvictionReport> {
        self.sweeper.evict(batch_size)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn start_locked(&self, state: &mut State, policy: EvictionPolicy) -> Result<()> {
        if let State::Running(_) = state {
            return Ok(());
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let sweeper = Arc::clone(&self.sweeper);
        let loop_policy = policy.clone();

        let handle = thread::Builder::new()
            .name("tierkv-eviction".to_string())
            .spawn(move || run_loop(sweeper, loop_policy, stop_rx))?;

        tracing::info!(
            interval_secs = policy.check_interval.as_secs_f64(),
            threshold = policy.disk_usage_threshold,
            batch_size = policy.batch_size,
            "eviction manager started"
        );

        *state = State::Running(Worker {
            stop_tx,
            handle,
            policy,
        });
        Ok(())
    }

    fn stop_locked(state: &mut State) {
        let State::Running(worker) = mem::replace(state, State::Stopped) else {
            return;
        };

        drop(worker.stop_tx);
        if worker.handle.join().is_err() {
            tracing::error!("eviction thread panicked");
        }

        tracing::info!("eviction manager stopped");
    }
}

impl Drop for EvictionManager {
    fn drop(&mut self) {
        Self::stop_locked(self.state.get_mut());
    }
}

/// Body of the eviction thread
fn run_loop(sweeper: Arc<Sweeper>, policy: EvictionPolicy, stop_rx: Receiver<()>) {
    let ticker = channel::tick(policy.check_interval);

    loop {
        crossbeam::select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                if let Err(e) = sweeper.check_and_evict(&policy) {
                    tracing::error!(error = %e, "eviction cycle failed");
                }
            }
        }
    }

    tracing::debug!("eviction loop exited");
}
