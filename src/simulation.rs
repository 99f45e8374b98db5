//! Background generator of order-lifecycle events.
//!
//! The controller is a two-state machine:
//!
//! ```text
//!            trigger() with CAS Idle -> Running
//!   Idle  ------------------------------------->  Running
//!    ^                                              |  every tick:
//!    |        registry empty at a tick              |  new order (p) or
//!    +----------------------------------------------+  complete a random one
//! ```
//!
//! Entering `Running` spawns one thread which emits an initial burst of
//! orders and then ticks until no client is left. The transition is a
//! compare-and-set on an atomic, so racing triggers start at most one loop.

use crate::broadcast::{BroadcastReport, Broadcaster};
use crate::client_registry::ClientRegistry;
use crate::config::SimulationConfig;
use crate::errors::ConfigError;
use crate::order::Order;
use crate::order_store::OrderStore;

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Bernoulli, Distribution};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread;

/// State of the simulation loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SimulationState {
    /// No loop is running.
    Idle = 0,
    /// Exactly one loop is running.
    Running = 1,
}

impl SimulationState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SimulationState::Running,
            _ => SimulationState::Idle,
        }
    }
}

/// What a single steady-state tick does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulationEvent {
    /// Create and broadcast a new order.
    NewOrder,
    /// Complete the given active order and broadcast it.
    Complete(Order),
}

/// Picks the event for one tick.
///
/// Creates a new order with the configured probability, or always when
/// nothing is active; otherwise completes a uniformly chosen active order.
pub fn choose_event<R: Rng + ?Sized>(
    rng: &mut R,
    active: &[Order],
    new_order: &Bernoulli,
) -> SimulationEvent {
    if active.is_empty() || new_order.sample(rng) {
        return SimulationEvent::NewOrder;
    }
    match active.choose(rng) {
        Some(order) => SimulationEvent::Complete(order.clone()),
        None => SimulationEvent::NewOrder,
    }
}

/// Single-flight controller of the simulation loop.
pub struct SimulationController {
    state: AtomicU8,
    runs: AtomicU64,
    store: Arc<OrderStore>,
    registry: Arc<ClientRegistry>,
    broadcaster: Broadcaster,
    config: SimulationConfig,
    new_order: Bernoulli,
}

impl SimulationController {
    /// Creates an idle controller.
    pub fn new(
        store: Arc<OrderStore>,
        registry: Arc<ClientRegistry>,
        broadcaster: Broadcaster,
        config: SimulationConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let new_order = Bernoulli::new(config.new_order_probability)?;

        Ok(Self {
            state: AtomicU8::new(SimulationState::Idle as u8),
            runs: AtomicU64::new(0),
            store,
            registry,
            broadcaster,
            config,
            new_order,
        })
    }

    /// Current state.
    pub fn state(&self) -> SimulationState {
        SimulationState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Number of times the loop entered `Running` since creation.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Starts the loop on a background thread unless one is already running.
    ///
    /// Returns immediately; `true` means this call started the loop.
    pub fn trigger(self: &Arc<Self>) -> bool {
        if !self.try_start() {
            log::debug!("Simulation already running");
            return false;
        }

        let controller = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("simulation".into())
            .spawn(move || controller.run());

        match spawned {
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to spawn simulation thread: {}", e);
                self.set_idle();
                false
            }
        }
    }

    fn try_start(&self) -> bool {
        let started = self
            .state
            .compare_exchange(
                SimulationState::Idle as u8,
                SimulationState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if started {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
        started
    }

    fn set_idle(&self) {
        self.state
            .store(SimulationState::Idle as u8, Ordering::SeqCst);
    }

    fn run(&self) {
        let mut rng = rand::thread_rng();
        loop {
            log::info!("Starting simulation");
            self.initial_burst(&mut rng);

            loop {
                thread::sleep(self.config.tick);
                if self.registry.count() == 0 {
                    break;
                }
                self.tick(&mut rng);
            }

            log::info!("No clients connected. Stopping simulation.");
            if !self.stop_or_resume() {
                return;
            }
            log::info!("Client connected while stopping, restarting simulation");
        }
    }

    /// Goes `Idle`, then takes the loop back if a client is registered.
    ///
    /// A client that registered between the empty check and the state flip
    /// saw `Running` and did not trigger. Returns `true` when the calling
    /// loop owns `Running` again and must emit a fresh burst.
    fn stop_or_resume(&self) -> bool {
        self.set_idle();
        self.registry.count() > 0 && self.try_start()
    }

    fn initial_burst<R: Rng + ?Sized>(&self, rng: &mut R) {
        let count = rng.gen_range(self.config.burst_min..=self.config.burst_max);
        log::debug!("Generating initial burst of {} orders", count);

        for _ in 0..count {
            let order = self.store.create_synthetic();
            self.broadcaster.broadcast(Some(&order));
        }
    }

    /// Runs one steady-state tick and returns the broadcast outcome.
    pub fn tick<R: Rng + ?Sized>(&self, rng: &mut R) -> BroadcastReport {
        let active = self.store.active_orders();

        match choose_event(rng, &active, &self.new_order) {
            SimulationEvent::NewOrder => {
                let order = self.store.create_synthetic();
                log::debug!("Simulated new order {}", order.id);
                self.broadcaster.broadcast(Some(&order))
            }
            SimulationEvent::Complete(order) => {
                // The order may have been evicted since the snapshot.
                let updated = self.store.mark_done(&order.id);
                if updated.is_none() {
                    log::debug!("Order {} vanished before completion, skipping tick", order.id);
                }
                self.broadcaster.broadcast(updated.as_ref())
            }
        }
    }
}

impl std::fmt::Debug for SimulationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationController")
            .field("state", &self.state())
            .field("runs", &self.runs())
            .field("config", &self.config)
            .finish()
    }
}
