use crate::broadcast::Broadcaster;
use crate::client_registry::ClientRegistry;
use crate::config::ServerConfig;
use crate::errors::OrderServerError;
use crate::order_store::OrderStore;
use crate::session::SessionHandler;
use crate::simulation::SimulationController;

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

/// OrderServer owns the order store, the client registry and the
/// simulation controller, and runs the periodic order sweep.
#[derive(Debug)]
pub struct OrderServer {
    config: ServerConfig,
    store: Arc<OrderStore>,
    registry: Arc<ClientRegistry>,
    simulation: Arc<SimulationController>,
    sessions: SessionHandler,

    /// Sweeper thread
    sweeper: Mutex<Option<JoinHandle<()>>>,
    /// Dropping or signalling this stops the sweeper
    shutdown_tx: Mutex<Option<Sender<()>>>,
}

impl OrderServer {
    /// Builds the server from a validated configuration.
    pub fn new(config: ServerConfig) -> Result<Self, OrderServerError> {
        config.validate()?;

        let store = Arc::new(OrderStore::new());
        let registry = Arc::new(ClientRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let simulation = Arc::new(SimulationController::new(
            store.clone(),
            registry.clone(),
            broadcaster.clone(),
            config.simulation.clone(),
        )?);
        let sessions = SessionHandler::new(
            store.clone(),
            registry.clone(),
            broadcaster,
            simulation.clone(),
        );

        log::info!(
            "OrderServer initialized (sweep every {:?}, retention {:?}, tick {:?})",
            config.sweep_period,
            config.order_retention,
            config.simulation.tick
        );

        Ok(Self {
            config,
            store,
            registry,
            simulation,
            sessions,
            sweeper: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
        })
    }

    /// Starts the sweeper thread that evicts old completed orders.
    pub fn start(&self) -> Result<(), OrderServerError> {
        let mut guard = self.sweeper.lock();

        if guard.is_some() {
            log::warn!("OrderServer sweeper already running");
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<()>();
        let store = self.store.clone();
        let period = self.config.sweep_period;
        let retention = self.config.order_retention;

        log::info!("Starting order sweeper with period {:?}", period);

        let handle = thread::Builder::new()
            .name("order-sweeper".into())
            .spawn(move || {
                log::info!("Order sweeper started");
                loop {
                    match rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            store.sweep(retention, Utc::now());
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("Order sweeper stopped");
            })
            .map_err(|e| OrderServerError::InitializationError(e.to_string()))?;

        *guard = Some(handle);
        *self.shutdown_tx.lock() = Some(tx);
        Ok(())
    }

    /// Stops and joins the sweeper thread.
    pub fn shutdown(&self) {
        log::info!("Initiating OrderServer shutdown");
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.sweeper.lock().take() {
            log::debug!("Waiting for order sweeper to finish");
            handle.join().ok();
            log::info!("Order sweeper joined successfully");
        } else {
            log::debug!("No sweeper thread to shut down");
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared order store.
    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    /// Shared client registry.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Simulation controller.
    pub fn simulation(&self) -> &Arc<SimulationController> {
        &self.simulation
    }

    /// Session handler to run connections with.
    pub fn sessions(&self) -> &SessionHandler {
        &self.sessions
    }
}

impl Drop for OrderServer {
    fn drop(&mut self) {
        log::debug!("OrderServer drop called, initiating shutdown");
        self.shutdown();
    }
}
