use crate::action::ClientAction;
use crate::broadcast::{BroadcastReport, Broadcaster};
use crate::client::{ClientConnection, ClientId, ClientSink};
use crate::client_registry::ClientRegistry;
use crate::errors::ClientError;
use crate::order_store::OrderStore;
use crate::simulation::SimulationController;

use std::sync::Arc;

/// What happened to one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Payload was not a valid action; logged and dropped.
    Malformed,
    /// Valid payload with an action that has no behavior.
    Ignored,
    /// Order ID not found; nothing was broadcast.
    UnknownOrder,
    /// Order was marked done and broadcast.
    Completed(BroadcastReport),
}

/// Keeps a client registered for as long as it lives.
///
/// Dropping it closes the transport and unregisters the client, whichever
/// way the session ends.
struct Registration<'a> {
    registry: &'a ClientRegistry,
    client: Arc<dyn ClientSink>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.client.close();
        self.registry.unregister(self.client.id());
    }
}

/// Per-connection control loop.
///
/// One handler is shared by all connections; [`run`](Self::run) is called
/// on the connection's own thread and blocks until the client goes away.
#[derive(Clone, Debug)]
pub struct SessionHandler {
    store: Arc<OrderStore>,
    registry: Arc<ClientRegistry>,
    broadcaster: Broadcaster,
    simulation: Arc<SimulationController>,
}

impl SessionHandler {
    /// Creates a handler over the shared stores.
    pub fn new(
        store: Arc<OrderStore>,
        registry: Arc<ClientRegistry>,
        broadcaster: Broadcaster,
        simulation: Arc<SimulationController>,
    ) -> Self {
        Self {
            store,
            registry,
            broadcaster,
            simulation,
        }
    }

    /// Serves one connection until it closes.
    ///
    /// 1. Registers the client.
    /// 2. Sends it every active order.
    /// 3. Starts the simulation if it was the first client.
    /// 4. Processes inbound actions until a read fails.
    ///
    /// Returns `Ok(())` when the peer closed the connection.
    pub fn run<C: ClientConnection + 'static>(&self, conn: Arc<C>) -> Result<(), ClientError> {
        let id = conn.id();
        let client: Arc<dyn ClientSink> = conn.clone();
        let count = self.registry.register(client.clone());
        let _registration = Registration {
            registry: self.registry.as_ref(),
            client,
        };
        log::info!("{} connected", id);

        self.replay_active(conn.as_ref())?;

        if count == 1 {
            log::debug!("{} is the first client, triggering simulation", id);
            self.simulation.trigger();
        }

        loop {
            match conn.poll_text() {
                Ok(Some(text)) => {
                    self.handle_message(id, &text);
                }
                Ok(None) => continue,
                Err(ClientError::Closed) => {
                    log::info!("{} closed connection", id);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Read error for {}: {}", id, e);
                    return Err(e);
                }
            }
        }
    }

    /// Sends every active order straight to one client.
    fn replay_active(&self, conn: &dyn ClientSink) -> Result<(), ClientError> {
        let active = self.store.active_orders();
        log::debug!("Replaying {} active orders to {}", active.len(), conn.id());

        for order in &active {
            let payload = match order.to_json() {
                Ok(json) => json,
                Err(e) => {
                    log::error!("Failed to serialize order {}: {}", order.id, e);
                    continue;
                }
            };
            if let Err(e) = conn.send_text(&payload) {
                log::warn!("Failed to sync active orders to {}: {}", conn.id(), e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Applies one inbound text frame.
    pub fn handle_message(&self, from: ClientId, text: &str) -> MessageOutcome {
        let action = match ClientAction::from_json(text) {
            Ok(action) => action,
            Err(e) => {
                log::warn!("Invalid message format from {}: {}", from, e);
                return MessageOutcome::Malformed;
            }
        };

        if !action.is_complete() {
            log::debug!("Ignoring action '{}' from {}", action.action, from);
            return MessageOutcome::Ignored;
        }

        match self.store.mark_done(&action.order_id) {
            Some(order) => {
                log::info!("{} completed order {}", from, order.id);
                MessageOutcome::Completed(self.broadcaster.broadcast(Some(&order)))
            }
            None => {
                log::debug!("{} tried to complete unknown order '{}'", from, action.order_id);
                MessageOutcome::UnknownOrder
            }
        }
    }
}
