use crate::client::ClientSink;
use crate::client_registry::ClientRegistry;
use crate::order::Order;

use rayon::prelude::*;
use std::sync::Arc;

/// Outcome of a single broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients that received the frame.
    pub delivered: usize,
    /// Clients whose delivery failed and that were dropped.
    pub pruned: usize,
}

/// Pushes order updates to every registered client.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    /// Creates a broadcaster over the given registry.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Sends `order` to every client registered at call time.
    ///
    /// The order is serialized once. Delivery runs in parallel over a
    /// registry snapshot, so the registry lock is never held during a send.
    /// A failed delivery closes and unregisters that client without
    /// affecting the others. `None` is a no-op.
    pub fn broadcast(&self, order: Option<&Order>) -> BroadcastReport {
        let Some(order) = order else {
            log::warn!("Broadcast called without an order");
            return BroadcastReport::default();
        };

        let payload = match order.to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize order {}: {}", order.id, e);
                return BroadcastReport::default();
            }
        };

        let clients = self.registry.snapshot();
        log::debug!(
            "Broadcasting order {} ({:?}) to {} clients",
            order.id,
            order.status,
            clients.len()
        );

        let failed: Vec<Arc<dyn ClientSink>> = clients
            .par_iter()
            .filter_map(|client| match client.send_text(&payload) {
                Ok(()) => None,
                Err(e) => {
                    log::warn!("Failed to send order {} to {}: {}", order.id, client.id(), e);
                    Some(client.clone())
                }
            })
            .collect();

        for client in &failed {
            client.close();
            self.registry.unregister(client.id());
        }

        let report = BroadcastReport {
            delivered: clients.len() - failed.len(),
            pruned: failed.len(),
        };
        if report.pruned > 0 {
            log::info!(
                "Broadcast of order {}: {} delivered, {} pruned",
                order.id,
                report.delivered,
                report.pruned
            );
        }
        report
    }
}
