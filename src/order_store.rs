use crate::order::Order;
use crate::order_generator::OrderGenerator;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Authoritative in-memory store of all orders.
///
/// A single mutex guards the map. Every operation copies what it needs out
/// of the map before returning, so callers never hold the lock while doing
/// network I/O.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: Mutex<HashMap<String, Order>>,
    generator: OrderGenerator,
}

impl OrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fabricates a new `new` order, stores it and returns a copy.
    pub fn create_synthetic(&self) -> Order {
        let order = self.generator.generate();
        self.orders.lock().insert(order.id.clone(), order.clone());
        log::debug!("Created order {} ({})", order.id, order.pizza);
        order
    }

    /// Places a hand-built order in the store, bypassing the generator.
    #[cfg(test)]
    pub(crate) fn seed(&self, order: Order) {
        self.orders.lock().insert(order.id.clone(), order);
    }

    /// Returns a copy of the order, if present.
    pub fn get(&self, id: &str) -> Option<Order> {
        self.orders.lock().get(id).cloned()
    }

    /// Marks an order as done and returns the updated copy.
    ///
    /// Completing an already-done order succeeds and returns it unchanged.
    /// Returns `None` when the ID is unknown.
    pub fn mark_done(&self, id: &str) -> Option<Order> {
        let mut orders = self.orders.lock();
        let order = orders.get_mut(id)?;
        Some(order.mark_done().clone())
    }

    /// Returns copies of all orders that are not done, in no particular order.
    pub fn active_orders(&self) -> Vec<Order> {
        self.orders
            .lock()
            .values()
            .filter(|o| o.is_active())
            .cloned()
            .collect()
    }

    /// Removes every `done` order created more than `cutoff` before `now`.
    ///
    /// Orders with unparseable timestamps are never evicted. Returns the
    /// number of removed orders.
    pub fn sweep(&self, cutoff: Duration, now: DateTime<Utc>) -> usize {
        let mut orders = self.orders.lock();
        let before = orders.len();

        orders.retain(|id, order| {
            if order.is_active() {
                return true;
            }
            let Some(created) = order.created_at() else {
                log::warn!(
                    "Order {} has malformed timestamp '{}', skipping eviction",
                    id,
                    order.timestamp
                );
                return true;
            };
            // Negative ages (timestamps in the future) are not eligible.
            match (now - created).to_std() {
                Ok(age) => age <= cutoff,
                Err(_) => true,
            }
        });

        let removed = before - orders.len();
        if removed > 0 {
            log::info!("Swept {} old orders, {} remaining", removed, orders.len());
        }
        removed
    }

    /// Number of stored orders, done ones included.
    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    /// Returns `true` if the store holds no orders.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
