use crate::order::{Order, OrderStatus, format_timestamp};

use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicI64, Ordering};

const PIZZAS: &[&str] = &[
    "Margherita",
    "Pepperoni",
    "Hawaiian",
    "Veggie",
    "BBQ Chicken",
    "Meat Lovers",
    "Four Cheese",
];
const FIRST_NAMES: &[&str] = &[
    "Alex", "Jordan", "Taylor", "Sam", "Jamie", "Morgan", "Chris", "Casey",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Lee", "Martinez", "Brown", "Garcia", "Nguyen", "Williams",
];
const STREETS: &[&str] = &[
    "Main St",
    "Maple Ave",
    "Elm St",
    "Pine Rd",
    "Oak Dr",
    "Sunset Blvd",
    "River Rd",
];

/// Fabricates synthetic orders.
///
/// IDs are derived from wall-clock nanoseconds but forced to be strictly
/// increasing, so two orders created within the same clock tick (or across a
/// clock step backwards) never share an ID.
#[derive(Debug, Default)]
pub struct OrderGenerator {
    last_id: AtomicI64,
}

impl OrderGenerator {
    /// Creates a new generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a new order with status `new` and a fresh ID.
    pub fn generate(&self) -> Order {
        let now = Utc::now();
        let mut rng = rand::thread_rng();

        Order {
            id: format!("order_{}", self.next_id(now.timestamp_nanos_opt().unwrap_or_default())),
            pizza: pick(&mut rng, PIZZAS).to_string(),
            customer_name: format!(
                "{} {}",
                pick(&mut rng, FIRST_NAMES),
                pick(&mut rng, LAST_NAMES)
            ),
            address: format!("{} {}", rng.gen_range(1..=9999), pick(&mut rng, STREETS)),
            phone_number: format!(
                "(555) {:03}-{:04}",
                rng.gen_range(100..900),
                rng.gen_range(0..10000)
            ),
            status: OrderStatus::New,
            timestamp: format_timestamp(now),
        }
    }

    fn next_id(&self, candidate: i64) -> i64 {
        let mut last = self.last_id.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(last + 1);
            match self
                .last_id
                .compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

fn pick<'a, R: Rng>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}
