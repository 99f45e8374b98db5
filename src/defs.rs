/// Default TCP address the WebSocket server listens on.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Simulation tick period in seconds.
///
/// Every tick the simulation loop re-checks the number of connected clients
/// and, if anyone is still listening, emits exactly one order event.
pub const SIMULATION_TICK_SEC: u64 = 20;

/// Probability that a simulation tick creates a new order instead of
/// completing an existing one.
///
/// A tick always creates a new order when there are no active orders.
pub const NEW_ORDER_PROBABILITY: f64 = 0.6;

/// Smallest number of orders generated when the simulation starts.
pub const INITIAL_BURST_MIN: usize = 3;

/// Largest number of orders generated when the simulation starts.
pub const INITIAL_BURST_MAX: usize = 5;

/// Period of the background sweep that evicts old completed orders.
pub const SWEEP_PERIOD_SEC: u64 = 60;

/// Age after which a `done` order becomes eligible for eviction.
///
/// The age is measured from the order's creation timestamp.
pub const ORDER_RETENTION_SEC: u64 = 300;

/// Maximum time (in milliseconds) a single WebSocket write may block.
///
/// A write that does not finish within this deadline is treated as a
/// delivery failure and the client is dropped.
pub const CLIENT_WRITE_TIMEOUT_MSEC: u64 = 5000;

/// Read timeout (in milliseconds) used by the session read loop.
///
/// The connection lock is released between polls so that broadcasts can
/// write to the socket. Lower values reduce broadcast latency at the cost of
/// more wakeups.
pub const CLIENT_READ_POLL_MSEC: u64 = 100;
