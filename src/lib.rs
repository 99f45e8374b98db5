//! # Order Status Streaming Server
//!
//! This crate implements a real-time order-status fan-out server. Viewers
//! connect over **WebSocket** and receive every order lifecycle event
//! (created, completed) as it happens. While anyone is listening, a
//! background simulation fabricates orders and completes them.
//!
//! ## Features
//!
//! - Replay of all active orders to every newly connected client.
//! - Broadcast of each order update to all connected clients, serialized once.
//! - Clients whose delivery fails are closed and dropped, without
//!   affecting the others.
//! - Single-flight simulation loop: starts with the first client, stops when
//!   the last one leaves.
//! - Periodic sweep of old completed orders.
//! - Thread-per-connection architecture using `Arc`, mutexes and atomics.
//!
//! ## Architecture Overview
//!
//! - [`order`](crate::order) — Order data model and its JSON form.
//! - [`action`](crate::action) — Client-to-server action messages.
//! - [`order_generator`](crate::order_generator) — Synthetic order content and IDs.
//! - [`order_store`](crate::order_store) — Authoritative order map with lifecycle and sweep.
//! - [`client`](crate::client) — Client connection traits and the WebSocket client.
//! - [`client_registry`](crate::client_registry) — Set of connected clients.
//! - [`broadcast`](crate::broadcast) — Fan-out of one order to all clients.
//! - [`simulation`](crate::simulation) — Background order-event generator.
//! - [`session`](crate::session) — Per-connection control loop.
//! - [`order_server`](crate::order_server) — Wires everything together and runs the sweeper.
//! - [`ws_server`](crate::ws_server) — WebSocket accept loop.
//! - [`config`](crate::config) and [`defs`](crate::defs) — Configuration and defaults.
//! - [`errors`](crate::errors) — Error types used across modules.
//!
//! ## Protocol
//!
//! Server to client, one order per text frame:
//!
//! ```text
//! {"id":"order_1700000000000000000","pizza":"Hawaiian","customerName":"Alex Smith",
//!  "address":"42 Elm St","phoneNumber":"(555) 321-0042","status":"new",
//!  "timestamp":"2024-01-01T12:00:00Z"}
//! ```
//!
//! Client to server:
//!
//! ```text
//! {"action":"complete","orderId":"order_1700000000000000000"}
//! ```
//!
//! Only `complete` has behavior. Unknown actions, unknown order IDs and
//! malformed payloads get no response and the connection stays open.
//!
//! ## Example: Running the Server
//!
//! ```no_run
//! use std::sync::Arc;
//! use order_stream::config::ServerConfig;
//! use order_stream::order_server::OrderServer;
//! use order_stream::ws_server::WsServer;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let listen_addr = config.listen_addr.clone();
//!
//!     let server = Arc::new(OrderServer::new(config)?);
//!     // Start the periodic order sweep
//!     server.start()?;
//!
//!     let ws = WsServer::new(&listen_addr, server.clone())?;
//!     ws.start()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unreachable_pub)]

pub mod action;
pub mod broadcast;
pub mod client;
pub mod client_registry;
pub mod config;
pub mod defs;
pub mod errors;
pub mod order;
pub mod order_generator;
pub mod order_server;
pub mod order_store;
pub mod session;
pub mod simulation;
pub mod ws_server;

#[cfg(test)]
mod test_support;
