use crate::client::WsClient;
use crate::errors::WsServerError;
use crate::order_server::OrderServer;

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// WebSocket server: accepts TCP connections, upgrades them and runs one
/// session per connection on its own thread.
///
/// Clients receive every order as a JSON text frame and may send
/// `{"action":"complete","orderId":"..."}` to complete an order.
pub struct WsServer {
    /// TCP listener socket
    listener: TcpListener,

    /// Thread-safe reference to `OrderServer`
    order_server: Arc<OrderServer>,
}

impl WsServer {
    /// Creates a new server bound to the given address.
    ///
    /// # Arguments
    /// * `addr` - Address to bind, e.g., `"0.0.0.0:8080"`. Port `0` picks a
    ///   free port.
    /// * `order_server` - `Arc` reference to an `OrderServer` instance.
    ///
    /// # Returns
    /// * `Err(WsServerError::BindError)` if the port is unavailable.
    pub fn new(addr: &str, order_server: Arc<OrderServer>) -> Result<Self, WsServerError> {
        log::info!("Binding WebSocket server to address: {}", addr);
        let listener =
            TcpListener::bind(addr).map_err(|e| WsServerError::BindError(e.to_string()))?;
        log::info!("WebSocket server successfully bound to: {}", addr);

        Ok(Self {
            listener,
            order_server,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, WsServerError> {
        self.listener
            .local_addr()
            .map_err(|e| WsServerError::BindError(e.to_string()))
    }

    /// Runs the accept loop forever.
    ///
    /// Accept errors are logged and the loop keeps going; a failing
    /// connection never stops the server.
    pub fn start(&self) -> Result<(), WsServerError> {
        log::info!("WebSocket server starting main loop");
        for incoming in self.listener.incoming() {
            match incoming {
                Ok(stream) => self.spawn_connection(stream),
                Err(e) => {
                    log::error!("{}", WsServerError::AcceptError(e.to_string()));
                }
            }
        }
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream) {
        let server = self.order_server.clone();
        let addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        log::info!("New TCP connection from: {}", addr);

        let spawned = thread::Builder::new()
            .name(format!("session-{}", addr))
            .spawn(move || handle_connection(stream, &addr, &server));
        if let Err(e) = spawned {
            log::error!("Failed to spawn session thread: {}", e);
        }
    }
}

/// Upgrades one TCP connection and serves it until it closes.
fn handle_connection(stream: TcpStream, addr: &str, server: &OrderServer) {
    let config = server.config();
    let id = server.registry().next_id();

    let client = match WsClient::accept(id, stream, config.write_timeout, config.read_poll) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::warn!("WebSocket upgrade error for {}: {}", addr, e);
            return;
        }
    };

    let peer = client
        .peer()
        .map_or_else(|| addr.to_owned(), |p| p.to_string());
    log::info!("Client connected: {} as {}", peer, id);
    match server.sessions().run(client) {
        Ok(()) => log::info!("Session {} ({}) ended", id, addr),
        Err(e) => log::warn!("Session {} ({}) ended with error: {}", id, addr, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConnection, ClientId, ClientSink};
    use crate::config::ServerConfig;
    use crate::order::{Order, OrderStatus};
    use crate::simulation::SimulationState;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    const POLL: Duration = Duration::from_millis(20);
    const WRITE: Duration = Duration::from_secs(2);

    /// Starts a server on a free loopback port with the given tick.
    fn start_server(tick: Duration) -> (Arc<OrderServer>, String) {
        let mut config = ServerConfig::default();
        config.read_poll = POLL;
        config.simulation.tick = tick;
        let order_server = Arc::new(OrderServer::new(config).unwrap());

        let server = WsServer::new("127.0.0.1:0", order_server.clone()).unwrap();
        let url = format!("ws://{}/ws", server.local_addr().unwrap());
        thread::spawn(move || {
            server.start().unwrap();
        });
        (order_server, url)
    }

    fn connect(url: &str, id: u64) -> WsClient {
        WsClient::connect(ClientId(id), url, WRITE, POLL).unwrap()
    }

    /// Collects orders until `count` arrived or the timeout expired.
    fn receive_orders(client: &WsClient, count: usize, timeout: Duration) -> Vec<Order> {
        let deadline = Instant::now() + timeout;
        let mut orders = Vec::new();
        while orders.len() < count && Instant::now() < deadline {
            if let Ok(Some(text)) = client.poll_text() {
                orders.push(serde_json::from_str(&text).unwrap());
            }
        }
        orders
    }

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_bind_error() {
        let order_server = Arc::new(OrderServer::new(ServerConfig::default()).unwrap());
        let result = WsServer::new("not-an-address", order_server);
        assert!(matches!(result, Err(WsServerError::BindError(_))));
    }

    #[test]
    fn test_first_client_receives_initial_burst() {
        let (order_server, url) = start_server(Duration::from_secs(60));
        let client = connect(&url, 100);

        let orders = receive_orders(&client, 3, Duration::from_secs(3));
        assert_eq!(orders.len(), 3);
        assert!(orders.iter().all(|o| o.status == OrderStatus::New));

        // Burst is at most 5 and nothing else arrives within a long tick.
        let rest = receive_orders(&client, 3, Duration::from_millis(300));
        assert!(orders.len() + rest.len() <= 5);
        assert_eq!(order_server.simulation().runs(), 1);
    }

    #[test]
    fn test_complete_round_trip() {
        let (order_server, url) = start_server(Duration::from_secs(60));
        let order = order_server.store().create_synthetic();

        let a = connect(&url, 200);
        let b = connect(&url, 201);
        assert!(wait_until(Duration::from_secs(2), || {
            order_server.registry().count() == 2
        }));

        // Both replays contain the pre-existing order; drain the bursts too.
        thread::sleep(Duration::from_millis(300));
        while let Ok(Some(_)) = a.poll_text() {}
        while let Ok(Some(_)) = b.poll_text() {}

        a.send_text(&format!(
            r#"{{"action":"complete","orderId":"{}"}}"#,
            order.id
        ))
        .unwrap();

        for client in [&a, &b] {
            let update = receive_orders(client, 1, Duration::from_secs(2));
            assert_eq!(update.len(), 1);
            assert_eq!(update[0].id, order.id);
            assert_eq!(update[0].status, OrderStatus::Done);
        }
    }

    #[test]
    fn test_unknown_and_garbage_messages_keep_connection() {
        let (order_server, url) = start_server(Duration::from_secs(60));
        let client = connect(&url, 300);
        receive_orders(&client, 5, Duration::from_millis(500));

        client
            .send_text(r#"{"action":"complete","orderId":"does_not_exist"}"#)
            .unwrap();
        client.send_text("garbage").unwrap();
        assert!(receive_orders(&client, 1, Duration::from_millis(300)).is_empty());

        let order = order_server.store().create_synthetic();
        client
            .send_text(&format!(
                r#"{{"action":"complete","orderId":"{}"}}"#,
                order.id
            ))
            .unwrap();
        let update = receive_orders(&client, 1, Duration::from_secs(2));
        assert_eq!(update.len(), 1);
        assert_eq!(update[0].status, OrderStatus::Done);
    }

    #[test]
    fn test_disconnect_stops_and_reconnect_restarts() {
        let (order_server, url) = start_server(Duration::from_millis(50));
        let client = connect(&url, 400);
        assert_eq!(receive_orders(&client, 3, Duration::from_secs(2)).len(), 3);
        client.close();

        assert!(wait_until(Duration::from_secs(3), || {
            order_server.registry().count() == 0
                && order_server.simulation().state() == SimulationState::Idle
        }));

        // Replay comes first, then the new burst.
        let before: HashSet<String> = order_server
            .store()
            .active_orders()
            .into_iter()
            .map(|o| o.id)
            .collect();

        let again = connect(&url, 401);
        let orders = receive_orders(&again, before.len() + 3, Duration::from_secs(3));
        assert_eq!(orders.len(), before.len() + 3);

        let burst = &orders[before.len()..];
        let fresh: HashSet<&str> = burst.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(fresh.len(), 3);
        assert!(burst.iter().all(|o| !before.contains(&o.id)));
        assert!(burst.iter().all(|o| o.status == OrderStatus::New));
        assert!(wait_until(Duration::from_secs(2), || {
            order_server.simulation().runs() == 2
        }));
    }

    #[test]
    fn test_handshake_failure_is_contained() {
        use std::io::Write;

        let (order_server, url) = start_server(Duration::from_secs(60));
        let addr = url.trim_start_matches("ws://").trim_end_matches("/ws");
        let mut raw = TcpStream::connect(addr).unwrap();
        raw.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        drop(raw);

        let client = connect(&url, 500);
        assert_eq!(receive_orders(&client, 3, Duration::from_secs(2)).len(), 3);
        assert_eq!(order_server.registry().count(), 1);
    }
}
