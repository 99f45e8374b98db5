use crate::errors::ClientError;

use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tungstenite::http::Uri;
use tungstenite::{Message, WebSocket};

/// Identity of a connected client, unique for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(
    /// Raw numeric value.
    pub u64,
);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Outbound side of a client connection, as seen by the registry and the
/// broadcaster.
pub trait ClientSink: Send + Sync {
    /// Identity used as the registry key.
    fn id(&self) -> ClientId;

    /// Delivers one text frame. Must not block past the write deadline.
    fn send_text(&self, payload: &str) -> Result<(), ClientError>;

    /// Tears down the transport. Safe to call more than once.
    fn close(&self);
}

/// A full client connection: the sink plus the inbound stream.
pub trait ClientConnection: ClientSink {
    /// Waits briefly for the next inbound text frame.
    ///
    /// Returns `Ok(None)` when nothing actionable arrived (poll timeout or a
    /// control/binary frame) and an error once the connection is unusable.
    fn poll_text(&self) -> Result<Option<String>, ClientError>;
}

/// A client connected over WebSocket.
///
/// The socket sits behind a mutex shared by the session read loop and any
/// broadcaster. Reads use a short timeout and release the lock fairly
/// between polls, so writers waiting on the lock get it next. Writes are
/// bounded by the socket write timeout.
pub struct WsClient {
    id: ClientId,
    peer: Option<SocketAddr>,
    socket: Mutex<WebSocket<TcpStream>>,
    /// Second handle to the same TCP socket, used to shut it down without
    /// taking the socket lock.
    raw: TcpStream,
    closed: AtomicBool,
}

impl WsClient {
    /// Performs the server side of the WebSocket handshake on an accepted
    /// TCP stream.
    ///
    /// The handshake itself is bounded by `write_timeout` in both directions
    /// so a silent peer cannot park the connection thread forever.
    pub fn accept(
        id: ClientId,
        stream: TcpStream,
        write_timeout: Duration,
        read_poll: Duration,
    ) -> Result<Self, ClientError> {
        stream
            .set_read_timeout(Some(write_timeout))
            .and_then(|_| stream.set_write_timeout(Some(write_timeout)))
            .map_err(|e| ClientError::HandshakeFailed(e.to_string()))?;

        let socket = tungstenite::accept(stream)
            .map_err(|e| ClientError::HandshakeFailed(e.to_string()))?;
        Self::from_socket(id, socket, write_timeout, read_poll)
    }

    /// Connects to a WebSocket server, e.g. `ws://127.0.0.1:8080/ws`.
    pub fn connect(
        id: ClientId,
        url: &str,
        write_timeout: Duration,
        read_poll: Duration,
    ) -> Result<Self, ClientError> {
        let uri: Uri = url
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| {
                ClientError::HandshakeFailed(e.to_string())
            })?;
        let host = uri
            .host()
            .ok_or_else(|| ClientError::HandshakeFailed(format!("No host in '{}'", url)))?;
        let port = uri.port_u16().unwrap_or(80);

        let stream = TcpStream::connect((host, port))
            .map_err(|e| ClientError::HandshakeFailed(e.to_string()))?;
        let (socket, _response) = tungstenite::client(url, stream)
            .map_err(|e| ClientError::HandshakeFailed(e.to_string()))?;
        Self::from_socket(id, socket, write_timeout, read_poll)
    }

    fn from_socket(
        id: ClientId,
        socket: WebSocket<TcpStream>,
        write_timeout: Duration,
        read_poll: Duration,
    ) -> Result<Self, ClientError> {
        let stream = socket.get_ref();
        let peer = stream.peer_addr().ok();

        stream
            .set_read_timeout(Some(read_poll))
            .and_then(|_| stream.set_write_timeout(Some(write_timeout)))
            .map_err(|e| ClientError::HandshakeFailed(e.to_string()))?;
        let raw = stream
            .try_clone()
            .map_err(|e| ClientError::HandshakeFailed(e.to_string()))?;

        Ok(Self {
            id,
            peer,
            socket: Mutex::new(socket),
            raw,
            closed: AtomicBool::new(false),
        })
    }

    /// Remote address, if the OS reported one.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Returns `true` once [`close`](ClientSink::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ClientSink for WsClient {
    fn id(&self) -> ClientId {
        self.id
    }

    fn send_text(&self, payload: &str) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let mut socket = self.socket.lock();
        socket
            .send(Message::Text(payload.to_owned()))
            .map_err(|e| ClientError::SendFailed(e.to_string()))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("Closing {} ({:?})", self.id, self.peer);
            let _ = self.raw.shutdown(Shutdown::Both);
        }
    }
}

impl ClientConnection for WsClient {
    fn poll_text(&self) -> Result<Option<String>, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let mut socket = self.socket.lock();
        let result = socket.read();
        MutexGuard::unlock_fair(socket);

        match result {
            Ok(Message::Text(text)) => Ok(Some(text)),
            Ok(Message::Close(_)) => Err(ClientError::Closed),
            Ok(other) => {
                log::trace!("Ignoring non-text frame from {}: {:?}", self.id, other);
                Ok(None)
            }
            Err(tungstenite::Error::Io(e))
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Err(ClientError::Closed)
            }
            Err(e) => Err(ClientError::ReceiveFailed(e.to_string())),
        }
    }
}

impl fmt::Debug for WsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsClient")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.closed)
            // exclude socket
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(20);
    const WRITE: Duration = Duration::from_secs(2);

    /// Accepts one WebSocket connection on a loopback port and connects to it.
    fn connected_pair() -> (WsClient, WsClient) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            WsClient::accept(ClientId(1), stream, WRITE, POLL).unwrap()
        });

        let url = format!("ws://{}/ws", addr);
        let client = WsClient::connect(ClientId(2), &url, WRITE, POLL).unwrap();
        (server.join().unwrap(), client)
    }

    fn poll_until_text(conn: &WsClient) -> Result<String, ClientError> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(text) = conn.poll_text()? {
                return Ok(text);
            }
        }
        panic!("no text frame received");
    }

    #[test]
    fn test_text_frames_both_ways() {
        let (server, client) = connected_pair();

        server.send_text("hello").unwrap();
        assert_eq!(poll_until_text(&client).unwrap(), "hello");

        client.send_text(r#"{"action":"complete"}"#).unwrap();
        assert_eq!(
            poll_until_text(&server).unwrap(),
            r#"{"action":"complete"}"#
        );
    }

    #[test]
    fn test_poll_times_out_without_data() {
        let (server, _client) = connected_pair();
        assert!(matches!(server.poll_text(), Ok(None)));
    }

    #[test]
    fn test_peer_close_is_reported() {
        let (server, client) = connected_pair();
        client.close();

        let result = poll_until_text(&server);
        assert!(result.is_err());
    }

    #[test]
    fn test_send_after_close_fails() {
        let (server, _client) = connected_pair();
        server.close();
        server.close();

        assert!(server.is_closed());
        assert!(matches!(server.send_text("x"), Err(ClientError::Closed)));
        assert!(matches!(server.poll_text(), Err(ClientError::Closed)));
    }

    #[test]
    fn test_peer_addresses() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, from) = listener.accept().unwrap();
            let conn = WsClient::accept(ClientId(1), stream, WRITE, POLL).unwrap();
            (conn, from)
        });

        let client = WsClient::connect(ClientId(2), &format!("ws://{}/ws", addr), WRITE, POLL)
            .unwrap();
        let (server, from) = server.join().unwrap();

        assert_eq!(client.peer(), Some(addr));
        assert_eq!(server.peer(), Some(from));
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("ws://{}/ws", addr);
        assert!(matches!(
            WsClient::connect(ClientId(3), &url, WRITE, POLL),
            Err(ClientError::HandshakeFailed(_))
        ));
    }
}
