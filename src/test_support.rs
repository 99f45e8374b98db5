//! In-memory client doubles shared by unit tests.

use crate::client::{ClientConnection, ClientId, ClientSink};
use crate::errors::ClientError;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// A scripted connection: records sent frames and hands out queued
/// inbound frames. Once the queue is drained (and `hang_up` was called),
/// polls report the connection as closed.
pub(crate) struct MockConnection {
    id: ClientId,
    sent: Mutex<Vec<String>>,
    inbound: Mutex<VecDeque<String>>,
    hung_up: AtomicBool,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    /// Fail every send after this many successful ones.
    fail_after: AtomicUsize,
}

impl MockConnection {
    pub(crate) fn new(id: ClientId) -> Self {
        Self {
            id,
            sent: Mutex::new(Vec::new()),
            inbound: Mutex::new(VecDeque::new()),
            hung_up: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            fail_after: AtomicUsize::new(usize::MAX),
        }
    }

    /// A connection whose every send fails.
    pub(crate) fn failing(id: ClientId) -> Self {
        let conn = Self::new(id);
        conn.fail_sends.store(true, Ordering::SeqCst);
        conn
    }

    pub(crate) fn fail_after(&self, sends: usize) {
        self.fail_after.store(sends, Ordering::SeqCst);
    }

    pub(crate) fn push_inbound(&self, text: &str) {
        self.inbound.lock().push_back(text.to_string());
    }

    /// Peer disconnects once queued frames are consumed.
    pub(crate) fn hang_up(&self) {
        self.hung_up.store(true, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` frames were sent.
    pub(crate) fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || Instant::now() >= deadline {
                return sent;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl ClientSink for MockConnection {
    fn id(&self) -> ClientId {
        self.id
    }

    fn send_text(&self, payload: &str) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        let mut sent = self.sent.lock();
        if self.fail_sends.load(Ordering::SeqCst)
            || sent.len() >= self.fail_after.load(Ordering::SeqCst)
        {
            return Err(ClientError::SendFailed("broken pipe".into()));
        }
        sent.push(payload.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl ClientConnection for MockConnection {
    fn poll_text(&self) -> Result<Option<String>, ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        if let Some(text) = self.inbound.lock().pop_front() {
            return Ok(Some(text));
        }
        if self.hung_up.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        thread::sleep(Duration::from_millis(2));
        Ok(None)
    }
}
