use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Frames queued per connection before the client counts as hung.
pub const OUTBOUND_CAPACITY: usize = 32;

/// An encoded text frame, shared between all recipients of a broadcast.
pub type Frame = Arc<str>;

/// Socket id handed to the browser in the namespace connect ack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Connections removed because their queue was closed or full.
    pub dropped: usize,
}

/// The set of open browser connections.
///
/// Each open connection is represented only by the sending half of its
/// outbound queue. Removing the sender is what closes a connection: its task
/// sees the queue end and shuts the socket.
#[derive(Clone, Default)]
pub struct ConnectionHub {
    connections: Arc<Mutex<HashMap<ConnectionId, mpsc::Sender<Frame>>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection in the OPEN state and return its outbound queue.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<Frame>) {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let open = {
            let mut connections = self.connections.lock();
            connections.insert(id.clone(), tx);
            connections.len()
        };
        tracing::info!(sid = %id, open, "browser client connected");
        (id, rx)
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let (removed, open) = {
            let mut connections = self.connections.lock();
            let removed = connections.remove(id).is_some();
            (removed, connections.len())
        };
        if removed {
            tracing::info!(sid = %id, open, "browser client disconnected");
        }
        removed
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.lock().contains_key(id)
    }

    pub fn open_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Queue `frame` on every open connection without waiting on any of them.
    ///
    /// A connection whose queue is closed or full is removed; the rest still
    /// receive the frame.
    pub fn broadcast(&self, frame: &str) -> BroadcastReport {
        let frame: Frame = Arc::from(frame);
        let mut report = BroadcastReport::default();
        let mut connections = self.connections.lock();
        connections.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(sid = %id, "browser client is not draining its queue, closing");
                report.dropped += 1;
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(sid = %id, "browser client went away mid-send, closing");
                report.dropped += 1;
                false
            }
        });
        report
    }
}
