//! Individual WebSocket connection
//!
//! Represents a single WebSocket connection and its lifecycle state.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered and relaying
    Open,
    /// Teardown in progress
    Closing,
    /// Removed from the registry, transport released
    Closed,
}

/// Failure to hand a frame to a connection's writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Connection closed")]
    Closed,

    #[error("Send timed out")]
    TimedOut,
}

/// A single WebSocket connection
///
/// Owns the sending half of the queue drained by the connection's writer task.
/// Dropping that half (see [`Connection::release`]) makes the writer close the
/// socket. A failed broadcast send is reported through
/// [`Connection::mark_failed`] so the owning session can tear itself down.
pub struct Connection {
    /// Unique connection ID
    id: String,

    /// Sender identity attached to everything this connection publishes
    identity: String,

    /// Current lifecycle state
    state: Mutex<ConnectionState>,

    /// Queue to the writer task; `None` once released
    sender: Mutex<Option<mpsc::Sender<String>>>,

    /// Set once a broadcast could not hand this connection a frame
    failed: AtomicBool,

    /// Wakes the owning session when `failed` is first set
    failure: Notify,

    /// Connection creation time
    created_at: Instant,
}

impl Connection {
    /// Create a new open connection with a random ID
    pub fn new(identity: impl Into<String>, sender: mpsc::Sender<String>) -> Arc<Self> {
        Self::with_id(Uuid::new_v4().to_string(), identity, sender)
    }

    /// Create a new open connection with a caller-chosen ID
    pub fn with_id(
        id: impl Into<String>,
        identity: impl Into<String>,
        sender: mpsc::Sender<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            identity: identity.into(),
            state: Mutex::new(ConnectionState::Open),
            sender: Mutex::new(Some(sender)),
            failed: AtomicBool::new(false),
            failure: Notify::new(),
            created_at: Instant::now(),
        })
    }

    /// Get the connection ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the sender identity
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Check if the connection is open
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Move from `Open` to `Closing`
    ///
    /// Returns `false` if teardown already started, so only one caller wins.
    pub fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ConnectionState::Open {
            *state = ConnectionState::Closing;
            true
        } else {
            false
        }
    }

    /// Drop the writer queue and mark the connection closed
    pub fn release(&self) {
        self.sender.lock().take();
        *self.state.lock() = ConnectionState::Closed;
    }

    /// Record that a frame could not be delivered
    ///
    /// Does not touch the registry or the state; the session waiting in
    /// [`Connection::failed`] is woken and runs the normal teardown. Returns
    /// `true` for the first report only.
    pub fn mark_failed(&self) -> bool {
        if self.failed.swap(true, Ordering::SeqCst) {
            return false;
        }
        // notify_one keeps a permit if the session is not waiting yet
        self.failure.notify_one();
        true
    }

    /// Check if a delivery failure was recorded
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Resolve once a delivery failure is recorded
    pub async fn failed(&self) {
        if self.has_failed() {
            return;
        }
        self.failure.notified().await;
    }

    /// Get connection age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Queue a frame for the writer, waiting at most `timeout` for room
    pub async fn send(&self, frame: String, timeout: Duration) -> Result<(), SendError> {
        let sender = self.sender.lock().clone().ok_or(SendError::Closed)?;

        match tokio::time::timeout(timeout, sender.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendError::Closed),
            Err(_) => Err(SendError::TimedOut),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("failed", &self.has_failed())
            .field("created_at", &self.created_at)
            .finish()
    }
}
