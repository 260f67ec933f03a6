//! Tracking for long-lived log-follow streams.
//!
//! The store is owned and injected by the caller (one per route-layer
//! process, typically), not process-global: the expiry policy is a
//! parameter of `sweep_expired`, and dropping the store cancels nothing by
//! itself — sessions end when cancelled, swept, or when their stream ends.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

/// Cancel handle for one follow stream.
pub struct StreamSession {
    cancel: oneshot::Sender<()>,
    started_at: Instant,
}

impl StreamSession {
    pub fn new(cancel: oneshot::Sender<()>) -> Self {
        StreamSession {
            cancel,
            started_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Signal the stream task to stop. Consumes the session; a task that
    /// already exited just ignores the signal.
    pub fn cancel(self) {
        let _ = self.cancel.send(());
    }
}

/// Session registry interface. Keys are caller-chosen ids.
pub trait SessionStore: Send + Sync {
    fn put(&self, id: String, session: StreamSession);
    fn delete(&self, id: &str) -> Option<StreamSession>;
    fn sweep_expired(&self, max_age: Duration) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete and cancel in one step; true when a live session was found.
    fn cancel(&self, id: &str) -> bool {
        match self.delete(id) {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }
}

/// In-memory store, suitable for a single-process route layer.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, StreamSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, id: String, session: StreamSession) {
        let mut sessions = self.sessions.lock().unwrap();
        // Replacing an id cancels the previous stream rather than leaking it.
        if let Some(old) = sessions.remove(&id) {
            old.cancel();
        }
        sessions.insert(id, session);
    }

    fn delete(&self, id: &str) -> Option<StreamSession> {
        self.sessions.lock().unwrap().remove(id)
    }

    fn sweep_expired(&self, max_age: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.age() > max_age)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                session.cancel();
            }
        }
        expired.len()
    }

    fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}
