//! Single-slot correlation between a request and its response line.
//!
//! ```text
//! probe thread                     response feed (reader thread)
//! ────────────                     ─────────────────────────────
//! arm(pattern) ─┐
//! send request  │ pending          deliver(line)
//! recv_timeout ◀┴───────────────── first matching line consumes the slot
//! ```
//!
//! Lines delivered while nothing is armed are ignored.

use super::pattern::ResponsePattern;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use std::time::Duration;

struct Pending {
    pattern: ResponsePattern,
    tx: Sender<[f64; 3]>,
}

/// Outstanding request awaiting its response
#[derive(Default)]
pub struct ResponseSlot {
    pending: Mutex<Option<Pending>>,
}

/// Handle held by the waiting step
pub struct ResponseWait {
    rx: Receiver<[f64; 3]>,
}

impl ResponseWait {
    /// Block until the response arrives, `None` on timeout
    pub fn wait(self, timeout: Duration) -> Option<[f64; 3]> {
        match self.rx.recv_timeout(timeout) {
            Ok(values) => Some(values),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a line matching `pattern`, replacing any earlier request
    pub fn arm(&self, pattern: ResponsePattern) -> ResponseWait {
        let (tx, rx) = bounded(1);
        *self.pending.lock() = Some(Pending { pattern, tx });
        ResponseWait { rx }
    }

    /// Offer a device line; returns true if it completed the pending request
    pub fn deliver(&self, line: &str) -> bool {
        let mut pending = self.pending.lock();
        let Some(values) = pending.as_ref().and_then(|p| p.pattern.captures(line)) else {
            return false;
        };
        if let Some(request) = pending.take() {
            // Waiter may have timed out already
            let _ = request.tx.try_send(values);
        }
        true
    }

    /// Drop the pending request
    pub fn disarm(&self) {
        self.pending.lock().take();
    }

    pub fn is_armed(&self) -> bool {
        self.pending.lock().is_some()
    }
}
