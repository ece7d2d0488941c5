//! Notification sink: push-only progress events for operators.
//!
//! Events serialize to the same small JSON objects a front-end consumes:
//!
//! ```text
//! {"status":"PROBING","text":"Probing point 3 of 25..."}
//! {"point":[50.0,0.0,0.132]}
//! {"profile":{ ... }}
//! ```

use crate::error::Result;
use crate::grid::{GridProfile, Sample};
use crate::probe::ProbeStatus;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Event pushed to operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notification {
    /// Probe state changed or progressed
    Status { status: ProbeStatus, text: String },
    /// One point measured
    Point { point: Sample },
    /// New matrix committed
    Profile { profile: GridProfile },
}

impl Notification {
    pub fn status(status: ProbeStatus, text: impl Into<String>) -> Self {
        Self::Status {
            status,
            text: text.into(),
        }
    }

    /// Single-line JSON object
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a line written by [`JsonLineSink`]
    pub fn from_json(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Receiver of notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::Status { status, text } => log::info!("[{}] {}", status, text),
            Notification::Point { point } => log::info!(
                "Measured {:.3}, {:.3}: {:.3}",
                point[0],
                point[1],
                point[2]
            ),
            Notification::Profile { profile } => log::info!(
                "Profile updated with {} samples",
                profile.matrix.len()
            ),
        }
    }
}

/// Forwards notifications over a channel
pub struct ChannelSink {
    tx: Sender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Notification>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            log::debug!("Notification receiver dropped");
        }
    }
}

/// Writes one JSON object per line
pub struct JsonLineSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> JsonLineSink<W> {
    /// Encode and write one notification, flushing after the line
    pub fn write_line(&self, notification: &Notification) -> Result<()> {
        let json = notification.to_json()?;
        let mut out = self.out.lock();
        writeln!(out, "{}", json)?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> NotificationSink for JsonLineSink<W> {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.write_line(&notification) {
            log::error!("Failed to write notification: {}", e);
        }
    }
}
