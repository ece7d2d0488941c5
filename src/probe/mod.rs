//! Probe controller: measures the sample matrix on the device.
//!
//! ## State Machine
//!
//! ```text
//!            start                   all points measured
//! ┌──────┐ ────────▶ ┌─────────┐ ─────────────────────▶ ┌──────┐
//! │ IDLE │           │ PROBING │                        │ IDLE │
//! └──────┘           └─────────┘                        └──────┘
//!                     │       │
//!              cancel │       │ timeout / coordinate mismatch
//!                     ▼       ▼
//!               ┌────────┐ ┌───────┐
//!               │ CANCEL │ │ ERROR │
//!               └────────┘ └───────┘
//! ```
//!
//! A session runs on its own thread and checks for cancellation before each
//! point. A response wait in flight is never interrupted, so cancellation
//! takes effect within one response timeout. The stored matrix only changes
//! when every point succeeded.

mod controller;
mod pattern;
mod slot;

pub use controller::{ProbeController, ProbeOptions};
pub use pattern::ResponsePattern;
pub use slot::{ResponseSlot, ResponseWait};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest accepted distance between requested and reported coordinates
pub const COORD_TOLERANCE: f64 = 0.1;

/// Probe session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    #[default]
    Idle,
    Probing,
    Cancel,
    Error,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Probing => "PROBING",
            Self::Cancel => "CANCEL",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Reported coordinate matches the requested one
#[inline]
pub fn coords_equal(reported: f64, requested: f64) -> bool {
    (reported - requested).abs() < COORD_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_tolerance() {
        assert!(coords_equal(10.05, 10.0));
        assert!(coords_equal(9.95, 10.0));
        assert!(!coords_equal(10.2, 10.0));
        assert!(!coords_equal(-0.2, 0.0));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(ProbeStatus::Cancel.to_string(), "CANCEL");
        assert_eq!(ProbeStatus::default(), ProbeStatus::Idle);
    }
}
