//! levelgrid - Surface height-map probing and G-code Z compensation
//!
//! Probes a rectangular grid of surface heights on a motion-controlled device
//! and rewrites the outgoing movement stream so every move follows the
//! measured surface.
//!
//! ## Components
//!
//! - [`grid`]: grid profile, sampling grid and bilinear interpolation
//! - [`engine`]: interception engine rewriting movement commands
//! - [`probe`]: background probe sessions with response correlation
//! - [`session`]: operator command surface bundling the above
//! - [`channel`], [`notify`], [`store`], [`access`]: device, operator,
//!   persistence and permission collaborators

pub mod access;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod gcode;
pub mod grid;
pub mod notify;
pub mod probe;
pub mod session;
pub mod shared;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use engine::InterceptionEngine;
pub use error::{Error, Result};
pub use grid::{GridProfile, ProfileSet};
pub use probe::{ProbeController, ProbeOptions, ProbeStatus};
pub use session::{Collaborators, LevelingSession, OperatorCommand};
