//! Sampling grid: profile data and height interpolation.
//!
//! - [`profile::GridProfile`]: rectangle, sample counts and the probed matrix
//! - [`interpolate`]: neighbor selection and blending

pub mod interpolate;
pub mod profile;

pub use interpolate::{Cell, Neighborhood, correction_at};
pub use profile::{DEFAULT_PROFILE_NAME, GridProfile, ProfileSet, Sample, Spacing};
