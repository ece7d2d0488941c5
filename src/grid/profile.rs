//! Grid profile: sampling rectangle, homing options and the measured matrix.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the profile created when no profile set exists yet
pub const DEFAULT_PROFILE_NAME: &str = "disabled";

/// One measured height sample: (x, y, z)
pub type Sample = [f64; 3];

/// Grid spacing derived from a profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing {
    /// Distance between two samples along X
    pub dist_x: f64,
    /// Distance between two samples along Y
    pub dist_y: f64,
}

/// Configuration plus measured height samples for one surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridProfile {
    /// Measured samples in row-major order (outer Y, inner X)
    #[serde(default)]
    pub matrix: Vec<Sample>,
    /// Unix time (seconds) of the last successful probe
    #[serde(default)]
    pub matrix_updated: f64,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub count_x: usize,
    pub count_y: usize,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
    /// Height to lift before probing or homing (0 disables)
    #[serde(default)]
    pub lift: f64,
    /// Stored verbatim, not applied
    #[serde(default)]
    pub fade: f64,
    #[serde(default)]
    pub safe_homing: bool,
    #[serde(default)]
    pub home_x: f64,
    #[serde(default)]
    pub home_y: f64,
}

impl Default for GridProfile {
    fn default() -> Self {
        Self {
            matrix: Vec::new(),
            matrix_updated: 0.0,
            min_x: 0.0,
            max_x: 200.0,
            min_y: 0.0,
            max_y: 200.0,
            count_x: 5,
            count_y: 5,
            offset_x: 0.0,
            offset_y: 0.0,
            lift: 0.0,
            fade: 2.0,
            safe_homing: false,
            home_x: 100.0,
            home_y: 100.0,
        }
    }
}

impl GridProfile {
    /// Distance between neighboring samples on each axis.
    ///
    /// Fails when either axis has fewer than two samples or an empty range.
    pub fn spacing(&self) -> Result<Spacing> {
        if self.count_x < 2 || self.count_y < 2 {
            return Err(Error::Config(format!(
                "grid needs at least 2 samples per axis, got {}x{}",
                self.count_x, self.count_y
            )));
        }
        if self.max_x <= self.min_x || self.max_y <= self.min_y {
            return Err(Error::Config(format!(
                "grid range is empty: x {}..{}, y {}..{}",
                self.min_x, self.max_x, self.min_y, self.max_y
            )));
        }
        Ok(Spacing {
            dist_x: (self.max_x - self.min_x) / (self.count_x - 1) as f64,
            dist_y: (self.max_y - self.min_y) / (self.count_y - 1) as f64,
        })
    }

    /// Fractional, unclamped grid index of a point
    pub fn grid_index(&self, spacing: Spacing, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.min_x) / spacing.dist_x,
            (y - self.min_y) / spacing.dist_y,
        )
    }

    /// Probe targets in traversal order (outer Y, inner X)
    pub fn probe_points(&self) -> Result<Vec<(f64, f64)>> {
        let spacing = self.spacing()?;
        let mut points = Vec::with_capacity(self.count_x * self.count_y);
        for iy in 0..self.count_y {
            for ix in 0..self.count_x {
                points.push((
                    self.min_x + spacing.dist_x * ix as f64,
                    self.min_y + spacing.dist_y * iy as f64,
                ));
            }
        }
        Ok(points)
    }

    /// Number of samples a complete matrix holds
    pub fn point_count(&self) -> usize {
        self.count_x * self.count_y
    }

    /// Matrix holds measurements
    pub fn has_matrix(&self) -> bool {
        !self.matrix.is_empty()
    }

    /// Matrix is empty or exactly fills the grid
    pub fn is_consistent(&self) -> bool {
        self.matrix.is_empty() || self.matrix.len() == self.point_count()
    }

    /// Sample at integer grid position
    pub fn sample(&self, ix: usize, iy: usize) -> Option<&Sample> {
        if ix >= self.count_x || iy >= self.count_y {
            return None;
        }
        self.matrix.get(iy * self.count_x + ix)
    }

    /// Copy of this profile carrying a freshly probed matrix
    pub fn with_matrix(&self, matrix: Vec<Sample>, updated: f64) -> Self {
        Self {
            matrix,
            matrix_updated: updated,
            ..self.clone()
        }
    }
}

/// All stored profiles plus the name of the active one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
    pub selected_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, GridProfile>,
}

impl Default for ProfileSet {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE_NAME.to_string(), GridProfile::default());
        Self {
            selected_profile: DEFAULT_PROFILE_NAME.to_string(),
            profiles,
        }
    }
}

impl ProfileSet {
    /// The selected profile
    pub fn active(&self) -> Result<&GridProfile> {
        self.profiles
            .get(&self.selected_profile)
            .ok_or_else(|| Error::ProfileNotFound(self.selected_profile.clone()))
    }
}
