//! Neighbor selection and height interpolation over a grid profile.
//!
//! A point is classified against the sampled rectangle:
//!
//! ```text
//!   corner │   edge    │ corner
//!  ────────┼───────────┼────────
//!    edge  │   inner   │  edge
//!  ────────┼───────────┼────────
//!   corner │   edge    │ corner
//! ```
//!
//! - **inner**: 4 neighbors, bilinear blend
//! - **edge**: the outside axis is clamped to its border index, 2 neighbors
//!   along the other axis, linear blend
//! - **corner**: the nearest grid corner, its value is used as-is
//!
//! Values past the border are never extrapolated.

use super::profile::{GridProfile, Spacing};

/// Integer grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ix: usize,
    pub iy: usize,
}

impl Cell {
    pub fn new(ix: usize, iy: usize) -> Self {
        Self { ix, iy }
    }
}

/// Samples contributing to the height at a point
#[derive(Debug, Clone, PartialEq)]
pub enum Neighborhood {
    /// Outside on both axes
    Corner(Cell),
    /// Outside on exactly one axis; `t` runs from `low` to `high`
    Edge { low: Cell, high: Cell, t: f64 },
    /// Inside on both axes
    Inner {
        x0: usize,
        x1: usize,
        y0: usize,
        y1: usize,
        tx: f64,
        ty: f64,
    },
}

impl Neighborhood {
    /// Grid cells this neighborhood reads
    pub fn cells(&self) -> Vec<Cell> {
        match *self {
            Self::Corner(cell) => vec![cell],
            Self::Edge { low, high, .. } => vec![low, high],
            Self::Inner { x0, x1, y0, y1, .. } => vec![
                Cell::new(x0, y0),
                Cell::new(x1, y0),
                Cell::new(x0, y1),
                Cell::new(x1, y1),
            ],
        }
    }
}

/// Floor/ceil indices around a fractional index, clamped to the grid, plus
/// the blend factor between them.
fn bracket(index: f64, count: usize) -> (usize, usize, f64) {
    let last = count.saturating_sub(1) as f64;
    let low = index.floor().clamp(0.0, last);
    let high = index.ceil().clamp(0.0, last);
    let t = if high > low {
        (index - low).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (low as usize, high as usize, t)
}

/// Border index on an axis for a coordinate outside the range
fn border(value: f64, min: f64, count: usize) -> usize {
    if value < min { 0 } else { count - 1 }
}

/// Pick the samples surrounding `(x, y)`
pub fn select(profile: &GridProfile, spacing: Spacing, x: f64, y: f64) -> Neighborhood {
    let (index_x, index_y) = profile.grid_index(spacing, x, y);
    let outside_x = x < profile.min_x || x > profile.max_x;
    let outside_y = y < profile.min_y || y > profile.max_y;

    match (outside_x, outside_y) {
        (true, true) => Neighborhood::Corner(Cell::new(
            border(x, profile.min_x, profile.count_x),
            border(y, profile.min_y, profile.count_y),
        )),
        (true, false) => {
            let ix = border(x, profile.min_x, profile.count_x);
            let (y0, y1, t) = bracket(index_y, profile.count_y);
            Neighborhood::Edge {
                low: Cell::new(ix, y0),
                high: Cell::new(ix, y1),
                t,
            }
        }
        (false, true) => {
            let iy = border(y, profile.min_y, profile.count_y);
            let (x0, x1, t) = bracket(index_x, profile.count_x);
            Neighborhood::Edge {
                low: Cell::new(x0, iy),
                high: Cell::new(x1, iy),
                t,
            }
        }
        (false, false) => {
            let (x0, x1, tx) = bracket(index_x, profile.count_x);
            let (y0, y1, ty) = bracket(index_y, profile.count_y);
            Neighborhood::Inner {
                x0,
                x1,
                y0,
                y1,
                tx,
                ty,
            }
        }
    }
}

/// Height blended from the neighborhood's samples.
///
/// Returns `None` when the matrix lacks one of the samples.
pub fn blend(profile: &GridProfile, neighborhood: &Neighborhood) -> Option<f64> {
    let z = |cell: Cell| profile.sample(cell.ix, cell.iy).map(|s| s[2]);
    match *neighborhood {
        Neighborhood::Corner(cell) => z(cell),
        Neighborhood::Edge { low, high, t } => {
            let (z0, z1) = (z(low)?, z(high)?);
            Some(z0 + (z1 - z0) * t)
        }
        Neighborhood::Inner {
            x0,
            x1,
            y0,
            y1,
            tx,
            ty,
        } => {
            let z00 = z(Cell::new(x0, y0))?;
            let z10 = z(Cell::new(x1, y0))?;
            let z01 = z(Cell::new(x0, y1))?;
            let z11 = z(Cell::new(x1, y1))?;
            let bottom = z00 + (z10 - z00) * tx;
            let top = z01 + (z11 - z01) * tx;
            Some(bottom + (top - bottom) * ty)
        }
    }
}

/// Height correction at `(x, y)`, `None` without a usable matrix
pub fn correction_at(profile: &GridProfile, x: f64, y: f64) -> Option<f64> {
    if !profile.has_matrix() || !profile.is_consistent() {
        return None;
    }
    let spacing = profile.spacing().ok()?;
    blend(profile, &select(profile, spacing, x, y))
}
