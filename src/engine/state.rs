//! Interpreter state carried between filtered commands

/// What the filter believes about the device position.
///
/// Axes omitted from a move fall back to these values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    /// `G90` (true) or `G91` (false)
    pub position_absolute: bool,
    pub last_x: f64,
    pub last_y: f64,
    /// Last requested height, before correction
    pub last_z: f64,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            position_absolute: true,
            last_x: 0.0,
            last_y: 0.0,
            last_z: 0.0,
        }
    }
}

impl MotionState {
    /// Forget the position after the device moved somewhere unknown
    pub fn reset_position(&mut self) {
        self.last_x = 0.0;
        self.last_y = 0.0;
        self.last_z = 0.0;
    }
}
