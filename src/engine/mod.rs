//! Interception engine: rewrites the outgoing command stream.
//!
//! Every command headed for the device passes through [`InterceptionEngine::filter`]
//! and comes out as zero, one or several commands:
//!
//! | Command | Action |
//! |---------|--------|
//! | `G90` / `G91` | Track positioning mode, pass through |
//! | `G0` / `G1` | Add the surface correction to Z |
//! | `G28` (height axis) | Lift, travel to the safe home point, then home (`safe_homing`) |
//! | `G30` | Lift before probing (`lift > 0`) |
//! | anything else | Pass through |
//!
//! The filter runs on the streaming path: it never blocks, never performs I/O
//! and never fails. Malformed numbers read as missing parameters.

mod state;

pub use state::MotionState;

use crate::gcode::GCodeLine;
use crate::grid::{GridProfile, correction_at};

/// Stateful command filter.
///
/// Commands must be filtered in the order the device will execute them.
#[derive(Debug, Default)]
pub struct InterceptionEngine {
    state: MotionState,
}

impl InterceptionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current interpreter state
    pub fn state(&self) -> &MotionState {
        &self.state
    }

    /// Filter one command against `profile`.
    ///
    /// Height corrections assume absolute positioning: under `G91` a move
    /// still gets `last_z + correction` written as its Z word, which the
    /// device reads as a relative step.
    pub fn filter(&mut self, line: &str, profile: &GridProfile) -> Vec<String> {
        let Some(command) = GCodeLine::parse(line) else {
            return vec![line.to_string()];
        };

        if command.is('G', 90) {
            self.state.position_absolute = true;
        } else if command.is('G', 91) {
            self.state.position_absolute = false;
        } else if command.is('G', 0) || command.is('G', 1) {
            return self.rewrite_move(line, command, profile);
        } else if command.is('G', 28) {
            return self.home(line, &command, profile);
        } else if command.is('G', 30) && profile.lift > 0.0 {
            let mut commands = self.lift_sequence(profile.lift);
            commands.push(line.to_string());
            return commands;
        }

        vec![line.to_string()]
    }

    fn rewrite_move(
        &mut self,
        line: &str,
        mut command: GCodeLine,
        profile: &GridProfile,
    ) -> Vec<String> {
        let x = command.get('X').unwrap_or(self.state.last_x);
        let y = command.get('Y').unwrap_or(self.state.last_y);
        let explicit_z = command.get('Z');
        self.state.last_x = x;
        self.state.last_y = y;
        if let Some(z) = explicit_z {
            self.state.last_z = z;
        }

        if !profile.has_matrix() {
            return vec![line.to_string()];
        }

        let Some(correction) = correction_at(profile, x, y) else {
            log::debug!(
                "No height correction available at {:.3}, {:.3}; move passed through",
                x,
                y
            );
            return vec![line.to_string()];
        };

        log::trace!("Correction at {:.3}, {:.3}: {:.4}", x, y, correction);
        command.set('Z', self.state.last_z + correction);
        vec![command.to_string()]
    }

    fn home(&mut self, line: &str, command: &GCodeLine, profile: &GridProfile) -> Vec<String> {
        // No axis given homes every axis
        let homes_height =
            command.has('Z') || !(command.has('X') || command.has('Y') || command.has('Z'));

        let mut commands = Vec::new();
        if homes_height && profile.safe_homing {
            if profile.lift > 0.0 {
                commands.extend(self.lift_sequence(profile.lift));
            }
            commands.push(
                GCodeLine::new("G0")
                    .with('X', profile.home_x + profile.offset_x)
                    .with('Y', profile.home_y + profile.offset_y)
                    .to_string(),
            );
            log::debug!("Safe homing via {}", commands[commands.len() - 1]);
        }
        commands.push(line.to_string());

        // Position after homing is not known to the filter
        self.state.reset_position();
        commands
    }

    /// Relative lift by `lift`, leaving the positioning mode as it was
    fn lift_sequence(&self, lift: f64) -> Vec<String> {
        let lift = GCodeLine::new("G0").with('Z', lift).to_string();
        if self.state.position_absolute {
            vec!["G91".to_string(), lift, "G90".to_string()]
        } else {
            vec![lift]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> GridProfile {
        GridProfile {
            min_x: 0.0,
            max_x: 10.0,
            min_y: 0.0,
            max_y: 10.0,
            count_x: 2,
            count_y: 2,
            matrix: vec![
                [0.0, 0.0, 0.0],
                [10.0, 0.0, 0.0],
                [0.0, 10.0, 0.0],
                [10.0, 10.0, 1.0],
            ],
            ..Default::default()
        }
    }

    /// 3x3 over (0,0)-(100,100), z = x / 100 + y / 1000
    fn bed() -> GridProfile {
        let mut profile = GridProfile {
            min_x: 0.0,
            max_x: 100.0,
            min_y: 0.0,
            max_y: 100.0,
            count_x: 3,
            count_y: 3,
            ..Default::default()
        };
        profile.matrix = profile
            .probe_points()
            .unwrap()
            .into_iter()
            .map(|(x, y)| [x, y, x / 100.0 + y / 1000.0])
            .collect();
        profile
    }

    fn homing_profile() -> GridProfile {
        GridProfile {
            safe_homing: true,
            lift: 5.0,
            home_x: 100.0,
            home_y: 80.0,
            offset_x: 2.5,
            offset_y: -4.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_matrix_passes_moves_through() {
        let profile = GridProfile::default();
        let mut engine = InterceptionEngine::new();
        for line in ["G1 X50 Y50", "G0 Z3 ; comment", "G01 X1"] {
            assert_eq!(engine.filter(line, &profile), vec![line]);
        }
    }

    #[test]
    fn test_move_gets_interpolated_height() {
        let mut engine = InterceptionEngine::new();
        assert_eq!(engine.filter("G1 X50 Y50", &bed()), vec!["G1 X50 Y50 Z0.550"]);
        assert_eq!(engine.filter("G1 X5 Y5", &square()), vec!["G1 X5 Y5 Z0.250"]);
    }

    #[test]
    fn test_missing_axis_uses_last_position() {
        let profile = bed();
        let mut engine = InterceptionEngine::new();
        engine.filter("G1 X100 Y0", &profile);
        assert_eq!(engine.filter("G1 Y100", &profile), vec!["G1 Y100 Z1.100"]);
        assert_eq!(engine.state().last_x, 100.0);
        assert_eq!(engine.state().last_y, 100.0);
    }

    #[test]
    fn test_explicit_height_is_corrected_and_remembered() {
        let profile = bed();
        let mut engine = InterceptionEngine::new();
        assert_eq!(
            engine.filter("G0 X50 Y50 Z2 F600", &profile),
            vec!["G0 X50 Y50 Z2.550 F600"]
        );
        assert_eq!(engine.state().last_z, 2.0);
        assert_eq!(engine.filter("G1 X0 Y0", &profile), vec!["G1 X0 Y0 Z2.000"]);
    }

    #[test]
    fn test_malformed_parameter_falls_back() {
        let profile = bed();
        let mut engine = InterceptionEngine::new();
        engine.filter("G1 X50 Y50", &profile);
        assert_eq!(
            engine.filter("G1 X5-0 Z1.2.3", &profile),
            vec!["G1 X5-0 Z0.550"]
        );
    }

    #[test]
    fn test_mode_commands_tracked() {
        let profile = GridProfile::default();
        let mut engine = InterceptionEngine::new();
        assert_eq!(engine.filter("G91", &profile), vec!["G91"]);
        assert!(!engine.state().position_absolute);
        assert_eq!(engine.filter("G90", &profile), vec!["G90"]);
        assert!(engine.state().position_absolute);
    }

    #[test]
    fn test_relative_moves_get_absolute_correction() {
        let profile = bed();
        let mut engine = InterceptionEngine::new();
        engine.filter("G91", &profile);
        assert_eq!(engine.filter("G1 X50 Y50", &profile), vec!["G1 X50 Y50 Z0.550"]);
        assert_eq!(engine.filter("G1 X50", &profile), vec!["G1 X50 Z0.550"]);
        assert!(!engine.state().position_absolute);
    }

    #[test]
    fn test_safe_homing_absolute_mode() {
        let mut engine = InterceptionEngine::new();
        assert_eq!(
            engine.filter("G28 Z", &homing_profile()),
            vec!["G91", "G0 Z5.000", "G90", "G0 X102.500 Y76.000", "G28 Z"]
        );
    }

    #[test]
    fn test_safe_homing_unspaced_axes() {
        let profile = homing_profile();
        let mut engine = InterceptionEngine::new();
        assert_eq!(
            engine.filter("G28XZ", &profile),
            vec!["G91", "G0 Z5.000", "G90", "G0 X102.500 Y76.000", "G28XZ"]
        );
        assert_eq!(engine.filter("G28XY", &profile), vec!["G28XY"]);
    }

    #[test]
    fn test_safe_homing_relative_mode_keeps_mode() {
        let profile = homing_profile();
        let mut engine = InterceptionEngine::new();
        engine.filter("G91", &profile);
        assert_eq!(
            engine.filter("G28", &profile),
            vec!["G0 Z5.000", "G0 X102.500 Y76.000", "G28"]
        );
    }

    #[test]
    fn test_safe_homing_without_lift() {
        let profile = GridProfile {
            lift: 0.0,
            ..homing_profile()
        };
        let mut engine = InterceptionEngine::new();
        assert_eq!(
            engine.filter("G28 X Z", &profile),
            vec!["G0 X102.500 Y76.000", "G28 X Z"]
        );
    }

    #[test]
    fn test_homing_other_axes_untouched() {
        let mut engine = InterceptionEngine::new();
        assert_eq!(engine.filter("G28 X Y", &homing_profile()), vec!["G28 X Y"]);
    }

    #[test]
    fn test_homing_resets_position() {
        let profile = bed();
        let mut engine = InterceptionEngine::new();
        engine.filter("G1 X10 Y20 Z3", &profile);
        engine.filter("G28 Z", &profile);
        assert_eq!(*engine.state(), MotionState::default());
    }

    #[test]
    fn test_probe_is_lifted() {
        let profile = GridProfile {
            lift: 1.5,
            ..Default::default()
        };
        let mut engine = InterceptionEngine::new();
        assert_eq!(
            engine.filter("G30 X10.000 Y20.000", &profile),
            vec!["G91", "G0 Z1.500", "G90", "G30 X10.000 Y20.000"]
        );
        assert_eq!(
            engine.filter("G30", &GridProfile::default()),
            vec!["G30"]
        );
    }

    #[test]
    fn test_other_commands_untouched() {
        let profile = homing_profile();
        let mut engine = InterceptionEngine::new();
        for line in ["M104 S200", "", "; comment", "T0", "G92 Z0"] {
            assert_eq!(engine.filter(line, &profile), vec![line]);
        }
    }
}
