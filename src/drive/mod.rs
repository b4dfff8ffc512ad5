// Joystick-to-motor mapping
//
// Provides:
// - Joystick geometry (pointer -> clamped stick, speed, steering angle)
// - Differential drive mixing (speed, angle -> per-motor duty)

pub mod geometry;
pub mod mixer;

pub use geometry::{
    JoystickGeometry, StickState, clamp_to_disk, compute_angle_deg, compute_geometry,
    compute_speed,
};
pub use mixer::{DriveCommand, DutyPair, mix, mix_with_params};

use crate::config::MixerConfig;

/// Resolve a clamped stick sample into a drive command
pub fn drive_command(
    geometry: &JoystickGeometry,
    stick: &StickState,
    mixer: &MixerConfig,
) -> DriveCommand {
    let speed = compute_speed(geometry, stick.stick_x, stick.stick_y);
    // No direction at rest; atan2(0, 0) would read as hard right
    let angle = if speed == 0 {
        0
    } else {
        compute_angle_deg(geometry, stick.extent_x, stick.extent_y)
    };
    mixer::command(speed, angle, mixer)
}
