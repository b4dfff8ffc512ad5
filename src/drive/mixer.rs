// Differential drive mixer: (speed, steering angle) -> per-motor duty cycles
//
// Both motors idle at a baseline duty. Deflecting the stick adds up to `boost`
// on top of it; turning bleeds the inner side back toward the baseline.

use serde::Serialize;

use crate::config::{DUTY_BOOST, MixerConfig, NEUTRAL_DUTY};

/// Duty values for the two motor channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DutyPair {
    pub left: u8,
    pub right: u8,
}

/// One fully resolved stick sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriveCommand {
    pub speed: u8,
    pub angle_deg: i16,
    pub duty_left: u8,
    pub duty_right: u8,
}

impl DriveCommand {
    /// Stick released: zero speed, both motors at baseline
    pub fn neutral(mixer: &MixerConfig) -> Self {
        Self {
            speed: 0,
            angle_deg: 0,
            duty_left: mixer.baseline,
            duty_right: mixer.baseline,
        }
    }

    pub fn duty(&self) -> DutyPair {
        DutyPair {
            left: self.duty_left,
            right: self.duty_right,
        }
    }
}

/// Mix with the default baseline and boost
pub fn mix(speed: u8, angle_deg: i16) -> DutyPair {
    mix_with_params(speed, angle_deg, NEUTRAL_DUTY, DUTY_BOOST)
}

/// Mix with a custom baseline and boost
///
/// # Arguments
/// * `speed` - Stick deflection, 0..=100 (larger values are clamped)
/// * `angle_deg` - Steering angle, -90..=90, positive = right (clamped)
pub fn mix_with_params(speed: u8, angle_deg: i16, baseline: u8, boost: u8) -> DutyPair {
    let throttle = f64::from(speed.min(100)) / 100.0;
    let angle = angle_deg.clamp(-90, 90);
    let boost = f64::from(boost);

    // Outer wheel gets the full boost, inner wheel loses it as the turn sharpens
    let outer = (f64::from(baseline) + boost * throttle).round() as u8;
    let bias = 1.0 - f64::from(angle.unsigned_abs()) / 90.0;
    let inner = baseline.saturating_add((boost * bias * throttle).round() as u8);

    if angle > 0 {
        DutyPair {
            left: outer,
            right: inner,
        }
    } else {
        DutyPair {
            left: inner,
            right: outer,
        }
    }
}

/// Build a full command from speed and angle
pub fn command(speed: u8, angle_deg: i16, mixer: &MixerConfig) -> DriveCommand {
    let duty = mix_with_params(speed, angle_deg, mixer.baseline, mixer.boost);
    DriveCommand {
        speed,
        angle_deg,
        duty_left: duty.left,
        duty_right: duty.right,
    }
}
