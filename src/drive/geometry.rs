// Joystick geometry: pointer position -> clamped stick, speed and steering angle
//
// Screen coordinates: x grows right, y grows down. The joystick is the upper
// half of a disk whose flat edge sits on the origin.

/// Fraction of the container width available to the stick radius
const WIDTH_FACTOR: f64 = 0.4;
/// Fraction of the container height available to the stick radius
const HEIGHT_FACTOR: f64 = 0.8;

/// Layout of the joystick inside its container, derived once per resize
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoystickGeometry {
    pub width: f64,
    pub height: f64,
    pub radius: f64,
    pub origin_x: f64,
    pub origin_y: f64,
}

/// Stick position for one sample of a drag gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickState {
    pub stick_x: f64,
    pub stick_y: f64,
    /// Point on the disk boundary along the pointer's angle
    pub extent_x: f64,
    pub extent_y: f64,
}

impl StickState {
    /// Stick resting at the origin
    pub fn neutral(geometry: &JoystickGeometry) -> Self {
        Self {
            stick_x: geometry.origin_x,
            stick_y: geometry.origin_y,
            extent_x: geometry.origin_x,
            extent_y: geometry.origin_y,
        }
    }

    pub fn is_neutral(&self, geometry: &JoystickGeometry) -> bool {
        *self == Self::neutral(geometry)
    }
}

impl JoystickGeometry {
    /// Distance of a point from the origin
    pub fn distance(&self, x: f64, y: f64) -> f64 {
        (x - self.origin_x).hypot(y - self.origin_y)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.distance(x, y) <= self.radius
    }
}

/// Compute the joystick layout for a container
///
/// Returns `None` when the dimensions leave no room for a stick
/// (zero, negative or non-finite radius).
pub fn compute_geometry(width: f64, height: f64) -> Option<JoystickGeometry> {
    let radius = (width * WIDTH_FACTOR).min(height * HEIGHT_FACTOR);
    if !(radius.is_finite() && radius > 0.0) {
        return None;
    }

    Some(JoystickGeometry {
        width,
        height,
        radius,
        origin_x: width / 2.0,
        origin_y: height - (height - radius) / 2.0,
    })
}

/// Clamp a raw pointer position onto the joystick half-disk
///
/// The pointer is first pulled up to the origin's row, so the stick never
/// points backwards. Outside the disk the stick snaps to the boundary.
pub fn clamp_to_disk(geometry: &JoystickGeometry, pointer_x: f64, pointer_y: f64) -> StickState {
    let x = pointer_x;
    let y = pointer_y.min(geometry.origin_y);

    let angle = (y - geometry.origin_y).atan2(x - geometry.origin_x);
    let extent_x = geometry.radius * angle.cos() + geometry.origin_x;
    let extent_y = geometry.radius * angle.sin() + geometry.origin_y;

    let (stick_x, stick_y) = if geometry.contains(x, y) {
        (x, y)
    } else {
        (extent_x, extent_y)
    };

    StickState {
        stick_x,
        stick_y,
        extent_x,
        extent_y,
    }
}

/// Stick deflection as a 0..=100 percentage of the radius
pub fn compute_speed(geometry: &JoystickGeometry, stick_x: f64, stick_y: f64) -> u8 {
    let percent = (100.0 * geometry.distance(stick_x, stick_y) / geometry.radius).round();
    // clamp_to_disk keeps this <= 100, apart from float noise on the boundary
    percent.clamp(0.0, 100.0) as u8
}

/// Steering angle in degrees, 0 = straight ahead, positive = right
///
/// `atan2` in screen space puts straight up at -90°. Adding 90 moves that to
/// 0; the left edge then lands on 270 and wraps to -90.
pub fn compute_angle_deg(geometry: &JoystickGeometry, extent_x: f64, extent_y: f64) -> i16 {
    let raw = (extent_y - geometry.origin_y)
        .atan2(extent_x - geometry.origin_x)
        .to_degrees()
        .round() as i16;

    let angle = raw + 90;
    if angle > 180 { angle - 360 } else { angle }
}
