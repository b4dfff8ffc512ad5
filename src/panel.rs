// Panel state: joystick layout, active gesture, latest telemetry
//
// Every input handler returns the frame to send, so the event loop only
// forwards it. Nothing here touches the terminal or the socket.

use tracing::{debug, warn};

use crate::config::{CommandMode, PanelConfig};
use crate::drive::{
    DriveCommand, JoystickGeometry, StickState, clamp_to_disk, compute_geometry, drive_command,
};
use crate::messages::{InboundFrame, OutboundFrame};
use crate::telemetry::{BatteryReading, CurrentReading, TelemetryReading};
use crate::transport::ConnectionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Dragging,
}

pub struct Panel {
    config: PanelConfig,
    geometry: Option<JoystickGeometry>,
    stick: Option<StickState>,
    gesture: GestureState,
    command: DriveCommand,
    battery: Option<BatteryReading>,
    currents: Option<CurrentReading>,
    connection: ConnectionState,
}

impl Panel {
    /// Panel with no layout yet; call `resize` before feeding pointer events
    pub fn new(config: PanelConfig) -> Self {
        let command = DriveCommand::neutral(&config.mixer);
        Self {
            config,
            geometry: None,
            stick: None,
            gesture: GestureState::Idle,
            command,
            battery: None,
            currents: None,
            connection: ConnectionState::Connecting,
        }
    }

    /// Recompute the layout for a new container size
    ///
    /// Any gesture in progress is dropped and the stick returns to neutral.
    pub fn resize(&mut self, width: f64, height: f64) -> OutboundFrame {
        self.geometry = compute_geometry(width, height);
        if self.geometry.is_none() {
            debug!("Container {}x{} too small for a joystick", width, height);
        }
        self.gesture = GestureState::Idle;
        self.neutralize()
    }

    /// Pointer went down
    pub fn press(&mut self, x: f64, y: f64) -> OutboundFrame {
        self.gesture = GestureState::Dragging;
        self.tilt(x, y)
    }

    /// Pointer moved; only produces a frame while dragging
    pub fn drag(&mut self, x: f64, y: f64) -> Option<OutboundFrame> {
        match self.gesture {
            GestureState::Dragging => Some(self.tilt(x, y)),
            GestureState::Idle => None,
        }
    }

    /// Pointer released or left the surface
    pub fn release(&mut self) -> OutboundFrame {
        self.gesture = GestureState::Idle;
        self.neutralize()
    }

    /// Frame for the command currently held
    pub fn current_frame(&self) -> OutboundFrame {
        self.frame_for(&self.command)
    }

    fn tilt(&mut self, x: f64, y: f64) -> OutboundFrame {
        let Some(geometry) = self.geometry else {
            return self.neutralize();
        };

        let stick = clamp_to_disk(&geometry, x, y);
        self.command = drive_command(&geometry, &stick, &self.config.mixer);
        self.stick = Some(stick);
        self.current_frame()
    }

    fn neutralize(&mut self) -> OutboundFrame {
        self.stick = self.geometry.as_ref().map(StickState::neutral);
        self.command = DriveCommand::neutral(&self.config.mixer);
        self.current_frame()
    }

    fn frame_for(&self, command: &DriveCommand) -> OutboundFrame {
        match self.config.command_mode {
            CommandMode::Differential => OutboundFrame::Drive(command.duty()),
            CommandMode::Legacy => OutboundFrame::LegacySpeed(command.speed),
        }
    }

    /// Handle one inbound frame
    ///
    /// Malformed frames are logged and skipped; the previous reading is kept.
    pub fn on_frame(&mut self, text: &str) -> Option<TelemetryReading> {
        let frame = match InboundFrame::parse(text, &self.config.telemetry) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Ignoring frame {:?}", text);
                return None;
            }
            Err(e) => {
                warn!("Failed to decode frame: {}", e);
                return None;
            }
        };

        match frame {
            InboundFrame::Battery(reading) => self.battery = Some(reading),
            InboundFrame::Currents(reading) => self.currents = Some(reading),
            InboundFrame::CommandEcho(echo) => debug!("Device accepted {}", echo),
        }
        frame.telemetry()
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn geometry(&self) -> Option<&JoystickGeometry> {
        self.geometry.as_ref()
    }

    pub fn stick(&self) -> Option<&StickState> {
        self.stick.as_ref()
    }

    pub fn gesture(&self) -> GestureState {
        self.gesture
    }

    pub fn command(&self) -> &DriveCommand {
        &self.command
    }

    pub fn battery(&self) -> Option<&BatteryReading> {
        self.battery.as_ref()
    }

    pub fn currents(&self) -> Option<&CurrentReading> {
        self.currents.as_ref()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DutyPair;

    const NEUTRAL: OutboundFrame = OutboundFrame::Drive(DutyPair { left: 40, right: 40 });

    fn panel() -> Panel {
        let mut panel = Panel::new(PanelConfig::default());
        panel.resize(200.0, 200.0);
        panel
    }

    #[test]
    fn test_starts_neutral() {
        let panel = Panel::new(PanelConfig::default());
        assert_eq!(panel.current_frame(), NEUTRAL);
        assert_eq!(panel.gesture(), GestureState::Idle);
        assert!(panel.geometry().is_none());
    }

    #[test]
    fn test_press_drives_forward() {
        let mut panel = panel();
        let frame = panel.press(100.0, 0.0);
        assert_eq!(frame, OutboundFrame::Drive(DutyPair { left: 80, right: 80 }));
        assert_eq!(panel.gesture(), GestureState::Dragging);
        assert_eq!(panel.command().speed, 100);
    }

    #[test]
    fn test_press_at_origin_is_neutral() {
        let mut panel = panel();
        let geometry = *panel.geometry().unwrap();
        assert_eq!(panel.press(geometry.origin_x, geometry.origin_y), NEUTRAL);
        assert_eq!(*panel.command(), DriveCommand::neutral(&panel.config().mixer));
    }

    #[test]
    fn test_drag_without_press_is_ignored() {
        let mut panel = panel();
        assert_eq!(panel.drag(100.0, 0.0), None);
        assert_eq!(panel.current_frame(), NEUTRAL);
    }

    #[test]
    fn test_release_neutralizes() {
        let mut panel = panel();
        panel.press(150.0, 100.0);
        assert_eq!(panel.release(), NEUTRAL);
        let geometry = *panel.geometry().unwrap();
        assert!(panel.stick().unwrap().is_neutral(&geometry));
        assert_eq!(panel.drag(150.0, 100.0), None);
    }

    #[test]
    fn test_resize_mid_drag_then_release() {
        let mut panel = panel();
        panel.press(180.0, 90.0);
        assert_eq!(panel.resize(400.0, 120.0), NEUTRAL);
        assert_eq!(panel.gesture(), GestureState::Idle);
        assert_eq!(panel.release(), NEUTRAL);

        let geometry = *panel.geometry().unwrap();
        assert_eq!(geometry.radius, 96.0);
        assert!(panel.stick().unwrap().is_neutral(&geometry));
        assert_eq!(*panel.command(), DriveCommand::neutral(&panel.config().mixer));
    }

    #[test]
    fn test_degenerate_layout_emits_neutral() {
        let mut panel = Panel::new(PanelConfig::default());
        assert_eq!(panel.resize(0.0, 0.0), NEUTRAL);
        assert_eq!(panel.press(10.0, 10.0), NEUTRAL);
        assert!(panel.stick().is_none());
    }

    #[test]
    fn test_legacy_mode() {
        let mut config = PanelConfig::default();
        config.command_mode = CommandMode::Legacy;
        let mut panel = Panel::new(config);
        assert_eq!(panel.resize(200.0, 200.0), OutboundFrame::LegacySpeed(0));
        assert_eq!(panel.press(100.0, 100.0), OutboundFrame::LegacySpeed(50));
        assert_eq!(panel.release(), OutboundFrame::LegacySpeed(0));
    }

    #[test]
    fn test_telemetry_updates() {
        let mut panel = panel();
        assert!(matches!(
            panel.on_frame("V8400"),
            Some(TelemetryReading::Battery(_))
        ));
        assert_eq!(panel.battery().unwrap().level_percent, 100);

        panel.on_frame("A402,1000");
        let currents = panel.currents().unwrap();
        assert_eq!(currents.left_milliamps, 0);
        assert_eq!(currents.right_level_percent, 15);
    }

    #[test]
    fn test_bad_frame_keeps_previous_reading() {
        let mut panel = panel();
        panel.on_frame("V7700");
        assert_eq!(panel.on_frame("Vxx"), None);
        assert_eq!(panel.on_frame("A12"), None);
        assert_eq!(panel.battery().unwrap().voltage_millivolts, 7700);
        assert!(panel.currents().is_none());
    }

    #[test]
    fn test_echo_and_unknown_frames() {
        let mut panel = panel();
        assert_eq!(panel.on_frame("M80:80"), None);
        assert_eq!(panel.on_frame("hello"), None);
        assert!(panel.battery().is_none());
    }
}
