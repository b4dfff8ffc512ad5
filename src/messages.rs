// Wire frames exchanged with the device
//
// Every frame is ASCII text whose first character names its type.

use std::fmt;

use crate::config::TelemetryConfig;
use crate::drive::DutyPair;
use crate::telemetry::{
    BatteryReading, CurrentReading, DecodeError, TelemetryReading, decode_battery,
    decode_currents,
};

pub const TAG_DRIVE: char = 'M';
pub const TAG_LEGACY_SPEED: char = 'L';
pub const TAG_BATTERY: char = 'V';
pub const TAG_CURRENTS: char = 'A';

/// Command from panel -> device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundFrame {
    /// `M<left>:<right>`
    Drive(DutyPair),
    /// `L<speed>`
    LegacySpeed(u8),
}

impl OutboundFrame {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a command frame, as the device echoes them back
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let mut chars = text.chars();
        match chars.next() {
            Some(TAG_DRIVE) => {
                let body = chars.as_str();
                let fields: Vec<&str> = body.split(':').collect();
                if fields.len() != 2 {
                    return Err(DecodeError::FieldCount {
                        frame: text.to_string(),
                        expected: 2,
                        found: fields.len(),
                    });
                }
                Ok(Self::Drive(DutyPair {
                    left: parse_u8(fields[0])?,
                    right: parse_u8(fields[1])?,
                }))
            }
            Some(TAG_LEGACY_SPEED) => Ok(Self::LegacySpeed(parse_u8(chars.as_str())?)),
            _ => Err(DecodeError::UnknownTag {
                frame: text.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drive(duty) => write!(f, "{}{}:{}", TAG_DRIVE, duty.left, duty.right),
            Self::LegacySpeed(speed) => write!(f, "{}{}", TAG_LEGACY_SPEED, speed),
        }
    }
}

fn parse_u8(field: &str) -> Result<u8, DecodeError> {
    let trimmed = field.trim();
    trimmed
        .parse::<u8>()
        .map_err(|source| DecodeError::InvalidNumber {
            field: trimmed.to_string(),
            source,
        })
}

/// Frame from device -> panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame {
    Battery(BatteryReading),
    Currents(CurrentReading),
    /// The device re-broadcasts every command it accepts
    CommandEcho(OutboundFrame),
}

impl InboundFrame {
    /// Classify a frame by its tag and decode it
    ///
    /// Returns `Ok(None)` for empty frames and unknown tags.
    pub fn parse(text: &str, config: &TelemetryConfig) -> Result<Option<Self>, DecodeError> {
        let frame = match text.chars().next() {
            Some(TAG_BATTERY) => Self::Battery(decode_battery(text, config)?),
            Some(TAG_CURRENTS) => Self::Currents(decode_currents(text, config)?),
            Some(TAG_DRIVE | TAG_LEGACY_SPEED) => Self::CommandEcho(OutboundFrame::parse(text)?),
            _ => return Ok(None),
        };
        Ok(Some(frame))
    }

    pub fn telemetry(&self) -> Option<TelemetryReading> {
        match *self {
            Self::Battery(reading) => Some(TelemetryReading::Battery(reading)),
            Self::Currents(reading) => Some(TelemetryReading::Currents(reading)),
            Self::CommandEcho(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_drive() {
        let frame = OutboundFrame::Drive(DutyPair { left: 80, right: 55 });
        assert_eq!(frame.encode(), "M80:55");
    }

    #[test]
    fn test_encode_legacy() {
        assert_eq!(OutboundFrame::LegacySpeed(0).encode(), "L0");
        assert_eq!(OutboundFrame::LegacySpeed(100).encode(), "L100");
    }

    #[test]
    fn test_parse_echo() {
        assert_eq!(
            OutboundFrame::parse("M40:72").unwrap(),
            OutboundFrame::Drive(DutyPair { left: 40, right: 72 })
        );
        assert_eq!(
            OutboundFrame::parse("L17").unwrap(),
            OutboundFrame::LegacySpeed(17)
        );
        assert!(OutboundFrame::parse("M40").is_err());
        assert!(OutboundFrame::parse("Lx").is_err());
        assert!(matches!(
            OutboundFrame::parse("V8400"),
            Err(DecodeError::UnknownTag { .. })
        ));
    }

    #[test]
    fn test_inbound_dispatch() {
        let cfg = TelemetryConfig::default();

        let battery = InboundFrame::parse("V8400", &cfg).unwrap().unwrap();
        assert!(matches!(battery, InboundFrame::Battery(r) if r.level_percent == 100));

        let currents = InboundFrame::parse("A402,1000", &cfg).unwrap().unwrap();
        assert!(matches!(
            currents.telemetry(),
            Some(TelemetryReading::Currents(r)) if r.right_level_percent == 15
        ));

        let echo = InboundFrame::parse("M40:40", &cfg).unwrap().unwrap();
        assert_eq!(echo.telemetry(), None);
    }

    #[test]
    fn test_inbound_unknown_is_ignored() {
        let cfg = TelemetryConfig::default();
        assert_eq!(InboundFrame::parse("Xhello", &cfg).unwrap(), None);
        assert_eq!(InboundFrame::parse("", &cfg).unwrap(), None);
        assert_eq!(InboundFrame::parse("v8400", &cfg).unwrap(), None);
    }

    #[test]
    fn test_inbound_malformed_is_error() {
        let cfg = TelemetryConfig::default();
        assert!(InboundFrame::parse("A100", &cfg).is_err());
        assert!(InboundFrame::parse("V", &cfg).is_err());
    }
}
