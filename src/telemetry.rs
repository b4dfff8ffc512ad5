// Decoding of battery and motor-current status frames
//
// The firmware reports raw millivolt/milliamp integers. Each channel has a
// sentinel value it emits when the sensor reads nothing; that is shown as 0.

use std::num::ParseIntError;

use serde::Serialize;

use crate::config::TelemetryConfig;

/// Tag character the firmware puts in front of (and sometimes inside) current frames
const CURRENT_TAG: char = 'A';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Frame {frame:?} carries no value")]
    Empty { frame: String },

    #[error("Invalid number {field:?}: {source}")]
    InvalidNumber {
        field: String,
        source: ParseIntError,
    },

    #[error("Expected {expected} fields in {frame:?}, found {found}")]
    FieldCount {
        frame: String,
        expected: usize,
        found: usize,
    },

    #[error("Unknown frame tag in {frame:?}")]
    UnknownTag { frame: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryReading {
    pub voltage_millivolts: u32,
    /// 0..=100
    pub level_percent: u8,
}

impl BatteryReading {
    pub fn volts(&self) -> f64 {
        f64::from(self.voltage_millivolts) / 1000.0
    }

    /// e.g. `8.400V`
    pub fn display_voltage(&self) -> String {
        format!("{:.3}V", self.volts())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrentReading {
    pub left_milliamps: u32,
    pub right_milliamps: u32,
    /// Not clamped: readings above full scale exceed 100
    pub left_level_percent: u32,
    pub right_level_percent: u32,
}

impl CurrentReading {
    pub fn left_amps(&self) -> f64 {
        f64::from(self.left_milliamps) / 1000.0
    }

    pub fn right_amps(&self) -> f64 {
        f64::from(self.right_milliamps) / 1000.0
    }

    pub fn display_left(&self) -> String {
        format!("{:.3}A", self.left_amps())
    }

    pub fn display_right(&self) -> String {
        format!("{:.3}A", self.right_amps())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryReading {
    Battery(BatteryReading),
    Currents(CurrentReading),
}

fn without_sentinel(raw: u32, sentinel: u32) -> u32 {
    if raw == sentinel { 0 } else { raw }
}

fn parse_field(field: &str) -> Result<u32, DecodeError> {
    let trimmed = field.trim();
    trimmed
        .parse::<u32>()
        .map_err(|source| DecodeError::InvalidNumber {
            field: trimmed.to_string(),
            source,
        })
}

/// Decode a battery value
///
/// Everything but digits and `.` is discarded, so both `V8400` and `8400`
/// are accepted. A fractional part is ignored.
pub fn decode_battery(raw: &str, config: &TelemetryConfig) -> Result<BatteryReading, DecodeError> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let integer = digits.split('.').next().unwrap_or_default();
    if integer.is_empty() {
        return Err(DecodeError::Empty {
            frame: raw.to_string(),
        });
    }

    let millivolts = without_sentinel(parse_field(integer)?, config.battery_sentinel);
    let level = (f64::from(millivolts) - f64::from(config.battery_empty_mv))
        / f64::from(config.battery_span_mv)
        * 100.0;

    Ok(BatteryReading {
        voltage_millivolts: millivolts,
        level_percent: level.round().clamp(0.0, 100.0) as u8,
    })
}

/// Decode a `left,right` current pair
///
/// Every tag character is stripped before splitting, wherever it appears.
pub fn decode_currents(raw: &str, config: &TelemetryConfig) -> Result<CurrentReading, DecodeError> {
    let stripped: String = raw.chars().filter(|&c| c != CURRENT_TAG).collect();
    if stripped.trim().is_empty() {
        return Err(DecodeError::Empty {
            frame: raw.to_string(),
        });
    }

    let fields: Vec<&str> = stripped.split(',').collect();
    if fields.len() != 2 {
        return Err(DecodeError::FieldCount {
            frame: raw.to_string(),
            expected: 2,
            found: fields.len(),
        });
    }

    let left = without_sentinel(parse_field(fields[0])?, config.current_sentinel);
    let right = without_sentinel(parse_field(fields[1])?, config.current_sentinel);
    let level = |milliamps: u32| {
        (f64::from(milliamps) / f64::from(config.current_full_scale_ma) * 100.0).round() as u32
    };

    Ok(CurrentReading {
        left_milliamps: left,
        right_milliamps: right,
        left_level_percent: level(left),
        right_level_percent: level(right),
    })
}
