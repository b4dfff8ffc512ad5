// Endpoint, duty-cycle and telemetry-scale configuration
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

// Device endpoint (the vehicle runs its own access point)
pub const DEFAULT_HOST: &str = "192.168.4.1";
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_PATH: &str = "/";

// Drive mixer
// Resting duty the firmware boots into and falls back to on disconnect
pub const NEUTRAL_DUTY: u8 = 40;
// Extra duty added at full stick deflection
pub const DUTY_BOOST: u8 = 40;
// Motor channels ignore anything above this
pub const MAX_DUTY: u8 = 100;

// Telemetry scaling
pub const BATTERY_SENTINEL: u32 = 552; // reported with no battery on the divider
pub const BATTERY_EMPTY_MV: u32 = 7000;
pub const BATTERY_SPAN_MV: u32 = 1400;
pub const CURRENT_SENTINEL: u32 = 402; // reported with the sense amp floating
pub const CURRENT_FULL_SCALE_MA: u32 = 6800;

// Terminal cells are roughly twice as tall as they are wide
pub const CELL_ASPECT: f64 = 2.0;

// Upper bound on how long the loop waits before redrawing
pub const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

pub const DEFAULT_LOG_FILE: &str = "drive-panel.log";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which outbound frame the stick drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandMode {
    /// `M<left>:<right>` per-motor duties
    #[default]
    Differential,
    /// `L<speed>` single value
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
        }
    }
}

impl EndpointConfig {
    /// WebSocket URL, e.g. `ws://192.168.4.1:80/`
    pub fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("ws://{}:{}{}", self.host, self.port, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub baseline: u8,
    pub boost: u8,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            baseline: NEUTRAL_DUTY,
            boost: DUTY_BOOST,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub battery_sentinel: u32,
    pub battery_empty_mv: u32,
    pub battery_span_mv: u32,
    pub current_sentinel: u32,
    pub current_full_scale_ma: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            battery_sentinel: BATTERY_SENTINEL,
            battery_empty_mv: BATTERY_EMPTY_MV,
            battery_span_mv: BATTERY_SPAN_MV,
            current_sentinel: CURRENT_SENTINEL,
            current_full_scale_ma: CURRENT_FULL_SCALE_MA,
        }
    }
}

/// Everything the panel needs, loaded from an optional JSON file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub endpoint: EndpointConfig,
    pub mixer: MixerConfig,
    pub telemetry: TelemetryConfig,
    pub command_mode: CommandMode,
    pub cell_aspect: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            mixer: MixerConfig::default(),
            telemetry: TelemetryConfig::default(),
            command_mode: CommandMode::default(),
            cell_aspect: CELL_ASPECT,
        }
    }
}

impl PanelConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let peak = u16::from(self.mixer.baseline) + u16::from(self.mixer.boost);
        if peak > u16::from(MAX_DUTY) {
            return Err(ConfigError::Invalid(format!(
                "mixer baseline + boost = {} exceeds max duty {}",
                peak, MAX_DUTY
            )));
        }
        if self.telemetry.battery_span_mv == 0 {
            return Err(ConfigError::Invalid(
                "telemetry.battery_span_mv must be positive".to_string(),
            ));
        }
        if self.telemetry.current_full_scale_ma == 0 {
            return Err(ConfigError::Invalid(
                "telemetry.current_full_scale_ma must be positive".to_string(),
            ));
        }
        if !(self.cell_aspect.is_finite() && self.cell_aspect > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "cell_aspect must be positive, got {}",
                self.cell_aspect
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url() {
        assert_eq!(PanelConfig::default().endpoint.url(), "ws://192.168.4.1:80/");
    }

    #[test]
    fn test_path_without_slash() {
        let endpoint = EndpointConfig {
            host: "localhost".to_string(),
            port: 9000,
            path: "ws".to_string(),
        };
        assert_eq!(endpoint.url(), "ws://localhost:9000/ws");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PanelConfig::from_json(
            r#"{ "endpoint": { "port": 8080 }, "command_mode": "legacy" }"#,
        )
        .unwrap();
        assert_eq!(config.endpoint.host, DEFAULT_HOST);
        assert_eq!(config.endpoint.port, 8080);
        assert_eq!(config.command_mode, CommandMode::Legacy);
        assert_eq!(config.mixer, MixerConfig::default());
        assert_eq!(config.telemetry.battery_sentinel, 552);
    }

    #[test]
    fn test_rejects_duty_overflow() {
        let err = PanelConfig::from_json(r#"{ "mixer": { "baseline": 60, "boost": 50 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_scale() {
        let err = PanelConfig::from_json(r#"{ "telemetry": { "battery_span_mv": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            PanelConfig::from_json("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }
}
