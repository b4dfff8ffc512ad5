// Command-line options; anything given here overrides the config file
use std::path::PathBuf;

use clap::Parser;

use crate::config::{CommandMode, ConfigError, DEFAULT_LOG_FILE, PanelConfig};

#[derive(Debug, Parser)]
#[command(version, about = "Terminal joystick for a WebSocket-driven two-motor vehicle")]
pub struct Cli {
    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Device host name or address
    #[arg(long)]
    pub host: Option<String>,

    /// Device WebSocket port
    #[arg(long)]
    pub port: Option<u16>,

    /// WebSocket path on the device
    #[arg(long)]
    pub path: Option<String>,

    /// Send single-value L<speed> frames instead of M<left>:<right>
    #[arg(long)]
    pub legacy: bool,

    /// Where log output goes (the terminal is taken by the panel)
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,
}

impl Cli {
    /// Load the config file (if any) and apply command-line overrides
    pub fn resolve_config(&self) -> Result<PanelConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => PanelConfig::load(path)?,
            None => PanelConfig::default(),
        };

        if let Some(host) = &self.host {
            config.endpoint.host = host.clone();
        }
        if let Some(port) = self.port {
            config.endpoint.port = port;
        }
        if let Some(path) = &self.path {
            config.endpoint.path = path.clone();
        }
        if self.legacy {
            config.command_mode = CommandMode::Legacy;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["drive-panel"]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config, PanelConfig::default());
        assert_eq!(cli.log_file, PathBuf::from(DEFAULT_LOG_FILE));
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "drive-panel",
            "--host",
            "rover.local",
            "--port",
            "8080",
            "--legacy",
        ]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.endpoint.url(), "ws://rover.local:8080/");
        assert_eq!(config.command_mode, CommandMode::Legacy);
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::parse_from(["drive-panel", "--config", "/nonexistent/panel.json"]);
        assert!(matches!(cli.resolve_config(), Err(ConfigError::Io { .. })));
    }
}
