pub mod cli;
pub mod config;
pub mod drive;
pub mod messages;
pub mod panel;
pub mod runtime;
pub mod surface;
pub mod telemetry;
pub mod transport;
