//! Process configuration, read from command-line flags or the environment.

use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::buzzer::{DEFAULT_ADMIN_SECRET, DEFAULT_PORT, EngineConfig, KeepAlive};

/// Buzzer room server
#[derive(Parser, Debug, Clone)]
#[command(name = "buzzroom")]
#[command(about = "Multi-room buzzer server over WebSocket")]
#[command(version)]
pub struct Config {
    /// Interface to bind to
    #[arg(long, env = "BUZZROOM_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Admin secret stored for rooms created without a password
    #[arg(long, env = "BUZZROOM_ADMIN_SECRET", default_value = DEFAULT_ADMIN_SECRET)]
    pub default_admin_secret: String,

    /// Seconds between WebSocket pings
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before dropping the connection
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub pong_timeout_secs: u64,

    /// Send an `error` event back when an event is rejected
    #[arg(
        long,
        env = "BUZZROOM_REPORT_ERRORS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub report_errors: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            default_admin_secret: self.default_admin_secret.clone(),
            report_errors: self.report_errors,
        }
    }

    pub fn keepalive(&self) -> KeepAlive {
        KeepAlive {
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs),
        }
    }
}
