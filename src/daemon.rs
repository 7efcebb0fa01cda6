//! Tor daemon control: restarting the service and checking circuit status.
//!
//! Restarts are delegated to an external process supervisor (by default
//! `supervisorctl restart tor1`). Status is read from Tor's control port with
//! `GETINFO status/circuit-established`.
//!
//! # Status Check
//!
//! ```text
//!   restart ──▶ settle delay ──▶ connect ──▶ authenticate ──▶ GETINFO
//!                                   │             │              │
//!                                   └──── any error ─────────────┤
//!                                                                ▼
//!                                  reply contains "=1"?  yes ──▶ Established
//!                                                        no  ──▶ NotEstablished
//! ```
//!
//! The status check fails closed: a refused connection, an authentication
//! failure, a timeout and an explicit `=0` all come back as
//! [`DaemonState::NotEstablished`]. The cause is logged, not returned.
//!
//! # What This Module Does NOT Do
//!
//! - **Retry restarts**: a failed restart is reported once
//! - **Signal Tor directly**: `SIGHUP`/`RELOAD` are not used, the supervisor owns the process

use std::process::Stdio;
use std::time::Duration;

use stem_rs::controller::Controller;
use tokio::process::Command;

use crate::api::SecurePassword;
use crate::config::{DaemonConfig, LogLevel};
use crate::error::{Error, Result};
use crate::logger::plog;

/// GETINFO key reporting whether Tor has built a circuit.
pub const CIRCUIT_ESTABLISHED_KEY: &str = "status/circuit-established";

/// Circuit state of the Tor daemon as last observed.
///
/// Transient; derived from a single control-port query and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaemonState {
    /// Not queried yet.
    #[default]
    Unknown,
    /// Tor reports a usable circuit.
    Established,
    /// Tor reports no circuit, or the query failed.
    NotEstablished,
}

impl DaemonState {
    /// Classifies a `GETINFO status/circuit-established` reply.
    ///
    /// Accepts the raw wire form (`250-status/circuit-established=1`), the
    /// `key=value` form, and a bare value, line by line. Only a value of
    /// exactly `1` counts as established.
    ///
    /// # Example
    ///
    /// ```rust
    /// use torbridge_rs::DaemonState;
    ///
    /// assert_eq!(
    ///     DaemonState::from_status_reply("250-status/circuit-established=1\r\n250 OK\r\n"),
    ///     DaemonState::Established
    /// );
    /// assert_eq!(
    ///     DaemonState::from_status_reply("250-status/circuit-established=0"),
    ///     DaemonState::NotEstablished
    /// );
    /// ```
    pub fn from_status_reply(reply: &str) -> Self {
        let established = reply.lines().any(|line| {
            let line = line.trim();
            let value = line
                .strip_prefix("250-")
                .or_else(|| line.strip_prefix("250 "))
                .unwrap_or(line);
            let value = value
                .strip_prefix(CIRCUIT_ESTABLISHED_KEY)
                .and_then(|rest| rest.strip_prefix('='))
                .unwrap_or(value);
            value == "1"
        });

        if established {
            DaemonState::Established
        } else {
            DaemonState::NotEstablished
        }
    }

    /// Whether this state is [`DaemonState::Established`].
    pub fn is_established(self) -> bool {
        self == DaemonState::Established
    }
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonState::Unknown => write!(f, "unknown"),
            DaemonState::Established => write!(f, "established"),
            DaemonState::NotEstablished => write!(f, "not established"),
        }
    }
}

/// Operations the orchestrator needs from the Tor daemon.
#[allow(async_fn_in_trait)]
pub trait DaemonControl {
    /// Restarts the daemon. Not retried on failure.
    async fn restart(&self) -> Result<()>;

    /// Waits `settle`, then queries circuit status once. Never fails.
    async fn await_status(&self, settle: Duration) -> DaemonState;
}

/// Tor managed by an external supervisor, queried over its control port.
#[derive(Debug)]
pub struct TorDaemon {
    supervisor_command: Vec<String>,
    service_name: String,
    control_addr: String,
    password: Option<SecurePassword>,
    status_timeout: Duration,
}

impl TorDaemon {
    /// Builds a daemon handle from configuration.
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self {
            supervisor_command: config.supervisor_command.clone(),
            service_name: config.service_name.clone(),
            control_addr: format!("{}:{}", config.control_ip, config.control_port),
            password: config.control_pass.clone().map(SecurePassword::new),
            status_timeout: config.status_timeout(),
        }
    }

    /// `host:port` of the control port.
    pub fn control_addr(&self) -> &str {
        &self.control_addr
    }

    async fn query_status(&self) -> Result<String> {
        let mut controller = Controller::from_port(
            self.control_addr
                .parse()
                .map_err(|e| Error::Config(format!("Invalid control address: {}", e)))?,
        )
        .await?;

        controller
            .authenticate(self.password.as_ref().map(SecurePassword::as_str))
            .await?;

        let reply = controller.get_info(CIRCUIT_ESTABLISHED_KEY).await?;
        Ok(reply)
    }
}

impl DaemonControl for TorDaemon {
    async fn restart(&self) -> Result<()> {
        let (program, args) = self
            .supervisor_command
            .split_first()
            .ok_or_else(|| Error::Config("empty supervisor command".to_string()))?;

        plog(
            LogLevel::Notice,
            &format!("Restarting Tor ({})...", self.service_name),
        );

        let output = Command::new(program)
            .args(args)
            .arg(&self.service_name)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Daemon(format!("cannot run {}: {}", program, e)))?;

        if output.status.success() {
            plog(LogLevel::Notice, "Tor restarted");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            plog(
                LogLevel::Error,
                &format!("Failed to restart Tor: {} {}", output.status, detail),
            );
            Err(Error::Daemon(format!(
                "{} {} exited with {}: {}",
                program, self.service_name, output.status, detail
            )))
        }
    }

    async fn await_status(&self, settle: Duration) -> DaemonState {
        if !settle.is_zero() {
            plog(
                LogLevel::Notice,
                &format!(
                    "Waiting {}s for Tor to establish circuit...",
                    settle.as_secs()
                ),
            );
            tokio::time::sleep(settle).await;
        }

        let state = match tokio::time::timeout(self.status_timeout, self.query_status()).await {
            Ok(Ok(reply)) => {
                plog(
                    LogLevel::Debug,
                    &format!("{} reply: {}", CIRCUIT_ESTABLISHED_KEY, reply.trim()),
                );
                DaemonState::from_status_reply(&reply)
            }
            Ok(Err(e)) => {
                plog(LogLevel::Warn, &format!("Error checking Tor status: {}", e));
                DaemonState::NotEstablished
            }
            Err(_) => {
                plog(
                    LogLevel::Warn,
                    &format!(
                        "Tor status query to {} timed out after {}s",
                        self.control_addr,
                        self.status_timeout.as_secs()
                    ),
                );
                DaemonState::NotEstablished
            }
        };

        match state {
            DaemonState::Established => {
                plog(LogLevel::Notice, "Tor circuit established successfully")
            }
            _ => plog(LogLevel::Warn, "Tor circuit not established"),
        }
        state
    }
}
