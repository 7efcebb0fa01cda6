//! Configuration management for torbridge-rs.
//!
//! This module provides configuration parsing from TOML files, command-line arguments,
//! and environment variables. Configuration is applied in order: defaults → config file →
//! command-line arguments, with later sources overriding earlier ones.
//!
//! # Configuration Flow
//!
//! ```text
//!     ┌─────────────────┐
//!     │ Config::default │ ◄── Start with sensible defaults
//!     └────────┬────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐     ┌─────────────────┐
//!     │ Config file     │ ◄───│ torbridge.conf  │  (TOML format)
//!     │ exists?         │     │ or --config     │
//!     └────────┬────────┘     └─────────────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐     ┌─────────────────┐
//!     │ Apply CLI args  │ ◄───│ --torrc         │
//!     │ and env vars    │     │ TORBRIDGE_TORRC │
//!     └────────┬────────┘     └─────────────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐
//!     │ Validate        │
//!     └─────────────────┘
//! ```
//!
//! # Example Configuration File
//!
//! ```toml
//! torrc_path = "/etc/tor/torrc1"
//! bridge_url = "https://bridges.torproject.org/bridges?transport=obfs4"
//! fetch_timeout_secs = 10
//! bridge_limit = 3
//! transport_plugin = "/usr/bin/obfs4proxy"
//! loglevel = "notice"  # debug, info, notice, warn, error
//! # logfile = "/var/log/torbridge.log"
//! # logfile = ":syslog:"
//!
//! [probe]
//! enabled = true
//! timeout_secs = 5
//! concurrency = 5
//!
//! [daemon]
//! control_ip = "127.0.0.1"
//! control_port = 9051
//! # control_pass = "my_password"
//! supervisor_command = ["supervisorctl", "restart"]
//! service_name = "tor1"
//! settle_secs = 30
//! status_timeout_secs = 5
//! ```
//!
//! # What This Module Does NOT Do
//!
//! - **Parse torrc**: see [`crate::torrc`] for the Tor configuration file itself
//! - **Config file watching**: every invocation is a single run
//! - **Encrypted config files**: passwords are stored in plaintext

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Log level for torbridge-rs output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Low-level debugging information.
    Debug,
    /// Informational messages about normal operation.
    Info,
    /// Notable events that may be of interest.
    #[default]
    Notice,
    /// Warning conditions that don't prevent operation.
    Warn,
    /// Error conditions that may impair functionality.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Notice => write!(f, "NOTICE"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "NOTICE" => Ok(LogLevel::Notice),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "ERR" => Ok(LogLevel::Error),
            _ => Err(Error::Config(format!("invalid log level: {}", s))),
        }
    }
}

/// Reachability probe settings.
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `enabled` | true | Probe bridges before configuring them |
/// | `timeout_secs` | 5 | Per-probe TCP connect timeout |
/// | `concurrency` | 5 | Number of probe workers |
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// Probe bridges before writing them. When false every fetched bridge is used.
    #[serde(default = "default_probe_enabled")]
    pub enabled: bool,
    /// Per-probe TCP connect timeout in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum number of probes in flight.
    #[serde(default = "default_probe_concurrency")]
    pub concurrency: usize,
}

fn default_probe_enabled() -> bool {
    true
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_probe_concurrency() -> usize {
    5
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: default_probe_enabled(),
            timeout_secs: default_probe_timeout_secs(),
            concurrency: default_probe_concurrency(),
        }
    }
}

impl ProbeConfig {
    /// Per-probe timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Tor daemon control settings.
///
/// Covers both halves of the daemon controller: how to restart the service
/// through the external supervisor, and how to reach the control port to
/// ask whether a circuit has been established.
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `control_ip` | `127.0.0.1` | Control port address |
/// | `control_port` | 9051 | Control port number |
/// | `control_pass` | none | HashedControlPassword secret |
/// | `supervisor_command` | `["supervisorctl", "restart"]` | Restart command prefix |
/// | `service_name` | `tor1` | Appended to the restart command |
/// | `settle_secs` | 30 | Wait after restart before querying status |
/// | `status_timeout_secs` | 5 | Timeout for the status query |
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// IP address of the Tor control port.
    #[serde(default = "default_control_ip")]
    pub control_ip: String,
    /// Port number of the Tor control port.
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    /// Password for Tor control authentication.
    #[serde(default)]
    pub control_pass: Option<String>,
    /// Program and leading arguments used to restart the service.
    #[serde(default = "default_supervisor_command")]
    pub supervisor_command: Vec<String>,
    /// Name of the supervised Tor service.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Seconds to wait after a restart before querying circuit status.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Timeout in seconds for the control-port status query.
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,
}

fn default_control_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_control_port() -> u16 {
    9051
}
fn default_supervisor_command() -> Vec<String> {
    vec!["supervisorctl".to_string(), "restart".to_string()]
}
fn default_service_name() -> String {
    "tor1".to_string()
}
fn default_settle_secs() -> u64 {
    30
}
fn default_status_timeout_secs() -> u64 {
    5
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            control_ip: default_control_ip(),
            control_port: default_control_port(),
            control_pass: None,
            supervisor_command: default_supervisor_command(),
            service_name: default_service_name(),
            settle_secs: default_settle_secs(),
            status_timeout_secs: default_status_timeout_secs(),
        }
    }
}

impl DaemonConfig {
    /// Settle delay as a [`Duration`].
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Status query timeout as a [`Duration`].
    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }
}

/// Main configuration struct for torbridge-rs.
///
/// A single value of this type is handed to every component; nothing in the
/// crate reads configuration from global state.
///
/// # Example
///
/// ```rust
/// use torbridge_rs::Config;
/// use std::path::PathBuf;
///
/// let mut config = Config::default();
/// config.torrc_path = PathBuf::from("/tmp/torrc");
/// config.bridge_limit = 5;
/// config.probe.enabled = false;
///
/// config.validate().expect("Invalid configuration");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Path of the torrc to rewrite.
    #[serde(default = "default_torrc_path")]
    pub torrc_path: PathBuf,
    /// URL returning a page with obfs4 bridge lines.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// HTTP timeout for the bridge list download.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Maximum number of `Bridge` lines written to the torrc.
    #[serde(default = "default_bridge_limit")]
    pub bridge_limit: usize,
    /// Path of the obfs4 pluggable transport binary.
    #[serde(default = "default_transport_plugin")]
    pub transport_plugin: PathBuf,
    /// Log level for output.
    #[serde(default)]
    pub loglevel: LogLevel,
    /// Log file path. None for stdout, ":syslog:" for syslog.
    #[serde(default)]
    pub logfile: Option<String>,
    /// Reachability probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Tor daemon control settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

fn default_torrc_path() -> PathBuf {
    PathBuf::from("/etc/tor/torrc1")
}
fn default_bridge_url() -> String {
    crate::bridges::DEFAULT_BRIDGE_URL.to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_bridge_limit() -> usize {
    3
}
fn default_transport_plugin() -> PathBuf {
    PathBuf::from("/usr/bin/obfs4proxy")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            torrc_path: default_torrc_path(),
            bridge_url: default_bridge_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            bridge_limit: default_bridge_limit(),
            transport_plugin: default_transport_plugin(),
            loglevel: LogLevel::default(),
            logfile: None,
            probe: ProbeConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    /// Returns [`Error::Config`] if the TOML is invalid.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// HTTP timeout for the bridge list download.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.bridge_limit == 0 {
            return Err(Error::Config("bridge_limit must be at least 1".to_string()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config(
                "fetch_timeout_secs must be positive".to_string(),
            ));
        }
        if self.probe.concurrency == 0 {
            return Err(Error::Config(
                "probe.concurrency must be at least 1".to_string(),
            ));
        }
        if self.probe.timeout_secs == 0 {
            return Err(Error::Config(
                "probe.timeout_secs must be positive".to_string(),
            ));
        }
        if self.daemon.status_timeout_secs == 0 {
            return Err(Error::Config(
                "daemon.status_timeout_secs must be positive".to_string(),
            ));
        }
        if self.daemon.supervisor_command.is_empty() {
            return Err(Error::Config(
                "daemon.supervisor_command must name a program".to_string(),
            ));
        }
        if self.daemon.service_name.trim().is_empty() {
            return Err(Error::Config(
                "daemon.service_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a single invocation should do.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch, probe and configure bridges, falling back to direct connection.
    Auto,
    /// Fetch and probe bridges, then list the reachable ones.
    Fetch,
    /// Remove bridge configuration and restart Tor.
    Disable,
    /// Ask Tor whether a circuit is established.
    Check,
    /// Write the default configuration to a file and exit.
    GenerateConfig {
        /// Output path for the generated TOML.
        path: PathBuf,
    },
}

/// Command-line arguments for torbridge-rs.
#[derive(Parser, Debug)]
#[command(name = "torbridge-rs")]
#[command(about = "Keep Tor connected through fresh, reachable obfs4 bridges")]
#[command(version)]
#[command(
    long_about = "torbridge-rs fetches obfs4 bridges, checks which ones accept TCP \
    connections, rewrites the bridge section of a torrc and restarts Tor through \
    its supervisor. If Tor cannot build a circuit the bridges are removed again \
    and Tor falls back to a direct connection."
)]
pub struct CliArgs {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file.
    ///
    /// TOML configuration file containing all settings. Command-line arguments
    /// override values from this file.
    #[arg(
        long = "config",
        env = "TORBRIDGE_CONFIG",
        default_value = "torbridge.conf",
        global = true
    )]
    pub config_file: PathBuf,

    /// Path to the torrc file to rewrite.
    #[arg(long = "torrc", env = "TORBRIDGE_TORRC", global = true)]
    pub torrc_path: Option<PathBuf>,

    /// Tor control port number.
    #[arg(long, global = true)]
    pub control_port: Option<u16>,

    /// Tor control port password.
    #[arg(long, global = true)]
    pub control_pass: Option<String>,

    /// Skip bridge connectivity tests.
    #[arg(long, global = true)]
    pub no_test: bool,

    /// Maximum number of bridges to configure.
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Supervised service name of the Tor daemon.
    #[arg(long = "service", global = true)]
    pub service_name: Option<String>,

    /// Log verbosity (DEBUG, INFO, NOTICE, WARN, ERROR).
    #[arg(long, global = true)]
    pub loglevel: Option<String>,

    /// Log to file instead of stdout (use ":syslog:" for syslog).
    #[arg(long, global = true)]
    pub logfile: Option<String>,
}

impl CliArgs {
    /// Apply CLI arguments to a configuration, overriding values.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(ref torrc_path) = self.torrc_path {
            config.torrc_path = torrc_path.clone();
        }
        if let Some(control_port) = self.control_port {
            config.daemon.control_port = control_port;
        }
        if let Some(ref control_pass) = self.control_pass {
            config.daemon.control_pass = Some(control_pass.clone());
        }
        if self.no_test {
            config.probe.enabled = false;
        }
        if let Some(limit) = self.limit {
            config.bridge_limit = limit;
        }
        if let Some(ref service_name) = self.service_name {
            config.daemon.service_name = service_name.clone();
        }
        if let Some(ref loglevel) = self.loglevel {
            config.loglevel = loglevel.parse()?;
        }
        if let Some(ref logfile) = self.logfile {
            config.logfile = Some(logfile.clone());
        }
        Ok(())
    }
}

/// Load configuration from file and CLI arguments.
///
/// A missing config file is not an error; defaults are used instead.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file is malformed, a flag is invalid,
/// or the merged configuration fails [`Config::validate`].
pub fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = Config::default();

    if args.config_file.exists() {
        config = Config::from_file(&args.config_file)?;
    }

    args.apply_to(&mut config)?;
    config.validate()?;

    Ok(config)
}
