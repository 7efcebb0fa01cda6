//! Error types for torbridge-rs.
//!
//! This module defines the [`enum@Error`] enum representing the failure conditions
//! that can abort a run. Most failures in this crate are *not* errors: a failed
//! fetch degrades to an empty bridge list, a failed probe degrades to
//! "unreachable", and a failed status query degrades to "not established".
//! Only the conditions below are surfaced to the caller.
//!
//! # Error Categories
//!
//! ```text
//!   Error
//!   ├── Io        ◄── File I/O failures outside the torrc path
//!   ├── Config    ◄── Invalid configuration or CLI input
//!   ├── Control   ◄── Tor control protocol errors (from stem-rs)
//!   ├── Fetch     ◄── Bridge list download failures
//!   ├── Torrc     ◄── torrc could not be written (fatal)
//!   └── Daemon    ◄── Supervisor restart failed (fatal)
//! ```
//!
//! # Recovery Guide
//!
//! | Error | Fatal for a run | Recommended Action |
//! |-------|-----------------|-------------------|
//! | [`Io`](Error::Io) | Yes | Check permissions, disk space |
//! | [`Config`](Error::Config) | Yes | Fix configuration file or flags |
//! | [`Control`](Error::Control) | No (folded into status) | Check `ControlPort` and auth |
//! | [`Fetch`](Error::Fetch) | No (triggers fallback) | Check network / bridge URL |
//! | [`Torrc`](Error::Torrc) | Yes | Check torrc path and permissions |
//! | [`Daemon`](Error::Daemon) | Yes on the enable path | Check supervisor and service name |
//!
//! # Example
//!
//! ```rust
//! use torbridge_rs::{Config, Error, Result};
//!
//! fn load_config() -> Result<Config> {
//!     let config = Config::from_file(std::path::Path::new("torbridge.conf"))?;
//!     config.validate()?;
//!     Ok(config)
//! }
//!
//! fn main() {
//!     match load_config() {
//!         Ok(_) => println!("Config loaded successfully"),
//!         Err(Error::Io(e)) => eprintln!("File error: {}", e),
//!         Err(Error::Config(msg)) => eprintln!("Config error: {}", msg),
//!         Err(e) => eprintln!("Other error: {}", e),
//!     }
//! }
//! ```

use thiserror::Error;

/// Errors that can occur during torbridge-rs operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during file or network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    ///
    /// Invalid configuration values or parsing failures. Not recoverable
    /// without user intervention.
    #[error("configuration error: {0}")]
    Config(String),

    /// Tor control protocol error.
    ///
    /// Wraps errors from stem-rs when talking to Tor's control port. The
    /// status check never propagates this; it is logged and the daemon is
    /// treated as not established.
    #[error("Tor control error: {0}")]
    Control(#[from] stem_rs::Error),

    /// Bridge list could not be downloaded.
    ///
    /// The orchestrator treats this as "zero bridges" and falls back to a
    /// direct connection.
    #[error("bridge fetch error: {0}")]
    Fetch(String),

    /// The torrc file could not be written.
    ///
    /// # Recovery
    ///
    /// Check that the path exists and is writable by this process. The run
    /// is aborted because Tor's configuration is in an unknown state.
    #[error("torrc error: {0}")]
    Torrc(String),

    /// The supervisor failed to restart the Tor service.
    ///
    /// # Recovery
    ///
    /// - Check that the supervisor command is installed
    /// - Check the service name
    /// - Inspect the supervisor's own logs
    #[error("daemon restart error: {0}")]
    Daemon(String),
}

/// Result type alias for torbridge-rs operations.
pub type Result<T> = std::result::Result<T, Error>;
