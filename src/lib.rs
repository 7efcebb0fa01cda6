//! # torbridge-rs
//!
//! Keeps a Tor daemon connected through fresh, reachable obfs4 bridges.
//!
//! # Overview
//!
//! A single run fetches obfs4 bridge lines from a bridge distribution page,
//! checks which of them accept TCP connections, rewrites the bridge section
//! of a torrc, restarts Tor through its process supervisor and asks Tor over
//! the control port whether a circuit was built. If any step leaves Tor
//! without working bridges, the bridge configuration is removed again and
//! Tor is restarted for a direct connection.
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`api`] | High-level [`BridgeManager`] struct for programmatic use |
//! | [`config`] | Configuration management (TOML, CLI, environment) |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`control`] | Run orchestration and CLI command dispatch |
//! | [`bridges`] | Bridge list download and obfs4 line extraction |
//! | [`probe`] | Concurrent TCP reachability checks |
//! | [`torrc`] | Line-oriented torrc rewriting |
//! | [`daemon`] | Supervisor restarts and circuit status queries |
//! | [`logger`] | Logging infrastructure using tracing |
//!
//! # What This Library Does NOT Do
//!
//! - **Pluggable transport handshakes**: probes are plain TCP connects, not obfs4
//! - **Solve bridge CAPTCHAs**: only pages that serve bridge lines directly work
//! - **Manage the Tor process**: restarts go through an external supervisor
//! - **Run continuously**: each invocation is one pass; schedule it externally
//!
//! # Quick Start
//!
//! ## As a Library
//!
//! ```rust,no_run
//! use torbridge_rs::{BridgeManager, Config};
//!
//! #[tokio::main]
//! async fn main() -> torbridge_rs::Result<()> {
//!     let manager = BridgeManager::from_config(Config::default())?;
//!     let outcome = manager.auto_configure().await?;
//!     println!("{}", outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## As a CLI Application
//!
//! ```bash
//! # Fetch, test and configure bridges
//! torbridge-rs auto
//!
//! # Only list reachable bridges
//! torbridge-rs fetch
//!
//! # Remove bridges and restart Tor
//! torbridge-rs disable
//!
//! # Is Tor connected?
//! torbridge-rs check
//!
//! # Generate default configuration file
//! torbridge-rs generate-config torbridge.conf
//! ```
//!
//! # Configuration
//!
//! Configuration can be loaded from multiple sources in order of precedence:
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI Arguments  │ ◄── Highest priority
//! ├─────────────────┤
//! │  Environment    │ ◄── TORBRIDGE_CONFIG, TORBRIDGE_TORRC
//! ├─────────────────┤
//! │  Config File    │ ◄── TOML format
//! ├─────────────────┤
//! │    Defaults     │ ◄── Lowest priority
//! └─────────────────┘
//! ```

pub mod api;
pub mod bridges;
pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod logger;
pub mod probe;
pub mod torrc;

pub use api::{BridgeManager, SecurePassword};
pub use bridges::{parse_bridges, BridgeSource, Endpoint, HttpBridgeSource};
pub use config::{CliArgs, Command, Config, DaemonConfig, LogLevel, ProbeConfig};
pub use control::{CommandOutcome, FallbackReason, Orchestrator, RunOutcome};
pub use daemon::{DaemonControl, DaemonState, TorDaemon};
pub use error::{Error, Result};
pub use torrc::ConfigDocument;
