//! High-level API for using torbridge-rs as a library.
//!
//! [`BridgeManager`] wires the production collaborators (HTTPS bridge source,
//! supervisor-managed Tor daemon) into an [`Orchestrator`] so embedders can
//! run the same operations as the CLI.
//!
//! # Example
//!
//! ```rust,no_run
//! use torbridge_rs::{BridgeManager, Config};
//!
//! #[tokio::main]
//! async fn main() -> torbridge_rs::Result<()> {
//!     let mut config = Config::default();
//!     config.torrc_path = "/etc/tor/torrc".into();
//!
//!     let manager = BridgeManager::from_config(config)?;
//!     let outcome = manager.auto_configure().await?;
//!     println!("{}", outcome);
//!     Ok(())
//! }
//! ```

use zeroize::Zeroize;

use crate::bridges::{Endpoint, HttpBridgeSource};
use crate::config::Config;
use crate::control::{Orchestrator, RunOutcome};
use crate::daemon::{DaemonState, TorDaemon};
use crate::error::Result;

/// A password that is zeroed from memory when dropped.
///
/// `Debug` output is redacted so the secret never reaches logs.
///
/// ```rust
/// use torbridge_rs::SecurePassword;
///
/// let password = SecurePassword::new("my_secret".to_string());
/// assert_eq!(password.as_str(), "my_secret");
/// assert!(!format!("{:?}", password).contains("my_secret"));
/// ```
#[derive(Clone)]
pub struct SecurePassword(String);

impl SecurePassword {
    /// Wraps a password.
    pub fn new(password: String) -> Self {
        Self(password)
    }

    /// Borrows the password.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for SecurePassword {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SecurePassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecurePassword([REDACTED])")
    }
}

/// Bridge manager backed by the real bridge page and Tor daemon.
pub struct BridgeManager {
    orchestrator: Orchestrator<HttpBridgeSource, TorDaemon>,
}

impl BridgeManager {
    /// Builds a manager from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is
    /// invalid, or [`Error::Fetch`](crate::Error::Fetch) if the HTTP client
    /// cannot be created.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let source = HttpBridgeSource::new(&config.bridge_url, config.fetch_timeout())?;
        let daemon = TorDaemon::from_config(&config.daemon);
        Ok(Self {
            orchestrator: Orchestrator::new(config, source, daemon),
        })
    }

    /// Fetches, probes and configures bridges, falling back to direct connection.
    pub async fn auto_configure(&self) -> Result<RunOutcome> {
        self.orchestrator.auto_configure().await
    }

    /// Fetches bridges and returns the reachable ones without touching the torrc.
    pub async fn fetch_bridges(&self) -> Vec<Endpoint> {
        self.orchestrator.fetch_reachable().await
    }

    /// Removes bridge configuration and restarts Tor.
    pub async fn disable_bridges(&self) -> Result<()> {
        self.orchestrator.disable_and_restart().await
    }

    /// Queries circuit status without waiting.
    pub async fn check_status(&self) -> DaemonState {
        self.orchestrator.check().await
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        self.orchestrator.config()
    }
}
