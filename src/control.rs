//! Run orchestration: the fetch → probe → reconcile → restart → verify sequence.
//!
//! # State Machine
//!
//! ```text
//!   FETCHING ──(0 bridges)────────────────────────────────────┐
//!      │                                                      │
//!      ▼                                                      │
//!   PROBING ──(0 reachable)───────────────────────────────────┤
//!      │                                                      │
//!      ▼                                                      ▼
//!   RECONCILING ──(write failed)──▶ ABORT        FALLBACK: disable bridges,
//!      │                                          restart (result ignored)
//!      ▼                                                      ▲
//!   RESTARTING ──(restart failed)──▶ ABORT                    │
//!      │                                                      │
//!      ▼                                                      │
//!   VERIFYING ──(not established)─────────────────────────────┘
//!      │
//!      ▼
//!   SUCCESS
//! ```
//!
//! All stages run sequentially. The only concurrency is inside the probe
//! stage's worker pool. No retries happen anywhere: each failure either
//! degrades to the direct-connection fallback or aborts the run.
//!
//! # Commands
//!
//! | Command | Touches torrc | Restarts Tor | Success when |
//! |---------|---------------|--------------|--------------|
//! | `auto` | yes | yes | circuit established through bridges |
//! | `fetch` | no | no | at least one bridge listed |
//! | `disable` | yes | yes | restart succeeded |
//! | `check` | no | no | circuit established |
//! | `generate-config` | no | no | file written |

use std::path::Path;

use crate::bridges::{fetch_endpoints, BridgeSource, Endpoint, HttpBridgeSource};
use crate::config::{Command, Config, LogLevel};
use crate::daemon::{DaemonControl, DaemonState, TorDaemon};
use crate::error::Result;
use crate::logger::plog;
use crate::probe::reachable_endpoints;
use crate::torrc::{reconcile_file, BridgeBlock, ReconcileMode};

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER_WIDTH: usize = 60;

/// Stage of an `auto` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Downloading and parsing the bridge list.
    Fetching,
    /// Testing TCP reachability.
    Probing,
    /// Rewriting the torrc.
    Reconciling,
    /// Restarting Tor through the supervisor.
    Restarting,
    /// Waiting for and querying circuit status.
    Verifying,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Fetching => write!(f, "FETCHING"),
            Stage::Probing => write!(f, "PROBING"),
            Stage::Reconciling => write!(f, "RECONCILING"),
            Stage::Restarting => write!(f, "RESTARTING"),
            Stage::Verifying => write!(f, "VERIFYING"),
        }
    }
}

/// Why a run fell back to a direct connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The bridge list was empty or could not be fetched.
    NoBridgesFetched,
    /// No fetched bridge accepted a TCP connection.
    NoReachableBridges,
    /// Tor did not build a circuit through the configured bridges.
    CircuitNotEstablished,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::NoBridgesFetched => write!(f, "no bridges available"),
            FallbackReason::NoReachableBridges => write!(f, "no reachable bridges found"),
            FallbackReason::CircuitNotEstablished => write!(f, "bridges didn't work"),
        }
    }
}

/// Terminal state of an `auto` run that was not aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Tor built a circuit through `bridges` configured bridges.
    Connected {
        /// Number of `Bridge` lines written.
        bridges: usize,
    },
    /// Bridges were removed and Tor was restarted for direct connection.
    Fallback(FallbackReason),
}

impl RunOutcome {
    /// Whether Tor is connected through bridges.
    pub fn is_connected(&self) -> bool {
        matches!(self, RunOutcome::Connected { .. })
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Connected { bridges } => {
                write!(f, "SUCCESS: Tor is running with {} bridges", bridges)
            }
            RunOutcome::Fallback(reason) => {
                write!(f, "FAILED: {}, fell back to direct connection", reason)
            }
        }
    }
}

/// Result of one CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// `auto` finished.
    Auto(RunOutcome),
    /// `fetch` listed these reachable bridges.
    Listed(Vec<Endpoint>),
    /// `disable` stripped the torrc and restarted Tor.
    Disabled,
    /// `check` observed this state.
    Status(DaemonState),
    /// `generate-config` wrote a file.
    ConfigWritten,
}

impl CommandOutcome {
    /// Whether the process should exit with status 0.
    pub fn is_success(&self) -> bool {
        match self {
            CommandOutcome::Auto(outcome) => outcome.is_connected(),
            CommandOutcome::Listed(endpoints) => !endpoints.is_empty(),
            CommandOutcome::Disabled => true,
            CommandOutcome::Status(state) => state.is_established(),
            CommandOutcome::ConfigWritten => true,
        }
    }
}

/// Sequences the stages of a run over a bridge source and a daemon.
pub struct Orchestrator<S, D> {
    config: Config,
    source: S,
    daemon: D,
}

impl<S: BridgeSource, D: DaemonControl> Orchestrator<S, D> {
    /// Creates an orchestrator. The configuration is used as given.
    pub fn new(config: Config, source: S, daemon: D) -> Self {
        Self {
            config,
            source,
            daemon,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The daemon handle.
    pub fn daemon(&self) -> &D {
        &self.daemon
    }

    fn enter(&self, stage: Stage) {
        plog(LogLevel::Debug, &format!("Entering stage {}", stage));
    }

    /// Runs the full fetch → probe → reconcile → restart → verify sequence.
    ///
    /// # Errors
    ///
    /// - [`Error::Torrc`](crate::Error::Torrc) if the torrc cannot be written,
    ///   on either the enable or the fallback path
    /// - [`Error::Daemon`](crate::Error::Daemon) if the restart after enabling
    ///   bridges fails; no fallback is attempted
    pub async fn auto_configure(&self) -> Result<RunOutcome> {
        plog(LogLevel::Notice, &"=".repeat(BANNER_WIDTH));
        plog(LogLevel::Notice, &format!("Tor Bridge Auto-Configurator {}", VERSION));
        plog(LogLevel::Notice, &"=".repeat(BANNER_WIDTH));

        self.enter(Stage::Fetching);
        let endpoints = fetch_endpoints(&self.source).await;
        if endpoints.is_empty() {
            return self.fall_back(FallbackReason::NoBridgesFetched).await;
        }

        self.enter(Stage::Probing);
        let reachable = self.filter_reachable(endpoints).await;
        if reachable.is_empty() {
            return self.fall_back(FallbackReason::NoReachableBridges).await;
        }

        self.enter(Stage::Reconciling);
        let bridges = self.enable_bridges(&reachable)?;

        self.enter(Stage::Restarting);
        self.daemon.restart().await?;

        self.enter(Stage::Verifying);
        let state = self.daemon.await_status(self.config.daemon.settle()).await;
        if state.is_established() {
            let outcome = RunOutcome::Connected { bridges };
            self.report(&outcome);
            return Ok(outcome);
        }

        let outcome = RunOutcome::Fallback(FallbackReason::CircuitNotEstablished);
        self.report(&outcome);
        self.disable_bridges()?;
        if let Err(e) = self.daemon.restart().await {
            plog(
                LogLevel::Warn,
                &format!("Restart after fallback failed: {}", e),
            );
        }
        Ok(outcome)
    }

    async fn fall_back(&self, reason: FallbackReason) -> Result<RunOutcome> {
        plog(
            LogLevel::Warn,
            &format!("{}, switching to direct connection", reason),
        );
        self.disable_bridges()?;
        if let Err(e) = self.daemon.restart().await {
            plog(
                LogLevel::Warn,
                &format!("Restart after fallback failed: {}", e),
            );
        }
        Ok(RunOutcome::Fallback(reason))
    }

    fn report(&self, outcome: &RunOutcome) {
        let level = if outcome.is_connected() {
            LogLevel::Notice
        } else {
            LogLevel::Warn
        };
        plog(level, &"=".repeat(BANNER_WIDTH));
        plog(level, &outcome.to_string());
        plog(level, &"=".repeat(BANNER_WIDTH));
    }

    async fn filter_reachable(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        if self.config.probe.enabled {
            reachable_endpoints(
                endpoints,
                self.config.probe.timeout(),
                self.config.probe.concurrency,
            )
            .await
        } else {
            plog(LogLevel::Warn, "Skipping bridge connectivity tests");
            endpoints
        }
    }

    /// Writes a bridge block with the first `bridge_limit` endpoints.
    ///
    /// Returns the number of `Bridge` lines written.
    pub fn enable_bridges(&self, endpoints: &[Endpoint]) -> Result<usize> {
        let count = endpoints.len().min(self.config.bridge_limit);
        plog(
            LogLevel::Notice,
            &format!("Configuring torrc with {} bridges...", count),
        );
        let doc = reconcile_file(
            &self.config.torrc_path,
            ReconcileMode::Enable(BridgeBlock {
                plugin: &self.config.transport_plugin,
                endpoints,
                limit: self.config.bridge_limit,
            }),
        )?;
        let written = doc.bridge_count();
        plog(
            LogLevel::Notice,
            &format!(
                "Wrote {} bridges to {}",
                written,
                self.config.torrc_path.display()
            ),
        );
        Ok(written)
    }

    /// Removes all bridge configuration from the torrc.
    pub fn disable_bridges(&self) -> Result<()> {
        plog(
            LogLevel::Notice,
            "Disabling bridges, switching to direct connection...",
        );
        reconcile_file(&self.config.torrc_path, ReconcileMode::Disable)?;
        plog(
            LogLevel::Notice,
            &format!("Bridges disabled in {}", self.config.torrc_path.display()),
        );
        Ok(())
    }

    /// Fetches bridges and returns the reachable ones (all of them if probing is off).
    pub async fn fetch_reachable(&self) -> Vec<Endpoint> {
        let endpoints = fetch_endpoints(&self.source).await;
        if endpoints.is_empty() {
            return endpoints;
        }
        self.filter_reachable(endpoints).await
    }

    /// Removes bridge configuration and restarts Tor.
    ///
    /// # Errors
    ///
    /// Returns an error if the torrc cannot be written or the restart fails.
    pub async fn disable_and_restart(&self) -> Result<()> {
        self.disable_bridges()?;
        self.daemon.restart().await
    }

    /// Queries circuit status immediately.
    pub async fn check(&self) -> DaemonState {
        self.daemon.await_status(std::time::Duration::ZERO).await
    }

    /// Writes the configuration in use to `path` as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if serialization fails
    /// or [`Error::Io`](crate::Error::Io) if the file cannot be written.
    pub fn write_config(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.config.to_toml()?)?;
        plog(
            LogLevel::Notice,
            &format!("Wrote config to {}", path.display()),
        );
        Ok(())
    }

    /// Runs one CLI command.
    pub async fn run_command(&self, command: &Command) -> Result<CommandOutcome> {
        match command {
            Command::Auto => Ok(CommandOutcome::Auto(self.auto_configure().await?)),
            Command::Fetch => {
                let reachable = self.fetch_reachable().await;
                plog(
                    LogLevel::Notice,
                    &format!("Reachable bridges ({}):", reachable.len()),
                );
                for endpoint in &reachable {
                    plog(LogLevel::Notice, &format!("  {}", endpoint));
                }
                Ok(CommandOutcome::Listed(reachable))
            }
            Command::Disable => {
                self.disable_and_restart().await?;
                Ok(CommandOutcome::Disabled)
            }
            Command::Check => {
                let state = self.check().await;
                if state.is_established() {
                    plog(LogLevel::Notice, "Tor is connected");
                } else {
                    plog(LogLevel::Warn, "Tor is NOT connected");
                }
                Ok(CommandOutcome::Status(state))
            }
            Command::GenerateConfig { path } => {
                self.write_config(path)?;
                Ok(CommandOutcome::ConfigWritten)
            }
        }
    }
}

/// Runs `command` against the real bridge page and Tor daemon.
///
/// # Errors
///
/// Returns any error that aborts the run: invalid configuration, an
/// unwritable torrc, a failed restart, or a failed config file write for
/// `generate-config`.
pub async fn run_main(config: Config, command: &Command) -> Result<CommandOutcome> {
    let source = HttpBridgeSource::new(&config.bridge_url, config.fetch_timeout())?;
    let daemon = TorDaemon::from_config(&config.daemon);
    plog(
        LogLevel::Debug,
        &format!(
            "torrc: {}, control port: {}",
            config.torrc_path.display(),
            daemon.control_addr()
        ),
    );

    let orchestrator = Orchestrator::new(config, source, daemon);
    orchestrator.run_command(command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::torrc::{read_torrc, SENTINEL_COMMENT};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    struct StaticSource(Option<String>);

    impl BridgeSource for StaticSource {
        async fn fetch(&self) -> Result<String> {
            self.0
                .clone()
                .ok_or_else(|| Error::Fetch("unreachable bridge page".to_string()))
        }
    }

    struct MockDaemon {
        restarts: AtomicUsize,
        status_queries: AtomicUsize,
        restart_ok: bool,
        state: DaemonState,
    }

    impl MockDaemon {
        fn new(restart_ok: bool, state: DaemonState) -> Self {
            Self {
                restarts: AtomicUsize::new(0),
                status_queries: AtomicUsize::new(0),
                restart_ok,
                state,
            }
        }

        fn restarts(&self) -> usize {
            self.restarts.load(Ordering::SeqCst)
        }

        fn status_queries(&self) -> usize {
            self.status_queries.load(Ordering::SeqCst)
        }
    }

    impl DaemonControl for MockDaemon {
        async fn restart(&self) -> Result<()> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            if self.restart_ok {
                Ok(())
            } else {
                Err(Error::Daemon("supervisor said no".to_string()))
            }
        }

        async fn await_status(&self, _settle: Duration) -> DaemonState {
            self.status_queries.fetch_add(1, Ordering::SeqCst);
            self.state
        }
    }

    struct Fixture {
        dir: TempDir,
        torrc: PathBuf,
        config: Config,
    }

    fn fixture(initial: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let torrc = dir.path().join("torrc");
        std::fs::write(&torrc, initial).unwrap();
        let mut config = Config::default();
        config.torrc_path = torrc.clone();
        config.probe.timeout_secs = 2;
        config.daemon.settle_secs = 0;
        Fixture {
            dir,
            torrc,
            config,
        }
    }

    async fn open_bridge_line() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (
            listener,
            format!("obfs4 127.0.0.1:{} ABCD cert=xyz iat-mode=0", port),
        )
    }

    async fn closed_bridge_line() -> String {
        let (listener, line) = open_bridge_line().await;
        drop(listener);
        line
    }

    #[tokio::test]
    async fn test_zero_bridges_falls_back() {
        let fx = fixture("SocksPort 9050\nUseBridges 1\nBridge obfs4 9.9.9.9:1 OLD cert=o\n");
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(Some("<html>nothing here</html>".to_string())),
            MockDaemon::new(true, DaemonState::Established),
        );

        let outcome = orch.auto_configure().await.unwrap();
        assert_eq!(outcome, RunOutcome::Fallback(FallbackReason::NoBridgesFetched));

        let doc = read_torrc(&fx.torrc);
        assert_eq!(doc.bridge_count(), 0);
        assert_eq!(doc.lines(), ["SocksPort 9050"]);
        assert_eq!(orch.daemon().restarts(), 1);
        assert_eq!(orch.daemon().status_queries(), 0);
    }

    #[tokio::test]
    async fn test_fetch_error_falls_back() {
        let fx = fixture("SocksPort 9050\n");
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(None),
            MockDaemon::new(false, DaemonState::Established),
        );

        // Restart failure on the fallback path is reported, not fatal.
        let outcome = orch.auto_configure().await.unwrap();
        assert_eq!(outcome, RunOutcome::Fallback(FallbackReason::NoBridgesFetched));
        assert_eq!(orch.daemon().restarts(), 1);
    }

    #[tokio::test]
    async fn test_no_reachable_bridges_falls_back() {
        let fx = fixture("SocksPort 9050\n");
        let line = closed_bridge_line().await;
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(Some(line)),
            MockDaemon::new(true, DaemonState::Established),
        );

        let outcome = orch.auto_configure().await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Fallback(FallbackReason::NoReachableBridges)
        );
        assert_eq!(read_torrc(&fx.torrc).bridge_count(), 0);
        assert_eq!(orch.daemon().restarts(), 1);
    }

    #[tokio::test]
    async fn test_success_path() {
        let fx = fixture("SocksPort 9050\nEntryNodes {us}\n");
        let (_l1, open1) = open_bridge_line().await;
        let (_l2, open2) = open_bridge_line().await;
        let closed = closed_bridge_line().await;
        let page = format!("{}\n{}\n{}\n", closed, open1, open2);

        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(Some(page)),
            MockDaemon::new(true, DaemonState::Established),
        );

        let outcome = orch.auto_configure().await.unwrap();
        assert_eq!(outcome, RunOutcome::Connected { bridges: 2 });

        let doc = read_torrc(&fx.torrc);
        assert_eq!(doc.bridge_count(), 2);
        assert!(doc.lines().contains(&format!("Bridge {}", open1)));
        assert!(doc.lines().contains(&format!("Bridge {}", open2)));
        assert!(!doc.lines().contains(&format!("Bridge {}", closed)));
        assert!(!doc.lines().iter().any(|l| l.starts_with("EntryNodes")));
        assert_eq!(doc.lines()[0], "SocksPort 9050");
        assert_eq!(orch.daemon().restarts(), 1);
        assert_eq!(orch.daemon().status_queries(), 1);
    }

    #[tokio::test]
    async fn test_limit_caps_bridges() {
        let mut fx = fixture("");
        fx.config.bridge_limit = 1;
        let mut listeners = Vec::new();
        let mut lines = Vec::new();
        for _ in 0..3 {
            let (listener, line) = open_bridge_line().await;
            listeners.push(listener);
            lines.push(line);
        }

        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(Some(lines.join("\n"))),
            MockDaemon::new(true, DaemonState::Established),
        );

        let outcome = orch.auto_configure().await.unwrap();
        assert_eq!(outcome, RunOutcome::Connected { bridges: 1 });
        assert_eq!(read_torrc(&fx.torrc).bridge_count(), 1);
    }

    #[tokio::test]
    async fn test_not_established_rolls_back() {
        let fx = fixture("SocksPort 9050\n");
        let (_listener, open) = open_bridge_line().await;
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(Some(open)),
            MockDaemon::new(true, DaemonState::NotEstablished),
        );

        let outcome = orch.auto_configure().await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Fallback(FallbackReason::CircuitNotEstablished)
        );
        let doc = read_torrc(&fx.torrc);
        assert_eq!(doc.bridge_count(), 0);
        assert!(!doc.lines().iter().any(|l| l.starts_with(SENTINEL_COMMENT)));
        assert_eq!(orch.daemon().restarts(), 2);
    }

    #[tokio::test]
    async fn test_restart_failure_aborts() {
        let fx = fixture("SocksPort 9050\n");
        let (_listener, open) = open_bridge_line().await;
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(Some(open)),
            MockDaemon::new(false, DaemonState::Established),
        );

        let result = orch.auto_configure().await;
        assert!(matches!(result, Err(Error::Daemon(_))));
        assert_eq!(orch.daemon().restarts(), 1);
        assert_eq!(orch.daemon().status_queries(), 0);
        // Bridges stay written; no fallback reconfiguration is attempted.
        assert_eq!(read_torrc(&fx.torrc).bridge_count(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_torrc_aborts() {
        let fx = fixture("");
        let mut config = fx.config.clone();
        config.torrc_path = fx.torrc.join("not-a-dir/torrc");
        let (_listener, open) = open_bridge_line().await;
        let orch = Orchestrator::new(
            config,
            StaticSource(Some(open)),
            MockDaemon::new(true, DaemonState::Established),
        );

        let result = orch.auto_configure().await;
        assert!(matches!(result, Err(Error::Torrc(_))));
        assert_eq!(orch.daemon().restarts(), 0);
    }

    #[tokio::test]
    async fn test_probe_disabled_uses_all_bridges() {
        let mut fx = fixture("");
        fx.config.probe.enabled = false;
        let closed = closed_bridge_line().await;
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(Some(closed.clone())),
            MockDaemon::new(true, DaemonState::Established),
        );

        let outcome = orch.auto_configure().await.unwrap();
        assert_eq!(outcome, RunOutcome::Connected { bridges: 1 });
        assert!(read_torrc(&fx.torrc)
            .lines()
            .contains(&format!("Bridge {}", closed)));
    }

    #[tokio::test]
    async fn test_fetch_command_leaves_torrc_alone() {
        let fx = fixture("SocksPort 9050\n");
        let (_listener, open) = open_bridge_line().await;
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(Some(open.clone())),
            MockDaemon::new(true, DaemonState::Established),
        );

        let outcome = orch.run_command(&Command::Fetch).await.unwrap();
        assert!(outcome.is_success());
        match outcome {
            CommandOutcome::Listed(endpoints) => {
                assert_eq!(endpoints.len(), 1);
                assert_eq!(endpoints[0].descriptor(), open);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&fx.torrc).unwrap(), "SocksPort 9050\n");
        assert_eq!(orch.daemon().restarts(), 0);
    }

    #[tokio::test]
    async fn test_disable_command() {
        let fx = fixture("SocksPort 9050\nUseBridges 1\nBridge obfs4 1.2.3.4:443 X cert=y\n");
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(None),
            MockDaemon::new(true, DaemonState::Unknown),
        );

        let outcome = orch.run_command(&Command::Disable).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Disabled);
        assert_eq!(read_torrc(&fx.torrc).lines(), ["SocksPort 9050"]);
        assert_eq!(orch.daemon().restarts(), 1);
    }

    #[tokio::test]
    async fn test_disable_command_restart_failure() {
        let fx = fixture("UseBridges 1\n");
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(None),
            MockDaemon::new(false, DaemonState::Unknown),
        );
        assert!(orch.run_command(&Command::Disable).await.is_err());
    }

    #[tokio::test]
    async fn test_check_command() {
        let fx = fixture("");
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(None),
            MockDaemon::new(true, DaemonState::NotEstablished),
        );
        let outcome = orch.run_command(&Command::Check).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Status(DaemonState::NotEstablished));
        assert!(!outcome.is_success());
        assert_eq!(orch.daemon().restarts(), 0);
    }

    #[tokio::test]
    async fn test_generate_config_command_writes_file() {
        let mut fx = fixture("");
        fx.config.bridge_limit = 4;
        let path = fx.dir.path().join("generated.conf");
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(None),
            MockDaemon::new(true, DaemonState::Unknown),
        );

        let outcome = orch
            .run_command(&Command::GenerateConfig { path: path.clone() })
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::ConfigWritten);
        assert!(path.exists());
        assert_eq!(Config::from_file(&path).unwrap(), fx.config);
        assert_eq!(orch.daemon().restarts(), 0);
    }

    #[tokio::test]
    async fn test_generate_config_unwritable_path_fails() {
        let fx = fixture("");
        let orch = Orchestrator::new(
            fx.config.clone(),
            StaticSource(None),
            MockDaemon::new(true, DaemonState::Unknown),
        );
        let path = fx.torrc.join("generated.conf");
        let result = orch
            .run_command(&Command::GenerateConfig { path })
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_generate_config_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("torbridge.conf");
        let outcome = run_main(
            Config::default(),
            &Command::GenerateConfig { path: path.clone() },
        )
        .await
        .unwrap();
        assert_eq!(outcome, CommandOutcome::ConfigWritten);
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_outcome_success_mapping() {
        assert!(CommandOutcome::Auto(RunOutcome::Connected { bridges: 1 }).is_success());
        assert!(
            !CommandOutcome::Auto(RunOutcome::Fallback(FallbackReason::NoBridgesFetched))
                .is_success()
        );
        assert!(!CommandOutcome::Listed(Vec::new()).is_success());
        assert!(CommandOutcome::Status(DaemonState::Established).is_success());
        assert!(!CommandOutcome::Status(DaemonState::Unknown).is_success());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            RunOutcome::Connected { bridges: 3 }.to_string(),
            "SUCCESS: Tor is running with 3 bridges"
        );
        assert!(RunOutcome::Fallback(FallbackReason::CircuitNotEstablished)
            .to_string()
            .contains("direct connection"));
        assert_eq!(Stage::Verifying.to_string(), "VERIFYING");
    }
}
