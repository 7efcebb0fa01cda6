//! Logging infrastructure for torbridge-rs.
//!
//! This module provides logging functionality using the tracing ecosystem.
//! It supports output to stdout, files, and syslog, with configurable log levels.
//! Every stage of a run is narrated through [`plog`], so the log doubles as the
//! progress report shown to the user.
//!
//! # Log Levels
//!
//! | Level | Use |
//! |-------|-----|
//! | [`Debug`](crate::LogLevel::Debug) | Stage transitions, raw control replies |
//! | [`Info`](crate::LogLevel::Info) | Per-bridge probe results |
//! | [`Notice`](crate::LogLevel::Notice) | Stage narration (default) |
//! | [`Warn`](crate::LogLevel::Warn) | Degraded paths: fetch failed, fallback |
//! | [`Error`](crate::LogLevel::Error) | Aborted runs |
//!
//! # Example
//!
//! ```rust,no_run
//! use torbridge_rs::{LogLevel, logger};
//!
//! logger::init(LogLevel::Notice, None).unwrap();
//! logger::plog(LogLevel::Notice, "Fetching fresh bridges");
//! ```

use std::io::Write;
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;
use crate::error::{Error, Result};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the logging system.
///
/// Sets up the tracing subscriber with the specified log level and output
/// destination. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - The minimum log level to output
/// * `logfile` - Output destination:
///   - `None` - Log to stdout with ANSI colors
///   - `Some(":syslog:")` - Log to system syslog
///   - `Some(path)` - Append to the file at `path`
///
/// # Errors
///
/// Returns [`Error::Config`] if no syslog socket exists, the log file path
/// has no file name, or a global subscriber is already installed.
///
/// # Notes
///
/// - The `RUST_LOG` environment variable overrides the configured level
/// - Syslog messages are prefixed with "torbridge:"
pub fn init(level: LogLevel, logfile: Option<&str>) -> Result<()> {
    if LOGGER_INITIALIZED.get().is_some() {
        return Ok(());
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_for(level)));

    match logfile {
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_ids(false)
                .with_span_events(FmtSpan::NONE)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| Error::Config(format!("failed to set logger: {}", e)))?;
        }
        Some(":syslog:") => {
            init_syslog(env_filter)?;
        }
        Some(path) => {
            init_file_logger(Path::new(path), env_filter)?;
        }
    }

    LOGGER_INITIALIZED.get_or_init(|| ());
    Ok(())
}

/// Maps a [`LogLevel`] to an `EnvFilter` directive.
fn filter_for(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Notice => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn init_syslog(env_filter: EnvFilter) -> Result<()> {
    let syslog_path = if Path::new("/dev/log").exists() {
        "/dev/log"
    } else if Path::new("/var/run/syslog").exists() {
        "/var/run/syslog"
    } else {
        return Err(Error::Config("no syslog socket found".to_string()));
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_ansi(false)
        .with_writer(move || SyslogWriter::connect(syslog_path))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("failed to set logger: {}", e)))?;

    Ok(())
}

/// Writes each formatted event as one datagram to the syslog socket.
///
/// Messages are dropped silently when the socket is unavailable.
struct SyslogWriter {
    socket: Option<UnixDatagram>,
}

impl SyslogWriter {
    fn connect(path: &str) -> Self {
        let socket = UnixDatagram::unbound()
            .and_then(|sock| sock.connect(path).map(|()| sock))
            .ok();
        Self { socket }
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(ref socket) = self.socket {
            let msg = format!("torbridge: {}", String::from_utf8_lossy(buf));
            socket.send(msg.as_bytes())?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn init_file_logger(path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("invalid log file path: {}", path.display())))?;
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let appender = tracing_appender::rolling::never(directory, file_name);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_ansi(false)
        .with_writer(appender)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("failed to set logger: {}", e)))?;

    Ok(())
}

/// Log a message at the specified level.
///
/// # Level Mapping
///
/// | LogLevel | tracing macro |
/// |----------|---------------|
/// | Debug | `debug!` |
/// | Info | `info!` |
/// | Notice | `info!` |
/// | Warn | `warn!` |
/// | Error | `error!` |
pub fn plog(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!("{}", message),
        LogLevel::Info => info!("{}", message),
        LogLevel::Notice => info!("{}", message),
        LogLevel::Warn => warn!("{}", message),
        LogLevel::Error => error!("{}", message),
    }
}

/// Log a formatted message at the specified level.
///
/// ```rust
/// use torbridge_rs::{LogLevel, plog_fmt};
///
/// plog_fmt!(LogLevel::Notice, "Found {} bridges", 12);
/// ```
#[macro_export]
macro_rules! plog_fmt {
    ($level:expr, $($arg:tt)*) => {
        $crate::logger::plog($level, &format!($($arg)*))
    };
}
