//! torbridge-rs CLI application entry point.
//!
//! # Startup Flow
//!
//! ```text
//!   ┌─────────────────┐
//!   │  Parse CLI Args │ ◄── clap parses subcommand and global flags
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │  Load Config    │ ◄── Defaults → File → Env → CLI
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ Initialize      │
//!   │   Logging       │
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ Run Command     │ ◄── control::run_main(), generate-config included
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │  Exit with      │
//!   │  status code    │
//!   └─────────────────┘
//! ```
//!
//! `generate-config` writes the effective configuration: defaults, then the
//! config file if present, then environment and flags.
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | `auto`: connected through bridges; `fetch`: at least one bridge listed; `disable`: restarted; `check`: circuit established |
//! | 1 | Fallback to direct connection, nothing reachable, no circuit, or an error (see stderr) |
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `TORBRIDGE_CONFIG` | Path to config file (equivalent to `--config`) |
//! | `TORBRIDGE_TORRC` | Path to torrc (equivalent to `--torrc`) |

use clap::Parser;
use std::process::ExitCode;

use torbridge_rs::{config, control, logger, CliArgs, LogLevel};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> torbridge_rs::Result<bool> {
    let args = CliArgs::parse();

    let config = config::load_config(&args)?;
    logger::init(config.loglevel, config.logfile.as_deref())?;

    logger::plog(
        LogLevel::Debug,
        &format!(
            "torbridge-rs {} ({:?}), torrc {}",
            control::VERSION,
            args.command,
            config.torrc_path.display()
        ),
    );

    let outcome = control::run_main(config, &args.command).await?;
    Ok(outcome.is_success())
}
