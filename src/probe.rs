//! Bridge reachability probing.
//!
//! A probe is a bare TCP connect to the bridge's `host:port`, bounded by a
//! timeout. It says nothing about whether the bridge speaks obfs4; it only
//! filters out addresses that are blocked, dead, or malformed.
//!
//! # Worker Pool
//!
//! ```text
//!                ┌──────────────────────┐
//!                │  queue (VecDeque)    │
//!                └───┬──────┬───────┬───┘
//!                    │      │       │      at most `concurrency` workers
//!                    ▼      ▼       ▼
//!                 worker  worker  worker   each pops until the queue is empty
//!                    │      │       │
//!                    └──────┼───────┘
//!                           ▼
//!                   mpsc result channel    completion order
//! ```
//!
//! Results arrive in completion order, so among reachable bridges the fastest
//! to accept a connection come first. The orchestrator keeps the first
//! `bridge_limit` of them.
//!
//! Every failure mode (refused, timed out, DNS failure, no address in the
//! descriptor) is reported as `reachable = false`. Nothing here returns an
//! error.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::bridges::Endpoint;
use crate::config::LogLevel;
use crate::logger::plog;

/// Outcome of probing one endpoint in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// The probed endpoint.
    pub endpoint: Endpoint,
    /// Whether a TCP connection was established within the timeout.
    pub reachable: bool,
}

/// Probes a single endpoint.
///
/// Returns `true` only if a TCP connection to the endpoint's address is
/// established within `timeout`. The connection is closed immediately.
pub async fn probe_endpoint(endpoint: &Endpoint, timeout: Duration) -> bool {
    let (Some(host), Some(port)) = (endpoint.host(), endpoint.port()) else {
        plog(
            LogLevel::Info,
            &format!("  ✗ {} - NO ADDRESS", endpoint.descriptor()),
        );
        return false;
    };

    let addr = endpoint.address_display();
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => {
            plog(LogLevel::Info, &format!("  ✓ {} - REACHABLE", addr));
            true
        }
        Ok(Err(e)) => {
            plog(
                LogLevel::Info,
                &format!("  ✗ {} - UNREACHABLE ({})", addr, e),
            );
            false
        }
        Err(_) => {
            plog(LogLevel::Info, &format!("  ✗ {} - TIMEOUT", addr));
            false
        }
    }
}

/// Probes all endpoints with at most `concurrency` probes in flight.
///
/// Returns one [`ProbeResult`] per input endpoint, in completion order.
/// Waits for the whole batch; worst-case duration is roughly
/// `timeout * ceil(n / concurrency)`. A `concurrency` of zero is treated as one.
pub async fn probe_all(
    endpoints: Vec<Endpoint>,
    timeout: Duration,
    concurrency: usize,
) -> Vec<ProbeResult> {
    run_pool(endpoints, concurrency, move |endpoint| async move {
        let reachable = probe_endpoint(&endpoint, timeout).await;
        ProbeResult {
            endpoint,
            reachable,
        }
    })
    .await
}

/// Worker pool behind [`probe_all`], generic over the per-endpoint check.
async fn run_pool<F, Fut>(
    endpoints: Vec<Endpoint>,
    concurrency: usize,
    probe: F,
) -> Vec<ProbeResult>
where
    F: Fn(Endpoint) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ProbeResult> + Send + 'static,
{
    let total = endpoints.len();
    if total == 0 {
        return Vec::new();
    }

    let workers = concurrency.clamp(1, total);
    let queue = Arc::new(Mutex::new(VecDeque::from(endpoints)));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut pool = JoinSet::new();
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let tx = tx.clone();
        let probe = probe.clone();
        pool.spawn(async move {
            loop {
                let next = queue.lock().await.pop_front();
                let Some(endpoint) = next else {
                    break;
                };
                if tx.send(probe(endpoint).await).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = rx.recv().await {
        results.push(result);
    }

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            plog(LogLevel::Warn, &format!("Probe worker failed: {}", e));
        }
    }

    results
}

/// Probes endpoints and keeps only the reachable ones, fastest first.
pub async fn reachable_endpoints(
    endpoints: Vec<Endpoint>,
    timeout: Duration,
    concurrency: usize,
) -> Vec<Endpoint> {
    let total = endpoints.len();
    plog(
        LogLevel::Notice,
        &format!("Testing {} bridges (this may take a moment)...", total),
    );

    let reachable: Vec<Endpoint> = probe_all(endpoints, timeout, concurrency)
        .await
        .into_iter()
        .filter(|result| result.reachable)
        .map(|result| result.endpoint)
        .collect();

    plog(
        LogLevel::Notice,
        &format!(
            "Found {} reachable bridges out of {}",
            reachable.len(),
            total
        ),
    );
    reachable
}
