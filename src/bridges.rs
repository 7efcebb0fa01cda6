//! Bridge discovery: downloading bridge lists and parsing bridge lines.
//!
//! A bridge line looks like this:
//!
//! ```text
//! obfs4 192.0.2.7:443 0123456789ABCDEF0123456789ABCDEF01234567 cert=AbCd... iat-mode=0
//! ```
//!
//! The full line is kept verbatim as the [`Endpoint`] descriptor because it is
//! written back into the torrc as `Bridge <descriptor>`. Host and port are
//! extracted alongside it for the reachability probe.
//!
//! # Parsing Strategy
//!
//! ```text
//!   raw text ──▶ primary pattern ──▶ matches? ──yes──▶ endpoints
//!                                       │
//!                                       no
//!                                       ▼
//!                         lines starting with "obfs4" ──▶ endpoints
//! ```
//!
//! Parsing never fails. Zero endpoints is a valid result that the
//! orchestrator turns into a fallback to direct connection.
//!
//! # What This Module Does NOT Do
//!
//! - **Captcha solving**: the bridge page is fetched with a plain GET
//! - **Bridge validation**: fingerprints and certs are not checked, only carried

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::LogLevel;
use crate::error::{Error, Result};
use crate::logger::plog;

/// Default page listing obfs4 bridges.
pub const DEFAULT_BRIDGE_URL: &str = "https://bridges.torproject.org/bridges?transport=obfs4";

/// Pluggable transport name handled by this crate.
pub const TRANSPORT: &str = "obfs4";

static BRIDGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"obfs4\s+[\d.]+:\d+\s+[A-F0-9]+\s+cert=[^\s<]+(?:\s+iat-mode=\d+)?")
        .expect("bridge line pattern is valid")
});

/// A candidate bridge.
///
/// Immutable once parsed. `host` and `port` are `None` when the descriptor
/// carries no recognizable `host:port` token; such endpoints are never
/// reachable but are still reported by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    descriptor: String,
    address: Option<(String, u16)>,
}

impl Endpoint {
    /// Builds an endpoint from a bridge line, trimming surrounding whitespace.
    ///
    /// # Example
    ///
    /// ```rust
    /// use torbridge_rs::Endpoint;
    ///
    /// let ep = Endpoint::from_descriptor("obfs4 1.2.3.4:443 ABCD cert=xyz");
    /// assert_eq!(ep.host(), Some("1.2.3.4"));
    /// assert_eq!(ep.port(), Some(443));
    /// assert_eq!(ep.descriptor(), "obfs4 1.2.3.4:443 ABCD cert=xyz");
    /// ```
    pub fn from_descriptor(line: &str) -> Self {
        let descriptor = line.trim().to_string();
        let address = parse_address(&descriptor);
        Self {
            descriptor,
            address,
        }
    }

    /// The original bridge line.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Host part of the bridge address, if one was found.
    pub fn host(&self) -> Option<&str> {
        self.address.as_ref().map(|(host, _)| host.as_str())
    }

    /// Port part of the bridge address, if one was found.
    pub fn port(&self) -> Option<u16> {
        self.address.as_ref().map(|(_, port)| *port)
    }

    /// `host:port` for display, or `"?"` when unknown.
    pub fn address_display(&self) -> String {
        match self.address {
            Some((ref host, port)) if host.contains(':') => format!("[{}]:{}", host, port),
            Some((ref host, port)) => format!("{}:{}", host, port),
            None => "?".to_string(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.descriptor)
    }
}

/// Finds the first `host:port` token after the transport name.
///
/// Accepts IPv4, hostnames, and bracketed IPv6 (`[2001:db8::1]:443`).
/// Tokens containing `=` are key/value arguments and are skipped.
fn parse_address(descriptor: &str) -> Option<(String, u16)> {
    descriptor
        .split_whitespace()
        .skip(1)
        .filter(|token| !token.contains('='))
        .find_map(|token| {
            let (host, port) = token.rsplit_once(':')?;
            let port = port.parse::<u16>().ok()?;
            let host = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);
            if host.is_empty() || port == 0 {
                return None;
            }
            Some((host.to_string(), port))
        })
}

/// Extracts bridge endpoints from raw text or HTML.
///
/// Uses the primary bridge-line pattern first. If that yields nothing, every
/// trimmed line starting with `obfs4` is taken instead. Repeated descriptors
/// are collapsed, keeping the first occurrence and its position.
///
/// # Example
///
/// ```rust
/// use torbridge_rs::bridges::parse_bridges;
///
/// let html = "<div>obfs4 1.2.3.4:443 ABCD cert=xyz iat-mode=0<br/></div>";
/// let endpoints = parse_bridges(html);
/// assert_eq!(endpoints.len(), 1);
/// assert_eq!(endpoints[0].descriptor(), "obfs4 1.2.3.4:443 ABCD cert=xyz iat-mode=0");
///
/// assert!(parse_bridges("no bridges today").is_empty());
/// ```
pub fn parse_bridges(text: &str) -> Vec<Endpoint> {
    let mut lines: Vec<&str> = BRIDGE_LINE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .collect();

    if lines.is_empty() {
        lines = text
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with(TRANSPORT))
            .collect();
        if !lines.is_empty() {
            plog(
                LogLevel::Debug,
                "Primary bridge pattern matched nothing, used line-based fallback",
            );
        }
    }

    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| seen.insert(*line))
        .map(Endpoint::from_descriptor)
        .collect()
}

/// Source of raw bridge-list text.
///
/// The production implementation is [`HttpBridgeSource`]; tests and embedders
/// can supply their own.
#[allow(async_fn_in_trait)]
pub trait BridgeSource {
    /// Returns the raw text to parse for bridge lines.
    async fn fetch(&self) -> Result<String>;
}

/// Downloads the bridge page over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpBridgeSource {
    client: reqwest::Client,
    url: String,
}

impl HttpBridgeSource {
    /// Creates a source for `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Fetch(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// The URL this source downloads.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl BridgeSource for HttpBridgeSource {
    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        response.text().await.map_err(|e| Error::Fetch(e.to_string()))
    }
}

/// Fetches and parses bridges, failing open to an empty list.
///
/// Any fetch error is logged and reported as zero endpoints so that the
/// caller takes its fallback path.
pub async fn fetch_endpoints<S: BridgeSource>(source: &S) -> Vec<Endpoint> {
    plog(LogLevel::Notice, "Fetching fresh bridges...");
    match source.fetch().await {
        Ok(text) => {
            let endpoints = parse_bridges(&text);
            if endpoints.is_empty() {
                plog(LogLevel::Warn, "No bridges found in response");
            } else {
                plog(
                    LogLevel::Notice,
                    &format!("Found {} bridges", endpoints.len()),
                );
            }
            endpoints
        }
        Err(e) => {
            plog(LogLevel::Warn, &format!("Error fetching bridges: {}", e));
            Vec::new()
        }
    }
}
