//! torrc reconciliation.
//!
//! Rewrites the bridge section of a Tor configuration file without touching
//! anything else. The reconciler knows nothing about torrc semantics beyond
//! directive-name prefixes: each line is classified on its own as keep or
//! drop, then an optional generated block is appended.
//!
//! # Classification
//!
//! A line is dropped when its trimmed content starts with one of:
//!
//! | Prefix | Why |
//! |--------|-----|
//! | `UseBridges` | bridge toggle, regenerated |
//! | `Bridge ` | bridge lines, regenerated (note the space: `BridgeRelay` is kept) |
//! | `ClientTransportPlugin` | transport declaration, regenerated |
//! | `EntryNodes` | conflicts with bridges |
//! | `# Bridge configuration` | sentinel of a previously generated block |
//!
//! # Generated Block
//!
//! ```text
//! SocksPort 9050                                  ◄── kept lines, original order
//!                                                 ◄── separator (only if needed)
//! # Bridge configuration (auto-generated)         ◄── sentinel
//! UseBridges 1
//! ClientTransportPlugin obfs4 exec /usr/bin/obfs4proxy
//! Bridge obfs4 192.0.2.10:443 ABCD... cert=...    ◄── first `limit` endpoints
//! ```
//!
//! Both modes are idempotent: reconciling an already reconciled document
//! with the same inputs returns it unchanged.
//!
//! # File Handling
//!
//! A missing or unreadable torrc is read as an empty document. Writing is a
//! whole-file overwrite; a failed write aborts the run with
//! [`Error::Torrc`].
//!
//! Line endings survive a rewrite: a file read with `\r\n` terminators is
//! written back with `\r\n`. Bytes that are not valid UTF-8 do not survive:
//! they are decoded lossily and written back as U+FFFD, even on lines that
//! are kept.

use std::path::Path;

use crate::bridges::{Endpoint, TRANSPORT};
use crate::config::LogLevel;
use crate::error::{Error, Result};
use crate::logger::plog;

/// Marker prefix identifying a generated bridge block.
pub const SENTINEL_COMMENT: &str = "# Bridge configuration";

/// Full sentinel line written before a generated block.
pub const SENTINEL_LINE: &str = "# Bridge configuration (auto-generated)";

/// Line prefixes removed before any new block is written.
pub const REMOVED_PREFIXES: [&str; 5] = [
    "UseBridges",
    "Bridge ",
    "ClientTransportPlugin",
    "EntryNodes",
    SENTINEL_COMMENT,
];

/// Keep/drop decision for one torrc line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Line is unrelated to bridges.
    Keep,
    /// Line belongs to bridge configuration and is removed.
    Drop,
}

/// Classifies a single line. Pure; no state carries between lines.
pub fn classify_line(line: &str) -> LineAction {
    let trimmed = line.trim();
    if REMOVED_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
    {
        LineAction::Drop
    } else {
        LineAction::Keep
    }
}

/// A torrc as an ordered list of lines without terminators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<String>,
    crlf: bool,
}

impl ConfigDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits text into lines. Both `\n` and `\r\n` terminators are accepted.
    ///
    /// If the text uses `\r\n` anywhere, [`render`](Self::render) emits `\r\n`.
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            crlf: text.contains("\r\n"),
        }
    }

    /// Builds a document from individual lines, dropping any trailing line terminator.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|line| {
                    let line = line.as_ref();
                    line.strip_suffix('\n')
                        .map(|l| l.strip_suffix('\r').unwrap_or(l))
                        .unwrap_or(line)
                        .to_string()
                })
                .collect(),
            crlf: false,
        }
    }

    /// The document's lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether the document has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of `Bridge ` lines in the document.
    pub fn bridge_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.trim().starts_with("Bridge "))
            .count()
    }

    /// Whether the document renders with `\r\n` terminators.
    pub fn is_crlf(&self) -> bool {
        self.crlf
    }

    /// Renders the document with a terminator after every line.
    pub fn render(&self) -> String {
        let eol = if self.crlf { "\r\n" } else { "\n" };
        let mut out =
            String::with_capacity(self.lines.iter().map(|l| l.len() + eol.len()).sum());
        for line in &self.lines {
            out.push_str(line);
            out.push_str(eol);
        }
        out
    }

    /// Returns a copy with every bridge-related line removed.
    pub fn strip_bridges(&self) -> Self {
        let mut lines = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            match classify_line(line) {
                LineAction::Keep => lines.push(line.clone()),
                LineAction::Drop => {
                    if line.trim().starts_with("EntryNodes") {
                        plog(
                            LogLevel::Notice,
                            "  Removing EntryNodes (conflicts with bridges)",
                        );
                    }
                }
            }
        }
        Self {
            lines,
            crlf: self.crlf,
        }
    }

    /// Returns a stripped copy with a fresh bridge block appended.
    pub fn with_bridges(&self, block: &BridgeBlock<'_>) -> Self {
        let mut doc = self.strip_bridges();
        if doc.lines.last().is_some_and(|line| !line.trim().is_empty()) {
            doc.lines.push(String::new());
        }
        doc.lines.push(SENTINEL_LINE.to_string());
        doc.lines.push("UseBridges 1".to_string());
        doc.lines.push(format!(
            "ClientTransportPlugin {} exec {}",
            TRANSPORT,
            block.plugin.display()
        ));
        for endpoint in block.endpoints.iter().take(block.limit) {
            doc.lines.push(format!("Bridge {}", endpoint.descriptor()));
        }
        doc
    }
}

/// Inputs for the generated bridge block.
#[derive(Debug, Clone, Copy)]
pub struct BridgeBlock<'a> {
    /// Path of the pluggable transport binary.
    pub plugin: &'a Path,
    /// Candidate bridges, best first.
    pub endpoints: &'a [Endpoint],
    /// Maximum number of `Bridge` lines; excess endpoints are dropped.
    pub limit: usize,
}

/// What [`reconcile`] should do after stripping.
#[derive(Debug, Clone, Copy)]
pub enum ReconcileMode<'a> {
    /// Append a bridge block.
    Enable(BridgeBlock<'a>),
    /// Strip only.
    Disable,
}

/// Strips bridge configuration and, in enable mode, appends a new block.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use torbridge_rs::torrc::{reconcile, BridgeBlock, ConfigDocument, ReconcileMode};
/// use torbridge_rs::Endpoint;
///
/// let doc = ConfigDocument::parse("SocksPort 9050\nUseBridges 1\nBridge obfs4 old\n");
/// let endpoints = [Endpoint::from_descriptor("obfs4 1.2.3.4:443 ABCD cert=xyz")];
///
/// let enabled = reconcile(
///     &doc,
///     ReconcileMode::Enable(BridgeBlock {
///         plugin: Path::new("/usr/bin/obfs4proxy"),
///         endpoints: &endpoints,
///         limit: 3,
///     }),
/// );
/// assert_eq!(enabled.bridge_count(), 1);
///
/// let disabled = reconcile(&enabled, ReconcileMode::Disable);
/// assert_eq!(disabled.bridge_count(), 0);
/// ```
pub fn reconcile(doc: &ConfigDocument, mode: ReconcileMode<'_>) -> ConfigDocument {
    match mode {
        ReconcileMode::Enable(block) => doc.with_bridges(&block),
        ReconcileMode::Disable => doc.strip_bridges(),
    }
}

/// Reads a torrc. Missing or unreadable files yield an empty document.
///
/// Invalid UTF-8 is replaced rather than rejected so an odd byte in a comment
/// cannot turn the whole file into an empty document.
pub fn read_torrc(path: &Path) -> ConfigDocument {
    match std::fs::read(path) {
        Ok(bytes) => ConfigDocument::parse(&String::from_utf8_lossy(&bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            plog(
                LogLevel::Warn,
                &format!("torrc not found at {}, creating new one", path.display()),
            );
            ConfigDocument::new()
        }
        Err(e) => {
            plog(
                LogLevel::Warn,
                &format!(
                    "Cannot read torrc at {}: {}; treating as empty",
                    path.display(),
                    e
                ),
            );
            ConfigDocument::new()
        }
    }
}

/// Overwrites the torrc with `doc`.
///
/// # Errors
///
/// Returns [`Error::Torrc`] if the file cannot be written.
pub fn write_torrc(path: &Path, doc: &ConfigDocument) -> Result<()> {
    std::fs::write(path, doc.render())
        .map_err(|e| Error::Torrc(format!("cannot write {}: {}", path.display(), e)))
}

/// Reads, reconciles and writes back the torrc at `path`.
///
/// Returns the document that was written.
pub fn reconcile_file(path: &Path, mode: ReconcileMode<'_>) -> Result<ConfigDocument> {
    let doc = reconcile(&read_torrc(path), mode);
    write_torrc(path, &doc)?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PLUGIN: &str = "/usr/bin/obfs4proxy";

    fn endpoints(n: usize) -> Vec<Endpoint> {
        (0..n)
            .map(|i| Endpoint::from_descriptor(&format!("obfs4 10.0.0.{}:443 ABCD cert=c{}", i + 1, i)))
            .collect()
    }

    fn enable(doc: &ConfigDocument, eps: &[Endpoint], limit: usize) -> ConfigDocument {
        reconcile(
            doc,
            ReconcileMode::Enable(BridgeBlock {
                plugin: Path::new(PLUGIN),
                endpoints: eps,
                limit,
            }),
        )
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("UseBridges 1"), LineAction::Drop);
        assert_eq!(classify_line("  Bridge obfs4 1.2.3.4:1 X"), LineAction::Drop);
        assert_eq!(classify_line("ClientTransportPlugin obfs4 exec /x"), LineAction::Drop);
        assert_eq!(classify_line("EntryNodes {us}"), LineAction::Drop);
        assert_eq!(classify_line("# Bridge configuration (auto-generated)"), LineAction::Drop);
        assert_eq!(classify_line("BridgeRelay 1"), LineAction::Keep);
        assert_eq!(classify_line("Bridge"), LineAction::Keep);
        assert_eq!(classify_line("SocksPort 9050"), LineAction::Keep);
        assert_eq!(classify_line("# UseBridges 1"), LineAction::Keep);
        assert_eq!(classify_line(""), LineAction::Keep);
    }

    #[test]
    fn test_enable_scenario() {
        let doc = ConfigDocument::from_lines(["SocksPort 9050\n"]);
        let eps = [Endpoint::from_descriptor("obfs4 1.2.3.4:443 ABCD cert=xyz")];
        let out = enable(&doc, &eps, 3);

        let lines = out.lines();
        let pos = |needle: &str| lines.iter().position(|l| l.starts_with(needle)).unwrap();
        let socks = pos("SocksPort 9050");
        let use_bridges = pos("UseBridges 1");
        let plugin = pos("ClientTransportPlugin obfs4 exec ");
        let bridge = pos("Bridge obfs4 1.2.3.4:443 ABCD cert=xyz");
        assert!(socks < use_bridges && use_bridges < plugin && plugin < bridge);
        assert_eq!(lines[plugin], format!("ClientTransportPlugin obfs4 exec {}", PLUGIN));
    }

    #[test]
    fn test_enable_respects_limit_and_order() {
        let eps = endpoints(5);
        let out = enable(&ConfigDocument::new(), &eps, 3);
        let bridges: Vec<&String> = out.lines().iter().filter(|l| l.starts_with("Bridge ")).collect();
        assert_eq!(bridges.len(), 3);
        assert_eq!(bridges[0], &format!("Bridge {}", eps[0].descriptor()));
        assert_eq!(bridges[2], &format!("Bridge {}", eps[2].descriptor()));
    }

    #[test]
    fn test_enable_replaces_previous_block() {
        let doc = ConfigDocument::parse(
            "SocksPort 9050\nEntryNodes {de}\n\n# Bridge configuration (auto-generated)\nUseBridges 1\nClientTransportPlugin obfs4 exec /old\nBridge obfs4 9.9.9.9:1 OLD cert=old\nControlPort 9051\n",
        );
        let out = enable(&doc, &endpoints(1), 3);
        assert_eq!(out.bridge_count(), 1);
        assert!(!out.lines().iter().any(|l| l.contains("9.9.9.9")));
        assert!(!out.lines().iter().any(|l| l.starts_with("EntryNodes")));
        assert_eq!(
            out.lines().iter().filter(|l| l.starts_with(SENTINEL_COMMENT)).count(),
            1
        );
        let control = out.lines().iter().position(|l| l == "ControlPort 9051").unwrap();
        let sentinel = out.lines().iter().position(|l| l == SENTINEL_LINE).unwrap();
        assert!(control < sentinel);
    }

    #[test]
    fn test_enable_is_idempotent() {
        let doc = ConfigDocument::parse("SocksPort 9050\nControlPort 9051\n");
        let eps = endpoints(2);
        let once = enable(&doc, &eps, 3);
        let twice = enable(&once, &eps, 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_enable_on_empty_document_has_no_separator() {
        let out = enable(&ConfigDocument::new(), &endpoints(1), 3);
        assert_eq!(out.lines()[0], SENTINEL_LINE);
    }

    #[test]
    fn test_disable_strips_only_bridge_lines() {
        let doc = ConfigDocument::parse(
            "SocksPort 9050\nUseBridges 1\nBridge obfs4 1.2.3.4:443 X cert=y\nBridgeRelay 0\nLog notice stdout\n",
        );
        let out = reconcile(&doc, ReconcileMode::Disable);
        assert_eq!(out.lines(), ["SocksPort 9050", "BridgeRelay 0", "Log notice stdout"]);
    }

    #[test]
    fn test_render_and_crlf() {
        let doc = ConfigDocument::parse("A 1\r\nB 2\r\n");
        assert_eq!(doc.lines(), ["A 1", "B 2"]);
        assert!(doc.is_crlf());
        assert_eq!(doc.render(), "A 1\r\nB 2\r\n");
        assert_eq!(ConfigDocument::parse("A 1\nB 2\n").render(), "A 1\nB 2\n");
        assert_eq!(ConfigDocument::new().render(), "");
        assert_eq!(ConfigDocument::from_lines(["X\r\n", "Y"]).lines(), ["X", "Y"]);
    }

    #[test]
    fn test_crlf_file_keeps_line_endings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("torrc");
        std::fs::write(&path, "SocksPort 9050\r\nUseBridges 1\r\nLog notice stdout\r\n").unwrap();

        reconcile_file(&path, ReconcileMode::Disable).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "SocksPort 9050\r\nLog notice stdout\r\n"
        );

        reconcile_file(
            &path,
            ReconcileMode::Enable(BridgeBlock {
                plugin: Path::new(PLUGIN),
                endpoints: &endpoints(1),
                limit: 3,
            }),
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("SocksPort 9050\r\nLog notice stdout\r\n\r\n"));
        assert_eq!(text.matches("\r\n").count(), text.matches('\n').count());
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("torrc");
        std::fs::write(&path, b"# caf\xe9\nSocksPort 9050\nUseBridges 1\n").unwrap();

        let doc = reconcile_file(&path, ReconcileMode::Disable).unwrap();
        assert_eq!(doc.lines(), ["# caf\u{FFFD}", "SocksPort 9050"]);
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let doc = read_torrc(&dir.path().join("absent"));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_reconcile_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("torrc");
        std::fs::write(&path, "SocksPort 9050\n").unwrap();

        let written = reconcile_file(
            &path,
            ReconcileMode::Enable(BridgeBlock {
                plugin: Path::new(PLUGIN),
                endpoints: &endpoints(2),
                limit: 3,
            }),
        )
        .unwrap();
        assert_eq!(read_torrc(&path), written);
        assert_eq!(written.bridge_count(), 2);

        reconcile_file(&path, ReconcileMode::Disable).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SocksPort 9050\n\n");
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no/such/dir/torrc");
        let result = write_torrc(&path, &ConfigDocument::new());
        assert!(matches!(result, Err(Error::Torrc(_))));
    }
}
