//! Error and warning types.
//!
//! Only [`ScanError`] aborts a scan. Everything recoverable is reported as a
//! [`ScanWarning`] and the scan carries on.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal scan failure.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot enumerate source tree at {}: {source}", path.display())]
    Enumerate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build extraction worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure reading or writing one of the persisted JSON documents
/// (cache store, config file, workspace table, scan output).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Category of a recoverable condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// File exceeded the byte ceiling and was skipped.
    Oversized,
    /// File could not be read.
    Unreadable,
    /// Parser failed on the file; it is excluded from symbol output.
    Unparsable,
    /// File exceeded the line ceiling and only its head was analysed.
    Truncated,
    /// A cache entry could not be upgraded or decoded and was dropped.
    CacheEntryDiscarded,
    /// The cache store was written by an older schema and was upgraded.
    CacheUpgraded,
    /// The cache store could not be read or written; the scan ran without it.
    CacheUnavailable,
    /// A directory below the root could not be listed.
    Enumeration,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oversized => "oversized",
            Self::Unreadable => "unreadable",
            Self::Unparsable => "unparsable",
            Self::Truncated => "truncated",
            Self::CacheEntryDiscarded => "cache-entry-discarded",
            Self::CacheUpgraded => "cache-upgraded",
            Self::CacheUnavailable => "cache-unavailable",
            Self::Enumeration => "enumeration",
        }
    }
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured record of a recoverable condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanWarning {
    pub kind: WarningKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

impl ScanWarning {
    /// Create a warning and emit it through the `log` facade.
    pub fn new(kind: WarningKind, path: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match path {
            Some(p) => log::warn!("[{kind}] {p}: {message}"),
            None => log::warn!("[{kind}] {message}"),
        }
        Self {
            kind,
            path: path.map(String::from),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_serializes_kebab_kind() {
        let w = ScanWarning::new(WarningKind::CacheEntryDiscarded, Some("a.py"), "bad entry");
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"kind\":\"cache-entry-discarded\""));
        assert!(json.contains("\"path\":\"a.py\""));
    }

    #[test]
    fn warning_without_path_omits_field() {
        let w = ScanWarning::new(WarningKind::CacheUpgraded, None, "upgraded");
        let json = serde_json::to_string(&w).unwrap();
        assert!(!json.contains("path"));
    }

    #[test]
    fn scan_error_display_names_path() {
        let err = ScanError::Enumerate {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nope"));
    }
}
