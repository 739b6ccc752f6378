//! Content-hash keyed memoization of per-file extraction results.
//!
//! The store is keyed by path. An entry is reused only when its stored
//! digest matches the file's current contents and it was produced by the
//! same pattern revision; size and modification time never authorize reuse.
//! Workers read a shared `&CacheStore`; only the pipeline owner calls
//! [`CacheStore::store`] after the join.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::{FileExtraction, FileImports, FileMeta, FunctionSymbol, Param, ScopeKind};
use crate::error::{ScanWarning, StoreError, WarningKind};

pub const CACHE_SCHEMA_VERSION: u32 = 2;

/// Default cache file name, relative to the scan root.
pub const DEFAULT_CACHE_FILE: &str = ".codeatlas-cache.json";

/// Lowercase hex blake3 digest of raw file bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// First 16 hex digits of the sha256 of decoded text, as written by
/// pre-2 stores.
pub fn legacy_content_hash(text: &str) -> String {
    let mut hex = format!("{:x}", Sha256::digest(text.as_bytes()));
    hex.truncate(16);
    hex
}

/// Which digest an entry's `contentHash` holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashKind {
    #[default]
    Blake3,
    LegacySha256,
}

impl HashKind {
    fn is_blake3(&self) -> bool {
        *self == Self::Blake3
    }
}

/// What a file currently looks like to the cache.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprint<'a> {
    /// blake3 of the raw bytes.
    pub hash: &'a str,
    /// Decoded text; only consulted for legacy entries.
    pub text: &'a str,
    pub pattern_version: u32,
}

/// One memoized extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "HashKind::is_blake3")]
    pub hash_kind: HashKind,
    /// Absent on upgraded entries, which match any revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_version: Option<u32>,
    #[serde(default)]
    pub parsed_at: String,
    #[serde(flatten)]
    pub extraction: FileExtraction,
}

/// Versioned on-disk cache document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStore {
    schema_version: u32,
    created_at: String,
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            created_at: Utc::now().to_rfc3339(),
            entries: BTreeMap::new(),
        }
    }

    /// Cached extraction for `path`, if its entry matches `current`.
    pub fn lookup(&self, path: &str, current: &Fingerprint<'_>) -> Option<&FileExtraction> {
        let entry = self.entries.get(path)?;
        if entry
            .pattern_version
            .is_some_and(|v| v != current.pattern_version)
        {
            return None;
        }
        let same_content = match entry.hash_kind {
            HashKind::Blake3 => entry.content_hash == current.hash,
            HashKind::LegacySha256 => entry.content_hash == legacy_content_hash(current.text),
        };
        same_content.then_some(&entry.extraction)
    }

    /// Record an extraction, replacing any earlier entry for `path`.
    pub fn store(&mut self, path: &str, hash: &str, pattern_version: u32, extraction: FileExtraction) {
        self.entries.insert(
            path.to_string(),
            CacheEntry {
                content_hash: hash.to_string(),
                hash_kind: HashKind::Blake3,
                pattern_version: Some(pattern_version),
                parsed_at: Utc::now().to_rfc3339(),
                extraction,
            },
        );
    }

    /// Whether `path` holds an upgraded entry that should be rewritten in
    /// the current form.
    pub fn is_legacy(&self, path: &str) -> bool {
        self.entries
            .get(path)
            .is_some_and(|e| !e.hash_kind.is_blake3() || e.pattern_version.is_none())
    }

    /// Drop entries for paths not in `live`. Returns how many were pruned.
    pub fn retain_paths(&mut self, live: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| live.contains(path));
        before - self.entries.len()
    }

    pub fn get(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Load a store from disk. A missing file is an empty store.
    ///
    /// Only an unreadable file or malformed JSON is an error; callers fall
    /// back to an empty store. Legacy layouts are upgraded, and entries that
    /// cannot be converted are dropped one by one with a warning.
    pub fn load(path: &Path) -> Result<(Self, Vec<ScanWarning>), StoreError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no cache store at {}", path.display());
                return Ok((Self::new(), Vec::new()));
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let value: Value = serde_json::from_str(&text).map_err(|e| StoreError::json(path, e))?;
        let (store, warnings) = Self::from_value(value);
        log::debug!("loaded {} cache entries from {}", store.len(), path.display());
        Ok((store, warnings))
    }

    /// Build a store from any known layout, upgrading as needed.
    pub fn from_value(value: Value) -> (Self, Vec<ScanWarning>) {
        let mut warnings = Vec::new();
        let Value::Object(mut root) = value else {
            warnings.push(ScanWarning::new(
                WarningKind::CacheEntryDiscarded,
                None,
                "cache store is not a JSON object; starting empty",
            ));
            return (Self::new(), warnings);
        };

        let version = root.get("schemaVersion").and_then(schema_number);
        let (label, raw_entries) = match version {
            Some(v) => (
                v.to_string(),
                root.remove("entries").unwrap_or(Value::Object(Default::default())),
            ),
            None if root.contains_key("_schema_version") => {
                let label = match root.get("_schema_version") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => "1".to_string(),
                };
                // Entries sit beside the `_`-prefixed keys unless nested
                let entries = match root.remove("files") {
                    Some(files) => files,
                    None => Value::Object(root.clone()),
                };
                (label, entries)
            }
            None => ("unversioned".to_string(), Value::Object(root.clone())),
        };
        let upgrading = version != Some(u64::from(CACHE_SCHEMA_VERSION));

        let mut store = Self::new();
        if !upgrading {
            if let Some(created) = root.get("createdAt").and_then(Value::as_str) {
                store.created_at = created.to_string();
            }
        }

        let Value::Object(entries) = raw_entries else {
            warnings.push(ScanWarning::new(
                WarningKind::CacheEntryDiscarded,
                None,
                "cache entries are not a JSON object; starting empty",
            ));
            return (store, warnings);
        };

        for (path, raw) in entries {
            if path.starts_with('_') {
                continue;
            }
            match decode_entry(raw) {
                Ok(entry) => {
                    store.entries.insert(path, entry);
                }
                Err(reason) => warnings.push(ScanWarning::new(
                    WarningKind::CacheEntryDiscarded,
                    Some(&path),
                    reason,
                )),
            }
        }

        if upgrading {
            warnings.push(ScanWarning::new(
                WarningKind::CacheUpgraded,
                None,
                format!(
                    "upgraded cache store from schema {label} to {CACHE_SCHEMA_VERSION} ({} entries kept)",
                    store.len()
                ),
            ));
        }
        (store, warnings)
    }

    /// Write the store next to its final location, then rename into place.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string(self).map_err(|e| StoreError::json(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_CACHE_FILE.to_string());
        let tmp = path.with_file_name(format!("{file_name}.tmp"));
        std::fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
        log::debug!("saved {} cache entries to {}", self.len(), path.display());
        Ok(())
    }
}

/// A schema number written as a JSON number or a numeric string.
fn schema_number(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

// ---------------------------------------------------------------------------
// Legacy layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyEntry {
    #[serde(default)]
    content_hash: Option<String>,
    #[serde(default)]
    parsed_at: Option<String>,
    #[serde(default)]
    funcs: Vec<LegacyFunction>,
    #[serde(default)]
    meta: LegacyMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyFunction {
    name: String,
    #[serde(default)]
    line: usize,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    params_typed: Vec<Param>,
    #[serde(default)]
    return_type: Option<String>,
    #[serde(default)]
    purpose: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyMeta {
    #[serde(default)]
    lang: String,
    #[serde(default)]
    purpose: Option<String>,
    #[serde(default)]
    imports_internal: Vec<String>,
    #[serde(default)]
    imports_external: Vec<String>,
    #[serde(default)]
    was_truncated: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl LegacyFunction {
    fn upgrade(self) -> FunctionSymbol {
        let scope = self
            .scope
            .as_deref()
            .and_then(ScopeKind::from_str_value)
            .unwrap_or(if self.name.contains('.') {
                ScopeKind::Class
            } else {
                ScopeKind::Module
            });
        let params = self
            .params_typed
            .into_iter()
            .map(|p| Param {
                type_name: non_empty(p.type_name),
                default: non_empty(p.default),
                name: p.name,
            })
            .collect();
        FunctionSymbol {
            signature: non_empty(self.signature).unwrap_or_else(|| format!("{}()", self.name)),
            name: self.name,
            line: self.line,
            scope,
            params,
            return_type: non_empty(self.return_type),
            purpose: non_empty(self.purpose),
            exported: false,
        }
    }
}

impl LegacyEntry {
    fn upgrade(self) -> Result<CacheEntry, String> {
        let content_hash = non_empty(self.content_hash).ok_or("entry has no content hash")?;
        Ok(CacheEntry {
            content_hash,
            hash_kind: HashKind::LegacySha256,
            pattern_version: None,
            parsed_at: self.parsed_at.unwrap_or_default(),
            extraction: FileExtraction {
                functions: self.funcs.into_iter().map(LegacyFunction::upgrade).collect(),
                meta: FileMeta {
                    language: self.meta.lang,
                    purpose: non_empty(self.meta.purpose),
                    imports: FileImports {
                        internal: self.meta.imports_internal,
                        external: self.meta.imports_external,
                    },
                    entry_points: Vec::new(),
                    was_truncated: self.meta.was_truncated,
                },
            },
        })
    }
}

/// Decode one entry in the current layout, or convert a legacy one.
fn decode_entry(raw: Value) -> Result<CacheEntry, String> {
    let is_current = raw.get("functions").is_some();
    let entry = if is_current {
        serde_json::from_value::<CacheEntry>(raw).map_err(|e| format!("undecodable entry: {e}"))?
    } else if raw.get("funcs").is_some() || raw.get("contentHash").is_some() {
        serde_json::from_value::<LegacyEntry>(raw)
            .map_err(|e| format!("undecodable legacy entry: {e}"))?
            .upgrade()?
    } else {
        return Err("unrecognised entry layout".to_string());
    };
    if entry.content_hash.is_empty() {
        return Err("entry has no content hash".to_string());
    }
    Ok(entry)
}
