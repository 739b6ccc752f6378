//! Core data types and configuration for a codeatlas scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Enclosing scope kind of an extracted function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// Top level of the file.
    Module,
    /// Member of a class, struct, enum, protocol or extension.
    Class,
    /// Defined inside another function.
    Nested,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Nested => "nested",
        }
    }

    /// Parse a scope label, accepting the labels older cache stores used.
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "module" | "function" => Some(Self::Module),
            "class" | "method" | "type" => Some(Self::Class),
            "nested" => Some(Self::Nested),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parameter of a function signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Param {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            default: None,
        }
    }
}

/// A function or method recovered from source text.
///
/// Identity within a file is the qualified `name` (`Type.member` or bare).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSymbol {
    pub name: String,
    pub line: usize,
    pub scope: ScopeKind,
    pub signature: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// The raw declaration carries an `export`/`public`/`open` marker.
    #[serde(default)]
    pub exported: bool,
}

impl FunctionSymbol {
    /// Name without the enclosing type prefix.
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(_, simple)| simple)
            .unwrap_or(&self.name)
    }

    /// Enclosing type name, if the symbol is qualified.
    pub fn enclosing_type(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(owner, _)| owner)
    }
}

/// Import tokens of one file, split by classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileImports {
    #[serde(default)]
    pub internal: Vec<String>,
    #[serde(default)]
    pub external: Vec<String>,
}

/// Closed set of entry-point categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum EntryPointKind {
    MainBlock,
    MainFunction,
    PackageMain,
    CliRoute,
    HttpRoute,
    ScheduledTrigger,
    UiMenu,
    AppProtocol,
    AppDelegate,
    SceneDelegate,
    Script,
    PackageBin,
    PackageExport,
    Webhook,
    WorkflowTrigger,
}

impl EntryPointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainBlock => "main-block",
            Self::MainFunction => "main-function",
            Self::PackageMain => "package-main",
            Self::CliRoute => "cli-route",
            Self::HttpRoute => "http-route",
            Self::ScheduledTrigger => "scheduled-trigger",
            Self::UiMenu => "ui-menu",
            Self::AppProtocol => "app-protocol",
            Self::AppDelegate => "app-delegate",
            Self::SceneDelegate => "scene-delegate",
            Self::Script => "script",
            Self::PackageBin => "package-bin",
            Self::PackageExport => "package-export",
            Self::Webhook => "webhook",
            Self::WorkflowTrigger => "workflow-trigger",
        }
    }

    /// Description used when a detector has nothing more specific to say.
    pub fn default_trigger(&self) -> &'static str {
        match self {
            Self::MainBlock => "Main block",
            Self::MainFunction => "Module-level main() function",
            Self::PackageMain => "Package entry point",
            Self::CliRoute => "CLI command",
            Self::HttpRoute => "HTTP route handler",
            Self::ScheduledTrigger => "Scheduled or event trigger",
            Self::UiMenu => "Custom menu function",
            Self::AppProtocol => "SwiftUI App protocol",
            Self::AppDelegate => "UIKit AppDelegate",
            Self::SceneDelegate => "UIKit SceneDelegate",
            Self::Script => "HTML script entry",
            Self::PackageBin => "package.json bin field",
            Self::PackageExport => "package.json exports field",
            Self::Webhook => "Workflow webhook trigger",
            Self::WorkflowTrigger => "Workflow trigger node",
        }
    }
}

impl std::fmt::Display for EntryPointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// A location flagged as externally invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    #[serde(rename = "type")]
    pub kind: EntryPointKind,
    pub name: String,
    pub file: String,
    pub line: usize,
    pub trigger: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl EntryPoint {
    pub fn new(kind: EntryPointKind, name: impl Into<String>, file: &str, line: usize) -> Self {
        Self {
            kind,
            name: name.into(),
            file: file.to_string(),
            line,
            trigger: kind.default_trigger().to_string(),
            is_active: true,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A file taken into the scan. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    /// Language name from the parser capabilities, or `None` for documents
    /// that only feed entry-point detection.
    pub language: Option<String>,
    /// Text that was analysed (after any line ceiling was applied).
    pub content: String,
    pub content_hash: String,
    pub was_truncated: bool,
}

/// File-level facts memoized alongside the function list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default)]
    pub imports: FileImports,
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
    #[serde(default)]
    pub was_truncated: bool,
}

/// Everything extracted from one file; this is what the cache stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileExtraction {
    pub functions: Vec<FunctionSymbol>,
    pub meta: FileMeta,
}

/// One package of a monorepo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceNode {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub external_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub internal_dependencies: Vec<String>,
}

/// Versioned workspace dependency table supplied by an external scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceTable {
    #[serde(default = "default_workspace_schema")]
    pub schema_version: u32,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceNode>,
}

fn default_workspace_schema() -> u32 {
    1
}

impl WorkspaceTable {
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| StoreError::json(path, e))
    }
}

/// Names skipped while enumerating the tree.
const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".vscode",
    ".idea",
    "dist",
    "build",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    ".venv",
    "venv",
    ".codeatlas-cache.json",
];

/// Configuration for a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    #[serde(default)]
    pub root: PathBuf,
    /// Extraction worker count; 0 means one per host core.
    #[serde(default)]
    pub jobs: usize,
    /// Byte ceiling per file; 0 means unlimited.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Line ceiling per file; 0 means unlimited.
    #[serde(default)]
    pub max_lines: usize,
    #[serde(default = "default_test_marker")]
    pub test_marker: String,
    #[serde(default = "default_exclude_names")]
    pub exclude_names: Vec<String>,
}

fn default_max_file_size() -> u64 {
    1_000_000
}
fn default_test_marker() -> String {
    "test".to_string()
}
fn default_exclude_names() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            jobs: 0,
            max_file_size: default_max_file_size(),
            max_lines: 0,
            test_marker: default_test_marker(),
            exclude_names: default_exclude_names(),
        }
    }
}

impl ScanConfig {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| StoreError::json(path, e))
    }

    /// Worker count with the host default applied.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
