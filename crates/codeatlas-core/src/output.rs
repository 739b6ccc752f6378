//! Whole-tree result records and JSON serialisation.
//!
//! Field names and nesting here are what renderers consume.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{EntryPoint, FileImports, FunctionSymbol};
use crate::error::{ScanWarning, StoreError};
use crate::phases::complexity::ComplexityReport;
use crate::phases::extraction::ExtractedFile;
use crate::phases::imports::{ImportRecord, UnresolvedImport};
use crate::phases::workspaces::WorkspaceReport;

/// Output format version.
pub const RESULT_VERSION: &str = "1.0";

/// Per-file record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub path: String,
    pub language: String,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub imports: FileImports,
    pub functions: Vec<FunctionSymbol>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<EntryPoint>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub was_truncated: bool,
}

impl FileRecord {
    pub fn from_extracted(file: &ExtractedFile) -> Self {
        let meta = &file.extraction.meta;
        Self {
            path: file.source.path.clone(),
            language: meta.language.clone(),
            content_hash: file.source.content_hash.clone(),
            purpose: meta.purpose.clone(),
            imports: meta.imports.clone(),
            functions: file.extraction.functions.clone(),
            entry_points: meta.entry_points.clone(),
            was_truncated: file.source.was_truncated,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallGraphStats {
    pub total_functions: usize,
    pub total_edges: usize,
    pub circular_count: usize,
    pub dead_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallGraphReport {
    /// Symbol id to callee ids.
    pub functions: BTreeMap<String, Vec<String>>,
    pub circular_calls: Vec<Vec<String>>,
    pub dead_functions: Vec<String>,
    pub stats: CallGraphStats,
}

impl CallGraphReport {
    pub fn new(
        functions: BTreeMap<String, Vec<String>>,
        circular_calls: Vec<Vec<String>>,
        dead_functions: Vec<String>,
    ) -> Self {
        let stats = CallGraphStats {
            total_functions: functions.len(),
            total_edges: functions.values().map(Vec::len).sum(),
            circular_count: circular_calls.len(),
            dead_count: dead_functions.len(),
        };
        Self {
            functions,
            circular_calls,
            dead_functions,
            stats,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub files: usize,
    pub functions: usize,
    pub import_edges: usize,
    pub call_edges: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub skipped: usize,
}

/// Complete result of one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub version: String,
    pub generated_at: String,
    pub root: String,
    pub files: Vec<FileRecord>,
    pub imports: Vec<ImportRecord>,
    pub unresolved_imports: Vec<UnresolvedImport>,
    pub circular_imports: Vec<Vec<String>>,
    pub call_graph: CallGraphReport,
    pub complexity: ComplexityReport,
    pub entry_points: Vec<EntryPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<WorkspaceReport>,
    pub warnings: Vec<ScanWarning>,
    pub stats: ScanStats,
    /// Seconds per phase.
    pub phase_timings: BTreeMap<String, f64>,
}

impl ScanResult {
    /// Empty result stamped with the current time.
    pub fn new(root: &Path) -> Self {
        Self {
            version: RESULT_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            root: root.to_string_lossy().to_string(),
            files: Vec::new(),
            imports: Vec::new(),
            unresolved_imports: Vec::new(),
            circular_imports: Vec::new(),
            call_graph: CallGraphReport::default(),
            complexity: ComplexityReport::default(),
            entry_points: Vec::new(),
            workspaces: None,
            warnings: Vec::new(),
            stats: ScanStats::default(),
            phase_timings: BTreeMap::new(),
        }
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Write the result as pretty JSON, creating parent directories.
pub fn write_output(result: &ScanResult, output_path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(result).map_err(|e| StoreError::json(output_path, e))?;
    std::fs::write(output_path, json).map_err(|e| StoreError::io(output_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntryPointKind, ScopeKind};

    fn sample() -> ScanResult {
        let mut result = ScanResult::new(Path::new("/tmp/repo"));
        result.files.push(FileRecord {
            path: "a.py".to_string(),
            language: "Python".to_string(),
            content_hash: "abc".to_string(),
            purpose: None,
            imports: FileImports::default(),
            functions: vec![FunctionSymbol {
                name: "helper".to_string(),
                line: 1,
                scope: ScopeKind::Module,
                signature: "helper()".to_string(),
                params: vec![],
                return_type: None,
                purpose: None,
                exported: false,
            }],
            entry_points: vec![],
            was_truncated: false,
        });
        result.entry_points.push(EntryPoint::new(EntryPointKind::MainBlock, "__main__", "a.py", 9));
        result.call_graph = CallGraphReport::new(
            BTreeMap::from([("a.py::helper".to_string(), vec![])]),
            vec![],
            vec![],
        );
        result
    }

    #[test]
    fn camel_case_contract_fields() {
        let json = serde_json::to_value(sample()).unwrap();
        for key in [
            "version",
            "generatedAt",
            "files",
            "imports",
            "unresolvedImports",
            "circularImports",
            "callGraph",
            "complexity",
            "entryPoints",
            "warnings",
            "stats",
            "phaseTimings",
        ] {
            assert!(json.get(key).is_some(), "Missing key: {key}");
        }
        assert!(json.get("workspaces").is_none());
        let file = &json["files"][0];
        assert_eq!(file["contentHash"], "abc");
        assert!(file.get("entryPoints").is_none());
        assert!(file.get("wasTruncated").is_none());
        assert_eq!(json["callGraph"]["stats"]["totalFunctions"], 1);
        assert!(json["callGraph"].get("deadFunctions").is_some());
        assert!(json["callGraph"].get("circularCalls").is_some());
    }

    #[test]
    fn write_output_creates_parents_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out.json");
        let result = sample();
        write_output(&result, &out).unwrap();
        let parsed: ScanResult = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(parsed, result);
    }
}
