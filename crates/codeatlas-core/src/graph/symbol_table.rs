//! Dual HashMap symbol table: file-scoped index + global simple-name index.

use std::collections::HashMap;

use crate::config::{FunctionSymbol, ScopeKind};

/// Fully-qualified identity of a symbol: `file::qualifiedName`.
pub fn symbol_id(file: &str, qualified: &str) -> String {
    format!("{file}::{qualified}")
}

/// Lightweight record shared by both indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDefinition {
    pub symbol_id: String,
    pub file: String,
    /// Qualified name within the file.
    pub name: String,
    pub simple_name: String,
    pub enclosing_type: Option<String>,
    pub scope: ScopeKind,
    pub line: usize,
}

/// Dual HashMap for symbol lookups.
///
/// - `file_index`: file_path → definitions in source order
/// - `global_index`: simple name → definitions in insertion order
///
/// Callers add files in sorted path order, which makes "first global match"
/// deterministic for a given tree.
#[derive(Debug, Default)]
pub struct SymbolTable {
    file_index: HashMap<String, Vec<SymbolDefinition>>,
    global_index: HashMap<String, Vec<SymbolDefinition>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: &str, symbol: &FunctionSymbol) {
        let defn = SymbolDefinition {
            symbol_id: symbol_id(file, &symbol.name),
            file: file.to_string(),
            name: symbol.name.clone(),
            simple_name: symbol.simple_name().to_string(),
            enclosing_type: symbol.enclosing_type().map(String::from),
            scope: symbol.scope,
            line: symbol.line,
        };
        self.global_index
            .entry(defn.simple_name.clone())
            .or_default()
            .push(defn.clone());
        self.file_index
            .entry(file.to_string())
            .or_default()
            .push(defn);
    }

    /// Add every symbol of one file.
    pub fn add_file(&mut self, file: &str, symbols: &[FunctionSymbol]) {
        for symbol in symbols {
            self.add(file, symbol);
        }
    }

    /// Definitions in `file` whose simple name is `simple`, in source order.
    pub fn lookup_in_file(&self, file: &str, simple: &str) -> Vec<&SymbolDefinition> {
        self.symbols_in_file(file)
            .iter()
            .filter(|d| d.simple_name == simple)
            .collect()
    }

    /// Every definition of a simple name across the tree.
    pub fn lookup_global(&self, simple: &str) -> &[SymbolDefinition] {
        self.global_index
            .get(simple)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn symbols_in_file(&self, file: &str) -> &[SymbolDefinition] {
        self.file_index
            .get(file)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.file_index.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.file_index.is_empty()
    }
}
