//! Language parser trait and registry.
//!
//! Callers dispatch on [`Capabilities`], never on file identity, so a new
//! language is one [`LanguageParser`] implementation plus one
//! [`ParserRegistry::register`] call.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::config::{EntryPoint, FunctionSymbol};

pub mod docs;
pub mod javascript;
pub mod mask;
pub mod params;
pub mod python;
pub mod scope;
pub mod swift;

use mask::CommentSyntax;

/// Optional extraction features a parser may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Types,
    Imports,
    Purpose,
    EntryPoints,
}

/// Fixed capability record attached to each registered extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub language_name: String,
    pub default_extension: String,
    pub supports_types: bool,
    pub supports_imports: bool,
    pub supports_purpose: bool,
    pub supports_entry_points: bool,
    /// Revision of the extraction patterns; cached results from another
    /// revision are not reused.
    pub pattern_version: u32,
}

impl Capabilities {
    pub fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::Types => self.supports_types,
            Feature::Imports => self.supports_imports,
            Feature::Purpose => self.supports_purpose,
            Feature::EntryPoints => self.supports_entry_points,
        }
    }
}

/// How relative import tokens are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSyntax {
    /// `.sibling`, `..pkg.mod`, `a.b.c`
    Dotted,
    /// `./sibling`, `../lib/x`, `/abs`, `pkg/sub`
    Path,
}

/// How a function body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStyle {
    Indentation,
    Braces,
}

/// Trait that all language parsers implement.
///
/// Every method is a pure function of its inputs. Extraction is line-local:
/// a declaration that does not parse yields no symbol and never aborts the
/// rest of the file.
pub trait LanguageParser: Send + Sync {
    /// Human-readable language name (e.g. "Python").
    fn name(&self) -> &'static str;

    /// File extensions this parser handles, lower-case, without the dot.
    fn extensions(&self) -> &[&'static str];

    /// Capability record for one of this parser's extensions.
    fn capabilities_for(&self, ext: &str) -> Capabilities;

    fn comment_syntax(&self) -> &CommentSyntax;

    /// Portion of the file that is source code for this language.
    ///
    /// Must keep line numbers intact.
    fn source_view<'a>(&self, _path: &str, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }

    /// Ordered function symbols, unique by qualified name.
    fn extract_symbols(&self, text: &str, path: &str) -> Vec<FunctionSymbol>;

    /// Raw import tokens in first-seen order, deduplicated.
    fn extract_imports(&self, _text: &str) -> Vec<String> {
        Vec::new()
    }

    /// One-paragraph summary of the file.
    fn module_purpose(&self, text: &str) -> Option<String>;

    fn detect_entry_points(&self, _text: &str, _path: &str) -> Vec<EntryPoint> {
        Vec::new()
    }

    fn import_syntax(&self) -> ImportSyntax;

    /// Whether a token names something inside the tree by syntax alone.
    fn is_relative_import(&self, token: &str) -> bool;

    /// Whether a token names a module of the language's standard library.
    fn is_stdlib_import(&self, _token: &str) -> bool {
        false
    }

    /// Internal vs external classification; a pure function of the token.
    fn is_internal_import(&self, token: &str) -> bool {
        self.is_relative_import(token) || self.is_stdlib_import(token)
    }

    /// Suffix and index-file variants probed during import resolution.
    fn module_suffixes(&self) -> &[&'static str];

    /// Call-like tokens that never name a user function.
    fn call_stoplist(&self) -> &HashSet<&'static str>;

    /// Branch-introducing tokens in already-masked function text.
    fn count_branches(&self, masked_span: &str) -> usize;

    fn span_style(&self) -> SpanStyle;
}

struct Registration {
    parser: Arc<dyn LanguageParser>,
    capabilities: Capabilities,
}

/// Registry mapping file extensions to parsers.
///
/// An explicit value rather than process-wide state; tests build isolated
/// registries with [`ParserRegistry::new`].
pub struct ParserRegistry {
    by_extension: HashMap<String, Registration>,
}

/// Lower-case an extension and strip any leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

impl ParserRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// Registry with every built-in language.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_language(Arc::new(python::PythonParser::new()));
        registry.register_language(Arc::new(javascript::JavaScriptParser::new()));
        registry.register_language(Arc::new(swift::SwiftParser::new()));
        registry
    }

    /// Register a parser for one extension; replaces any earlier entry.
    pub fn register(
        &mut self,
        ext: &str,
        parser: Arc<dyn LanguageParser>,
        capabilities: Capabilities,
    ) {
        let ext = normalize_extension(ext);
        log::debug!("registered {} parser for .{}", capabilities.language_name, ext);
        self.by_extension.insert(
            ext,
            Registration {
                parser,
                capabilities,
            },
        );
    }

    /// Register a parser under each of its extensions with its own capabilities.
    pub fn register_language(&mut self, parser: Arc<dyn LanguageParser>) {
        for ext in parser.extensions() {
            let caps = parser.capabilities_for(ext);
            self.register(ext, Arc::clone(&parser), caps);
        }
    }

    pub fn get_parser(&self, ext: &str) -> Option<&dyn LanguageParser> {
        self.by_extension
            .get(&normalize_extension(ext))
            .map(|r| r.parser.as_ref())
    }

    pub fn capabilities(&self, ext: &str) -> Option<&Capabilities> {
        self.by_extension
            .get(&normalize_extension(ext))
            .map(|r| &r.capabilities)
    }

    /// False for unregistered extensions.
    pub fn supports_feature(&self, ext: &str, feature: Feature) -> bool {
        self.capabilities(ext).is_some_and(|c| c.supports(feature))
    }

    /// Every registration, keyed by extension.
    pub fn languages(&self) -> BTreeMap<&str, &Capabilities> {
        self.by_extension
            .iter()
            .map(|(ext, r)| (ext.as_str(), &r.capabilities))
            .collect()
    }

    /// Parser for a path, by its extension.
    pub fn parser_for_path(&self, path: &str) -> Option<&dyn LanguageParser> {
        let ext = Path::new(path).extension()?.to_str()?;
        self.get_parser(ext)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

static EXPORT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:export|public|open)\b").unwrap());

/// Whether a raw declaration carries an explicit export/public marker.
pub fn has_export_marker(declaration: &str) -> bool {
    EXPORT_MARKER.is_match(declaration)
}

/// Keep the first symbol of each qualified name.
pub(crate) fn dedup_by_name(symbols: Vec<FunctionSymbol>) -> Vec<FunctionSymbol> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .filter(|s| seen.insert(s.name.clone()))
        .collect()
}

/// Keep the first occurrence of each token.
pub(crate) fn dedup_tokens(tokens: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_extensions_and_capabilities() {
        let registry = ParserRegistry::with_builtins();
        let langs = registry.languages();
        for ext in ["py", "js", "jsx", "vue", "gs", "ts", "tsx", "swift"] {
            assert!(langs.contains_key(ext), "missing .{ext}");
        }
        assert_eq!(registry.capabilities("ts").unwrap().language_name, "TypeScript");
        assert!(registry.supports_feature("gs", Feature::EntryPoints));
        assert!(!registry.supports_feature("js", Feature::EntryPoints));
        assert!(!registry.supports_feature("swift", Feature::Imports));
        assert!(registry.supports_feature("swift", Feature::Types));
    }

    #[test]
    fn capabilities_carry_each_pattern_version() {
        let registry = ParserRegistry::with_builtins();
        assert_eq!(registry.capabilities("py").unwrap().pattern_version, python::PATTERN_VERSION);
        assert_eq!(registry.capabilities("tsx").unwrap().pattern_version, javascript::PATTERN_VERSION);
        assert_eq!(registry.capabilities("swift").unwrap().pattern_version, swift::PATTERN_VERSION);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = ParserRegistry::with_builtins();
        assert!(registry.get_parser("PY").is_some());
        assert!(registry.get_parser(".Swift").is_some());
        assert!(registry.parser_for_path("src/App.TSX").is_some());
    }

    #[test]
    fn unregistered_extension_is_not_an_error() {
        let registry = ParserRegistry::with_builtins();
        assert!(registry.get_parser("rb").is_none());
        assert!(!registry.supports_feature("rb", Feature::Types));
        assert!(registry.parser_for_path("Makefile").is_none());
    }

    #[test]
    fn isolated_registry_only_knows_what_it_registered() {
        let mut registry = ParserRegistry::new();
        assert!(registry.languages().is_empty());
        let parser: Arc<dyn LanguageParser> = Arc::new(python::PythonParser::new());
        let mut caps = parser.capabilities_for("py");
        caps.supports_purpose = false;
        registry.register("pyi", parser, caps);
        assert!(registry.get_parser("pyi").is_some());
        assert!(registry.get_parser("py").is_none());
        assert!(!registry.supports_feature("pyi", Feature::Purpose));
    }

    #[test]
    fn export_markers() {
        assert!(has_export_marker("export function f() {"));
        assert!(has_export_marker("    public func run() {"));
        assert!(!has_export_marker("function exporter() {"));
    }
}
