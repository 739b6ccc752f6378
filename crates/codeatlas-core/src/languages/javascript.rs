//! JavaScript / TypeScript family parser (`.js .jsx .ts .tsx .vue .gs`).
//!
//! Declarations are found by a table of head patterns run over masked text.
//! Each head ends at the opening parenthesis of the parameter list; the
//! matching close paren and what follows it (`{`, `=>`, a TS return type)
//! decide whether the candidate is kept.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::docs::{self, PURPOSE_BUDGET};
use super::mask::{mask_source, CommentSyntax, LineIndex};
use super::params::{matching_paren, normalize_whitespace, parse_params_masked, render_param};
use super::scope::{brace_depths, brace_span, ScopeStack};
use super::{
    dedup_by_name, dedup_tokens, has_export_marker, Capabilities, ImportSyntax, LanguageParser,
    SpanStyle,
};
use crate::config::{EntryPoint, EntryPointKind, FunctionSymbol, Param, ScopeKind};

/// Bumped whenever a pattern below changes what it matches.
pub const PATTERN_VERSION: u32 = 1;

const SYNTAX: CommentSyntax = CommentSyntax {
    line: "//",
    block: Some(("/*", "*/")),
    triple_quotes: false,
    single_quotes: true,
    backticks: true,
};

// ---------------------------------------------------------------------------
// Pattern tables
// ---------------------------------------------------------------------------

/// What must follow a head's parameter list for the match to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Any,
    Body,
    Arrow,
}

struct DeclPattern {
    label: &'static str,
    regex: Regex,
    tail: Tail,
    /// Only meaningful directly inside a class body.
    class_only: bool,
}

fn decl(label: &'static str, pattern: &str, tail: Tail, class_only: bool) -> DeclPattern {
    DeclPattern {
        label,
        regex: Regex::new(pattern).unwrap(),
        tail,
        class_only,
    }
}

const IDENT: &str = r"[A-Za-z_$][\w$]*";

static DECL_PATTERNS: LazyLock<Vec<DeclPattern>> = LazyLock::new(|| {
    vec![
        decl(
            "function_decl",
            &format!(
                r"(?m)^[ \t]*(?:export\s+(?:default\s+)?)?(?:declare\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>{IDENT})\s*(?:<[^>(]*>)?\s*\("
            ),
            Tail::Any,
            false,
        ),
        decl(
            "function_expr",
            &format!(
                r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+(?P<name>{IDENT})\s*(?::[^=\n]+)?=\s*(?:async\s+)?function\b\s*\*?\s*[\w$]*\s*\("
            ),
            Tail::Any,
            false,
        ),
        decl(
            "arrow_binding",
            &format!(
                r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+(?P<name>{IDENT})\s*(?::[^=\n]+?)?=\s*(?:async\s+)?(?:<[^>(]*>\s*)?\("
            ),
            Tail::Arrow,
            false,
        ),
        decl(
            "exports_assign",
            &format!(
                r"(?m)^[ \t]*(?:module\.)?exports\.(?P<name>{IDENT})\s*=\s*(?:async\s+)?function\b\s*[\w$]*\s*\("
            ),
            Tail::Any,
            false,
        ),
        decl(
            "object_function",
            &format!(
                r"(?m)^[ \t]*(?P<name>{IDENT})\s*:\s*(?:async\s+)?function\b\s*\*?\s*[\w$]*\s*\("
            ),
            Tail::Any,
            false,
        ),
        decl(
            "object_arrow",
            &format!(r"(?m)^[ \t]*(?P<name>{IDENT})\s*:\s*(?:async\s+)?\("),
            Tail::Arrow,
            false,
        ),
        decl(
            "class_property_arrow",
            &format!(
                r"(?m)^[ \t]*(?:(?:public|private|protected|static|readonly)\s+)*(?P<name>{IDENT})\s*(?::[^=\n]+?)?=\s*(?:async\s+)?\("
            ),
            Tail::Arrow,
            true,
        ),
        decl(
            "member",
            &format!(
                r"(?m)^[ \t]*(?:(?:public|private|protected|static|async|override|abstract|get|set)\s+)*\*?\s*(?P<name>{IDENT})\s*(?:<[^>(]*>)?\s*\("
            ),
            Tail::Body,
            false,
        ),
    ]
});

static ARROW_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+(?P<name>{IDENT})\s*=\s*(?:async\s+)?(?P<param>{IDENT})\s*=>"
    ))
    .unwrap()
});
static CLASS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(?P<name>{IDENT})"
    ))
    .unwrap()
});
static TYPE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?(?:interface\s+[\w$]+|type\s+[\w$]+(?:<[^>]*>)?\s*=)").unwrap()
});
static EXPORT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*export\s*\{([^}]*)\}").unwrap());

static IMPORT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?m)^[ \t]*import\s+(?:type\s+)?[^;'"(]*?\s+from\s+['"]([^'"]+)['"]"#,
        r#"(?m)^[ \t]*import\s+['"]([^'"]+)['"]"#,
        r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
        r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
        r#"(?m)^[ \t]*export\s+[^;'"(]*?\bfrom\s+['"]([^'"]+)['"]"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static GAS_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\s+(\w+)\s*\(").unwrap());

/// Apps Script simple triggers and their descriptions.
const GAS_TRIGGERS: &[(&str, &str)] = &[
    ("onOpen", "Spreadsheet/Document/Form open event"),
    ("onEdit", "Spreadsheet cell edit event"),
    ("onSelectionChange", "Spreadsheet selection change event"),
    ("onChange", "Spreadsheet structure change event"),
    ("onInstall", "Add-on install event"),
    ("onFormSubmit", "Form submission event"),
    ("doGet", "HTTP GET request handler"),
    ("doPost", "HTTP POST request handler"),
];

static BRANCH_TOKENS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bif\b",
        r"\belse\s+if\b",
        r"\bfor\b",
        r"\bwhile\b",
        r"\bcase\b",
        r"\bcatch\b",
        r"\?",
        r"&&",
        r"\|\|",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Names a head pattern must never turn into a symbol.
static NOT_DECLARATIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "if", "for", "while", "switch", "catch", "function", "return", "with", "else", "do",
        "try", "typeof", "new", "await", "yield", "super", "constructor", "import", "require",
        "delete", "void", "in", "of",
    ]
    .into_iter()
    .collect()
});

static STOPLIST: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "if", "for", "while", "switch", "catch", "typeof", "return", "function", "new",
        "super", "await", "yield", "delete", "void", "in", "of", "console", "require",
        "import", "export", "Math", "Array", "Object", "String", "Number", "Boolean", "Date",
        "Promise", "JSON", "Symbol", "Map", "Set", "Error", "RegExp", "parseInt",
        "parseFloat", "setTimeout", "setInterval", "clearTimeout", "clearInterval",
        "constructor",
    ]
    .into_iter()
    .collect()
});

const SUFFIXES: &[&str] = &[
    "",
    ".js",
    ".ts",
    ".jsx",
    ".tsx",
    ".vue",
    "/index.js",
    "/index.ts",
    "/index.jsx",
    "/index.tsx",
];

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

enum ParamSource {
    Paren { open: usize, close: usize },
    Bare(String),
}

struct Candidate {
    offset: usize,
    line: usize,
    order: usize,
    name: String,
    params: ParamSource,
    return_type: Option<String>,
    class_only: bool,
    exported: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Terminator {
    Body,
    Arrow,
    Other,
}

fn skip_ws(masked: &str, mut pos: usize) -> usize {
    let bytes = masked.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// What follows a parameter list closing at `close`: an optional TS return
/// type, then the terminator.
fn read_tail(masked: &str, raw: &str, close: usize) -> (Terminator, Option<String>) {
    let bytes = masked.as_bytes();
    let mut pos = skip_ws(masked, close + 1);
    let mut return_type = None;

    if bytes.get(pos) == Some(&b':') {
        let start = pos + 1;
        let mut depth: usize = 0;
        let mut j = start;
        while j < bytes.len() {
            match bytes[j] {
                b'=' if depth == 0 && bytes.get(j + 1) == Some(&b'>') => break,
                b'{' | b';' if depth == 0 => break,
                b'(' | b'[' | b'<' => depth += 1,
                b')' | b']' | b'>' => depth = depth.saturating_sub(1),
                _ => {}
            }
            j += 1;
        }
        return_type = Some(normalize_whitespace(&raw[start..j])).filter(|r| !r.is_empty());
        pos = skip_ws(masked, j);
    }

    let rest = &masked[pos..];
    let terminator = if rest.starts_with('{') {
        Terminator::Body
    } else if rest.starts_with("=>") {
        Terminator::Arrow
    } else {
        Terminator::Other
    };
    (terminator, return_type)
}

/// Lines inside `interface` / `type` bodies, where member signatures are
/// types rather than functions.
fn type_only_lines(masked: &str, index: &LineIndex, masked_lines: &[&str]) -> HashSet<usize> {
    let mut lines = HashSet::new();
    for m in TYPE_BLOCK.find_iter(masked) {
        let start = index.line_of(m.start());
        if let Some((s, e)) = brace_span(masked_lines, start) {
            lines.extend(s + 1..=e);
        }
    }
    lines
}

fn collect_candidates(text: &str, masked: &str, index: &LineIndex) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for (order, pattern) in DECL_PATTERNS.iter().enumerate() {
        for caps in pattern.regex.captures_iter(masked) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
                continue;
            };
            if NOT_DECLARATIONS.contains(name.as_str()) {
                continue;
            }
            let open = whole.end() - 1;
            let Some(close) = matching_paren(masked, open) else {
                continue;
            };
            let (terminator, return_type) = read_tail(masked, text, close);
            let keep = match pattern.tail {
                Tail::Any => true,
                Tail::Body => terminator == Terminator::Body,
                Tail::Arrow => terminator == Terminator::Arrow,
            };
            if !keep {
                continue;
            }
            let line = index.line_of(name.start());
            let line_start = index.line_start(line);
            candidates.push(Candidate {
                offset: name.start(),
                line,
                order,
                name: name.as_str().to_string(),
                params: ParamSource::Paren { open, close },
                return_type,
                class_only: pattern.class_only,
                exported: pattern.label == "exports_assign"
                    || has_export_marker(&text[line_start..open]),
            });
        }
    }

    for caps in ARROW_BARE.captures_iter(masked) {
        let (Some(whole), Some(name), Some(param)) =
            (caps.get(0), caps.name("name"), caps.name("param"))
        else {
            continue;
        };
        let line = index.line_of(name.start());
        let line_start = index.line_start(line);
        candidates.push(Candidate {
            offset: name.start(),
            line,
            order: DECL_PATTERNS.len(),
            name: name.as_str().to_string(),
            params: ParamSource::Bare(param.as_str().to_string()),
            return_type: None,
            class_only: false,
            exported: has_export_marker(&text[line_start..whole.end()]),
        });
    }

    // Typed parameters such as `cb: (x) => void` look like declarations.
    let param_ranges: Vec<(usize, usize)> = candidates
        .iter()
        .filter_map(|c| match c.params {
            ParamSource::Paren { open, close } => Some((open, close)),
            ParamSource::Bare(_) => None,
        })
        .collect();
    candidates.retain(|c| {
        !param_ranges
            .iter()
            .any(|&(open, close)| open < c.offset && c.offset < close)
    });

    candidates.sort_by_key(|c| (c.line, c.order));
    candidates
}

fn signature(name: &str, params: &[Param], return_type: Option<&str>) -> String {
    let rendered: Vec<String> = params.iter().map(render_param).collect();
    match return_type {
        Some(r) => format!("{name}({}): {r}", rendered.join(", ")),
        None => format!("{name}({})", rendered.join(", ")),
    }
}

fn is_decorator_or_blank(line: &str) -> bool {
    line.is_empty() || line.starts_with('@')
}

fn is_decorator(line: &str) -> bool {
    line.starts_with('@')
}

/// Names listed in local `export { a, b as c }` statements.
fn export_list_names(masked: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    for caps in EXPORT_LIST.captures_iter(masked) {
        let (Some(whole), Some(list)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if masked[whole.end()..].trim_start().starts_with("from") {
            continue;
        }
        for part in list.as_str().split(',') {
            let local = part.split(" as ").next().unwrap_or("").trim();
            if !local.is_empty() {
                names.insert(local.to_string());
            }
        }
    }
    names
}

/// Blank everything outside `<script>` blocks, keeping line breaks.
pub fn vue_script_view(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_script = false;
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let lower = line.to_ascii_lowercase();
        if lower.contains("</script") {
            in_script = false;
            continue;
        }
        if lower.trim_start().starts_with("<script") {
            in_script = true;
            continue;
        }
        if in_script {
            out.push_str(line);
        }
    }
    out
}

/// Parser for the JavaScript family.
#[derive(Debug, Default)]
pub struct JavaScriptParser;

impl JavaScriptParser {
    pub fn new() -> Self {
        Self
    }

    fn gas_entry_points(&self, text: &str, path: &str) -> Vec<EntryPoint> {
        let masked = mask_source(text, &SYNTAX);
        let lines: Vec<&str> = masked.split('\n').collect();
        let triggers: HashMap<&str, &str> = GAS_TRIGGERS.iter().copied().collect();
        let mut entries = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let Some(c) = GAS_FUNCTION.captures(line) else {
                continue;
            };
            let name = &c[1];
            if let Some(description) = triggers.get(name) {
                let kind = if name.starts_with("do") {
                    EntryPointKind::HttpRoute
                } else {
                    EntryPointKind::ScheduledTrigger
                };
                entries.push(EntryPoint::new(kind, name, path, i + 1).with_trigger(*description));
                continue;
            }
            let window = &lines[i.saturating_sub(5)..=i];
            if window
                .iter()
                .any(|l| l.contains("createMenu") || l.contains("addToUi"))
            {
                entries.push(EntryPoint::new(EntryPointKind::UiMenu, name, path, i + 1));
            }
        }
        entries
    }
}

impl LanguageParser for JavaScriptParser {
    fn name(&self) -> &'static str {
        "JavaScript"
    }

    fn extensions(&self) -> &[&'static str] {
        &["js", "jsx", "vue", "gs", "ts", "tsx"]
    }

    fn capabilities_for(&self, ext: &str) -> Capabilities {
        let typescript = matches!(ext, "ts" | "tsx");
        Capabilities {
            language_name: if typescript { "TypeScript" } else { "JavaScript" }.to_string(),
            default_extension: if typescript { "ts" } else { "js" }.to_string(),
            supports_types: true,
            supports_imports: true,
            supports_purpose: true,
            supports_entry_points: ext == "gs",
            pattern_version: PATTERN_VERSION,
        }
    }

    fn comment_syntax(&self) -> &CommentSyntax {
        &SYNTAX
    }

    fn source_view<'a>(&self, path: &str, text: &'a str) -> Cow<'a, str> {
        let is_vue = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("vue"));
        if is_vue {
            Cow::Owned(vue_script_view(text))
        } else {
            Cow::Borrowed(text)
        }
    }

    fn extract_symbols(&self, text: &str, _path: &str) -> Vec<FunctionSymbol> {
        let masked = mask_source(text, &SYNTAX);
        let index = LineIndex::new(&masked);
        let raw_lines: Vec<&str> = text.split('\n').collect();
        let masked_lines: Vec<&str> = masked.split('\n').collect();
        let depths = brace_depths(&masked);
        let skip_lines = type_only_lines(&masked, &index, &masked_lines);

        let mut candidates = collect_candidates(text, &masked, &index);
        candidates.retain(|c| !skip_lines.contains(&c.line));
        let mut classes: Vec<(usize, String)> = CLASS_DECL
            .captures_iter(&masked)
            .filter_map(|c| c.name("name").map(|n| (index.line_of(n.start()), n.as_str().to_string())))
            .collect();
        classes.sort();

        let mut stack = ScopeStack::new();
        let mut symbols = Vec::new();
        let mut next_candidate = candidates.into_iter().peekable();
        let mut next_class = classes.into_iter().peekable();

        for (i, line) in masked_lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let depth = depths.get(i).copied().unwrap_or(0);
            stack.enter_line(depth);

            while let Some((_, name)) = next_class.next_if(|(l, _)| *l == i) {
                stack.push_type(&name, depth);
            }

            while let Some(cand) = next_candidate.next_if(|c| c.line == i) {
                let (qualified, scope) = stack.qualify(&cand.name);
                if cand.class_only && scope != ScopeKind::Class {
                    continue;
                }

                let mut params = match &cand.params {
                    ParamSource::Paren { open, close } => parse_params_masked(
                        &text[open + 1..*close],
                        &masked[open + 1..*close],
                        true,
                    ),
                    ParamSource::Bare(p) => vec![Param::named(p.clone())],
                };
                let mut return_type = cand.return_type.clone();

                let jsdoc = docs::doc_block_before(&raw_lines, i, is_decorator_or_blank);
                if let Some(block) = &jsdoc {
                    let (doc_params, doc_return) = docs::jsdoc_types(block);
                    for p in params.iter_mut().filter(|p| p.type_name.is_none()) {
                        p.type_name = doc_params.get(&p.name).cloned();
                    }
                    if return_type.is_none() {
                        return_type = doc_return;
                    }
                }
                let purpose = jsdoc
                    .as_ref()
                    .and_then(|block| docs::summarize(block, PURPOSE_BUDGET))
                    .or_else(|| {
                        docs::line_comment_before(&raw_lines, i, "//", is_decorator)
                            .and_then(|run| docs::summarize(&run, PURPOSE_BUDGET))
                    });

                stack.push_function(&cand.name, depth);
                symbols.push(FunctionSymbol {
                    signature: signature(&cand.name, &params, return_type.as_deref()),
                    name: qualified,
                    line: i + 1,
                    scope,
                    params,
                    return_type,
                    purpose,
                    exported: cand.exported,
                });
            }
        }

        let listed = export_list_names(&masked);
        for sym in symbols.iter_mut() {
            if sym.scope == ScopeKind::Module && listed.contains(sym.name.as_str()) {
                sym.exported = true;
            }
        }

        dedup_by_name(symbols)
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        let masked = mask_source(text, &SYNTAX);
        let mut found: Vec<(usize, String)> = Vec::new();
        for pattern in IMPORT_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                // A keyword blanked by masking sits in a comment or string.
                let keyword_at =
                    whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
                if masked.as_bytes().get(keyword_at) != text.as_bytes().get(keyword_at) {
                    continue;
                }
                found.push((keyword_at, token.as_str().to_string()));
            }
        }
        found.sort_by_key(|(pos, _)| *pos);
        dedup_tokens(found.into_iter().map(|(_, t)| t).collect())
    }

    fn module_purpose(&self, text: &str) -> Option<String> {
        let lines: Vec<&str> = text.lines().collect();
        docs::leading_comment(&lines, "//", Some(("/*", "*/")))
    }

    fn detect_entry_points(&self, text: &str, path: &str) -> Vec<EntryPoint> {
        let is_gas = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gs"));
        if is_gas {
            self.gas_entry_points(text, path)
        } else {
            Vec::new()
        }
    }

    fn import_syntax(&self) -> ImportSyntax {
        ImportSyntax::Path
    }

    fn is_relative_import(&self, token: &str) -> bool {
        token.starts_with('.') || token.starts_with('/')
    }

    fn module_suffixes(&self) -> &[&'static str] {
        SUFFIXES
    }

    fn call_stoplist(&self) -> &HashSet<&'static str> {
        &STOPLIST
    }

    fn count_branches(&self, masked_span: &str) -> usize {
        BRANCH_TOKENS
            .iter()
            .map(|re| re.find_iter(masked_span).count())
            .sum()
    }

    fn span_style(&self) -> SpanStyle {
        SpanStyle::Braces
    }
}
