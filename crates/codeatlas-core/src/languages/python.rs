//! Python parser.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::docs::{self, MODULE_PURPOSE_BUDGET, PURPOSE_BUDGET};
use super::mask::{mask_source, CommentSyntax, LineIndex};
use super::params::{matching_paren, normalize_whitespace, parse_params_masked, render_param};
use super::scope::{indent_width, ScopeStack};
use super::{
    dedup_by_name, dedup_tokens, has_export_marker, Capabilities, ImportSyntax, LanguageParser,
    SpanStyle,
};
use crate::config::{EntryPoint, EntryPointKind, FunctionSymbol, Param};

/// Bumped whenever a pattern below changes what it matches.
pub const PATTERN_VERSION: u32 = 1;

const SYNTAX: CommentSyntax = CommentSyntax {
    line: "#",
    block: None,
    triple_quotes: true,
    single_quotes: true,
    backticks: false,
};

// ---------------------------------------------------------------------------
// Pattern tables
// ---------------------------------------------------------------------------

static CLASS_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*class\s+(\w+)").unwrap());
static DEF_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+(\w+)\s*\(").unwrap());
static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*import\s+(.+)$").unwrap());
static FROM_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*from\s+(\.+[\w.]*|[\w.]+)\s+import\b").unwrap());

static MAIN_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*if\s+__name__\s*==\s*['"]__main__['"]\s*:"#).unwrap());
static CLI_DECORATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*@(?:click\.(?:command|group)|\w+\.cli\.command)\b").unwrap()
});
static FLASK_ROUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*@\w+\.route\s*\(\s*['"](/[^'"]*)['"]"#).unwrap());
static FASTAPI_ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*@\w+\.(get|post|put|delete|patch)\s*\(\s*['"](/[^'"]*)['"]"#).unwrap()
});
static DEF_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+(\w+)").unwrap());
static MODULE_MAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^def\s+main\s*\(").unwrap());

static BRANCH_TOKENS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bif\b",
        r"\belif\b",
        r"\bfor\b",
        r"\bwhile\b",
        r"\bexcept\b",
        r"\band\b",
        r"\bor\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static WITH_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bwith\b[^:]+:").unwrap());

static STOPLIST: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // control flow and operators that may precede a parenthesis
        "if", "elif", "while", "for", "return", "yield", "assert", "not", "and", "or", "in",
        "is", "lambda", "except", "del", "await", "raise", "with", "print",
        // builtins
        "len", "range", "str", "int", "float", "bool", "list", "dict", "set", "tuple", "open",
        "input", "isinstance", "issubclass", "type", "super", "enumerate", "zip", "map",
        "filter", "sorted", "reversed", "min", "max", "sum", "any", "all", "abs", "round",
        "getattr", "setattr", "hasattr", "iter", "next", "repr", "format", "hash", "id",
        "callable", "vars", "dir", "bytes", "object", "property", "staticmethod",
        "classmethod", "Exception", "ValueError", "TypeError", "KeyError", "RuntimeError",
    ]
    .into_iter()
    .collect()
});

static STDLIB: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "abc", "argparse", "ast", "asynchat", "asyncio", "asyncore", "atexit", "base64",
        "bdb", "binascii", "bisect", "builtins", "bz2", "calendar", "cmath", "code", "codecs",
        "codeop", "collections", "colorsys", "concurrent", "configparser", "contextlib",
        "copy", "copyreg", "csv", "ctypes", "curses", "dataclasses", "datetime", "dbm",
        "decimal", "difflib", "dis", "distutils", "doctest", "email", "ensurepip", "enum",
        "errno", "faulthandler", "filecmp", "fileinput", "fnmatch", "fractions", "ftplib",
        "functools", "gc", "getopt", "getpass", "gettext", "glob", "gzip", "hashlib", "heapq",
        "hmac", "html", "http", "imaplib", "importlib", "inspect", "io", "ipaddress",
        "itertools", "json", "keyword", "linecache", "locale", "logging", "lzma", "marshal",
        "math", "mimetypes", "mmap", "modulefinder", "multiprocessing", "netrc", "numbers",
        "operator", "optparse", "os", "pathlib", "pdb", "pickle", "pkgutil", "platform",
        "plistlib", "poplib", "pprint", "profile", "pstats", "queue", "random", "re",
        "readline", "reprlib", "rlcompleter", "runpy", "sched", "secrets", "select",
        "selectors", "shelve", "shlex", "shutil", "signal", "site", "smtplib", "socket",
        "socketserver", "sqlite3", "ssl", "stat", "statistics", "string", "struct",
        "subprocess", "symtable", "sys", "tabnanny", "tarfile", "tempfile", "textwrap",
        "threading", "time", "timeit", "token", "tokenize", "trace", "traceback", "types",
        "typing", "unittest", "urllib", "uuid", "venv", "warnings", "wave", "weakref",
        "xml", "xmlrpc", "zipapp", "zipfile", "zlib",
    ]
    .into_iter()
    .collect()
});

const SUFFIXES: &[&str] = &["", ".py", "/__init__.py"];

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }
}

fn is_decorator(line: &str) -> bool {
    line.starts_with('@')
}

/// Offset of the `:` that ends a signature whose parameters close at `close`.
fn signature_colon(masked: &str, close: usize) -> Option<usize> {
    let mut depth: usize = 0;
    for (i, b) in masked.bytes().enumerate().skip(close + 1) {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => return Some(i),
            b'\n' if depth == 0 => return None,
            _ => {}
        }
    }
    None
}

/// An unbalanced parameter list swallowed a later `def` or `class`.
fn runs_into_declaration(params: &str) -> bool {
    params
        .lines()
        .skip(1)
        .any(|l| DEF_START.is_match(l) || CLASS_DECL.is_match(l))
}

/// Fill parameter and return types the annotations left out.
fn apply_doc_types(params: &mut [Param], return_type: &mut Option<String>, body: &str) {
    let (doc_params, doc_return) = docs::docstring_types(body);
    for p in params.iter_mut().filter(|p| p.type_name.is_none()) {
        if let Some(t) = doc_params
            .get(&p.name)
            .or_else(|| doc_params.get(p.name.trim_start_matches('*')))
        {
            p.type_name = Some(t.clone());
        }
    }
    if return_type.is_none() {
        *return_type = doc_return;
    }
}

fn signature(name: &str, params: &[Param], return_type: Option<&str>) -> String {
    let rendered: Vec<String> = params.iter().map(render_param).collect();
    match return_type {
        Some(r) => format!("{name}({}) -> {r}", rendered.join(", ")),
        None => format!("{name}({})", rendered.join(", ")),
    }
}

/// `def` within the five lines below a decorator.
fn decorated_def(lines: &[&str], decorator: usize) -> Option<(String, usize)> {
    lines
        .iter()
        .enumerate()
        .skip(decorator + 1)
        .take(5)
        .find_map(|(j, l)| DEF_NAME.captures(l).map(|c| (c[1].to_string(), j)))
}

impl LanguageParser for PythonParser {
    fn name(&self) -> &'static str {
        "Python"
    }

    fn extensions(&self) -> &[&'static str] {
        &["py"]
    }

    fn capabilities_for(&self, _ext: &str) -> Capabilities {
        Capabilities {
            language_name: "Python".to_string(),
            default_extension: "py".to_string(),
            supports_types: true,
            supports_imports: true,
            supports_purpose: true,
            supports_entry_points: true,
            pattern_version: PATTERN_VERSION,
        }
    }

    fn comment_syntax(&self) -> &CommentSyntax {
        &SYNTAX
    }

    fn extract_symbols(&self, text: &str, _path: &str) -> Vec<FunctionSymbol> {
        let masked = mask_source(text, &SYNTAX);
        let index = LineIndex::new(&masked);
        let raw_lines: Vec<&str> = text.split('\n').collect();
        let masked_lines: Vec<&str> = masked.split('\n').collect();

        let mut stack = ScopeStack::new();
        let mut symbols = Vec::new();
        let mut resume_at = 0;

        for (i, line) in masked_lines.iter().enumerate() {
            if i < resume_at || line.trim().is_empty() {
                continue;
            }
            let depth = indent_width(line);
            stack.enter_line(depth);

            if let Some(c) = CLASS_DECL.captures(line) {
                stack.push_type(&c[1], depth);
                continue;
            }
            let Some(c) = DEF_START.captures(line) else {
                continue;
            };
            let name = c[1].to_string();
            let open = index.line_start(i) + c[0].len() - 1;
            let Some(close) = matching_paren(&masked, open) else {
                continue;
            };
            if runs_into_declaration(&masked[open..close]) {
                continue;
            }
            let Some(colon) = signature_colon(&masked, close) else {
                continue;
            };
            let decl_end = index.line_of(colon);
            resume_at = decl_end + 1;

            let (qualified, scope) = stack.qualify(&name);
            stack.push_function(&name, depth);

            let mut params = parse_params_masked(&text[open + 1..close], &masked[open + 1..close], false);
            let mut return_type = text[close + 1..colon]
                .trim()
                .strip_prefix("->")
                .map(normalize_whitespace)
                .filter(|r| !r.is_empty());

            let docstring = docs::python_docstring_after(&raw_lines, decl_end);
            if let Some(body) = &docstring {
                apply_doc_types(&mut params, &mut return_type, body);
            }
            let purpose = match &docstring {
                Some(body) => docs::docstring_summary(body, PURPOSE_BUDGET),
                None => None,
            }
            .or_else(|| {
                docs::line_comment_before(&raw_lines, i, "#", is_decorator)
                    .and_then(|run| docs::summarize(&run, PURPOSE_BUDGET))
            });

            let declaration = &text[index.line_start(i)..colon];
            symbols.push(FunctionSymbol {
                signature: signature(&name, &params, return_type.as_deref()),
                name: qualified,
                line: i + 1,
                scope,
                params,
                return_type,
                purpose,
                exported: has_export_marker(declaration),
            });
        }

        dedup_by_name(symbols)
    }

    fn extract_imports(&self, text: &str) -> Vec<String> {
        let masked = mask_source(text, &SYNTAX);
        let mut tokens = Vec::new();
        for line in masked.lines() {
            if let Some(c) = FROM_IMPORT.captures(line) {
                tokens.push(c[1].to_string());
            } else if let Some(c) = IMPORT_LINE.captures(line) {
                for part in c[1].split(',') {
                    let name = part.split(" as ").next().unwrap_or("").trim();
                    let name = name.trim_matches(|ch: char| ch == '(' || ch == ')');
                    if !name.is_empty() {
                        tokens.push(name.to_string());
                    }
                }
            }
        }
        dedup_tokens(tokens)
    }

    fn module_purpose(&self, text: &str) -> Option<String> {
        let lines: Vec<&str> = text.lines().collect();
        let first_code = lines
            .iter()
            .position(|l| {
                let t = l.trim();
                !t.is_empty() && !t.starts_with('#')
            })
            .unwrap_or(lines.len());
        if let Some((body, _)) = docs::python_docstring_at(&lines, first_code) {
            let body_lines: Vec<&str> = body.lines().collect();
            if let Some(purpose) = docs::summarize(&body_lines, MODULE_PURPOSE_BUDGET) {
                return Some(purpose);
            }
        }
        docs::leading_comment(&lines, "#", None)
    }

    fn detect_entry_points(&self, text: &str, path: &str) -> Vec<EntryPoint> {
        let masked = mask_source(text, &SYNTAX);
        let raw_lines: Vec<&str> = text.split('\n').collect();
        let masked_lines: Vec<&str> = masked.split('\n').collect();
        let mut entries = Vec::new();

        let file_name = Path::new(path).file_name().and_then(|n| n.to_str());
        if file_name == Some("__main__.py") {
            entries.push(EntryPoint::new(EntryPointKind::PackageMain, "__main__", path, 1));
        }

        for (i, raw) in raw_lines.iter().enumerate() {
            let live = masked_lines.get(i).map(|m| m.trim()).unwrap_or("");
            if live.is_empty() {
                continue;
            }
            if MAIN_BLOCK.is_match(raw) {
                entries.push(
                    EntryPoint::new(EntryPointKind::MainBlock, "__main__", path, i + 1)
                        .with_trigger("if __name__ == '__main__'"),
                );
            }
            if CLI_DECORATOR.is_match(raw) {
                if let Some((name, j)) = decorated_def(&raw_lines, i) {
                    entries.push(
                        EntryPoint::new(EntryPointKind::CliRoute, name, path, j + 1)
                            .with_trigger("Click CLI command"),
                    );
                }
            }
            if let Some(c) = FLASK_ROUTE.captures(raw) {
                if let Some((name, j)) = decorated_def(&raw_lines, i) {
                    entries.push(
                        EntryPoint::new(EntryPointKind::HttpRoute, name, path, j + 1)
                            .with_trigger(format!("Flask route: {}", &c[1])),
                    );
                }
            }
            if let Some(c) = FASTAPI_ROUTE.captures(raw) {
                if let Some((name, j)) = decorated_def(&raw_lines, i) {
                    entries.push(
                        EntryPoint::new(EntryPointKind::HttpRoute, name, path, j + 1).with_trigger(
                            format!("FastAPI {} {}", c[1].to_ascii_uppercase(), &c[2]),
                        ),
                    );
                }
            }
            if MODULE_MAIN.is_match(masked_lines[i]) {
                entries.push(
                    EntryPoint::new(EntryPointKind::MainFunction, "main", path, i + 1)
                        .with_trigger("def main() function"),
                );
            }
        }
        entries
    }

    fn import_syntax(&self) -> ImportSyntax {
        ImportSyntax::Dotted
    }

    fn is_relative_import(&self, token: &str) -> bool {
        token.starts_with('.')
    }

    fn is_stdlib_import(&self, token: &str) -> bool {
        let base = token.split('.').next().unwrap_or(token);
        STDLIB.contains(base.to_ascii_lowercase().as_str())
    }

    fn module_suffixes(&self) -> &[&'static str] {
        SUFFIXES
    }

    fn call_stoplist(&self) -> &HashSet<&'static str> {
        &STOPLIST
    }

    fn count_branches(&self, masked_span: &str) -> usize {
        let keywords: usize = BRANCH_TOKENS
            .iter()
            .map(|re| re.find_iter(masked_span).count())
            .sum();
        let with_commas: usize = WITH_HEADER
            .find_iter(masked_span)
            .map(|m| m.as_str().matches(',').count())
            .sum();
        keywords + with_commas
    }

    fn span_style(&self) -> SpanStyle {
        SpanStyle::Indentation
    }
}
