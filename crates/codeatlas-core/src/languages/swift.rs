//! Swift parser.
//!
//! Types (`struct`, `class`, `enum`, `protocol`, `actor`, `extension`) open
//! brace scopes; `func` heads may carry attributes and modifiers and span
//! several lines. Argument labels are kept for the signature while the
//! parameter record holds the internal name.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::docs::{self, PURPOSE_BUDGET};
use super::mask::{mask_source, CommentSyntax, LineIndex};
use super::params::{matching_paren, normalize_whitespace, parse_params_masked, render_param};
use super::scope::{brace_depths, ScopeStack};
use super::{dedup_by_name, has_export_marker, Capabilities, ImportSyntax, LanguageParser, SpanStyle};
use crate::config::{EntryPoint, EntryPointKind, FunctionSymbol, Param};

/// Bumped whenever a pattern below changes what it matches.
pub const PATTERN_VERSION: u32 = 1;

const SYNTAX: CommentSyntax = CommentSyntax {
    line: "//",
    block: Some(("/*", "*/")),
    triple_quotes: true,
    single_quotes: false,
    backticks: false,
};

// ---------------------------------------------------------------------------
// Pattern tables
// ---------------------------------------------------------------------------

static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|internal|fileprivate|open|final|indirect)(?:\(set\))?\s+)*(struct|class|enum|protocol|actor|extension)\s+([A-Za-z_][\w.]*)",
    )
    .unwrap()
});

static FUNC_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|internal|fileprivate|open|static|class|override|mutating|nonmutating|final|required|convenience|nonisolated|optional|dynamic)(?:\([^)]*\))?\s+)*func\s+([A-Za-z_]\w*)\s*(?:<[^>]*>)?\s*\(",
    )
    .unwrap()
});

static EFFECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(async|throws|rethrows)\b").unwrap());
static WHERE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bwhere\b").unwrap());
static PARAM_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:@\w+|\binout|\bsending)\s+").unwrap());

static MAIN_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*@main\s*\n?\s*(?:(?:public|final)\s+)*(?:struct|class|enum)\s+(\w+)")
        .unwrap()
});
static APP_PROTOCOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"struct\s+(\w+)\s*:\s*[^{]*\bApp\b").unwrap());
static APP_DELEGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)\s*:\s*[^{]*\bUIApplicationDelegate\b").unwrap()
});
static SCENE_DELEGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)\s*:\s*[^{]*\bUIWindowSceneDelegate\b").unwrap()
});

static BRANCH_TOKENS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bif\b",
        r"\belse\s+if\b",
        r"\bfor\b",
        r"\bwhile\b",
        r"\bcase\b",
        r"\bguard\b",
        r"\bcatch\b",
        r"\s\?\s",
        r"\?\?",
        r"&&",
        r"\|\|",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static STOPLIST: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "if", "for", "while", "switch", "guard", "return", "catch", "repeat", "defer", "init",
        "super", "self", "print", "debugPrint", "dump", "sizeof", "alignof", "stride",
        "fatalError", "precondition", "assert", "min", "max", "abs", "zip", "type", "String",
        "Int", "Double", "Float", "Bool", "Array", "Dictionary", "Set",
    ]
    .into_iter()
    .collect()
});

/// Tokens that may continue a signature on the next line.
const CONTINUATIONS: &[&str] = &["->", "async", "throws", "rethrows", "where", "{"];

const SUFFIXES: &[&str] = &["", ".swift"];

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SwiftParser;

impl SwiftParser {
    pub fn new() -> Self {
        Self
    }
}

fn is_attribute(line: &str) -> bool {
    line.starts_with('@')
}

/// A parameter plus the argument label written before it, if any.
struct LabelledParam {
    label: Option<String>,
    param: Param,
}

fn labelled_params(raw: &str, masked: &str) -> Vec<LabelledParam> {
    parse_params_masked(raw, masked, true)
        .into_iter()
        .map(|mut param| {
            let mut words = param.name.split_whitespace();
            let first = words.next().unwrap_or_default().to_string();
            let label = match words.next() {
                Some(internal) => {
                    let internal = internal.to_string();
                    param.name = internal;
                    Some(first)
                }
                None => None,
            };
            param.type_name = param
                .type_name
                .map(|t| PARAM_ATTRIBUTE.replace_all(&t, "").trim().to_string())
                .filter(|t| !t.is_empty());
            LabelledParam { label, param }
        })
        .collect()
}

/// End offset (exclusive) of everything between `)` and the body.
fn tail_end(masked: &str, close: usize) -> usize {
    let bytes = masked.as_bytes();
    let mut depth: usize = 0;
    let mut prev = b')';
    for (i, &b) in bytes.iter().enumerate().skip(close + 1) {
        match b {
            b'(' | b'[' | b'<' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b'>' if prev != b'-' => depth = depth.saturating_sub(1),
            b'{' | b'}' | b';' if depth == 0 => return i,
            b'\n' if depth == 0 => {
                let next = masked[i + 1..].trim_start();
                if !CONTINUATIONS.iter().any(|c| next.starts_with(c)) {
                    return i;
                }
            }
            _ => {}
        }
        prev = b;
    }
    bytes.len()
}

/// Effects keywords and return type from a normalized signature tail.
fn read_tail(tail: &str) -> (Vec<String>, Option<String>) {
    let (before_arrow, after_arrow) = match tail.find("->") {
        Some(a) => (&tail[..a], Some(&tail[a + 2..])),
        None => (tail, None),
    };
    let effects = EFFECT
        .captures_iter(before_arrow)
        .map(|c| c[1].to_string())
        .collect();
    let return_type = after_arrow
        .map(|r| match WHERE_CLAUSE.find(r) {
            Some(w) => &r[..w.start()],
            None => r,
        })
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    (effects, return_type)
}

fn signature(
    name: &str,
    params: &[LabelledParam],
    effects: &[String],
    return_type: Option<&str>,
) -> String {
    let rendered: Vec<String> = params
        .iter()
        .map(|p| match &p.label {
            Some(label) => format!("{label} {}", render_param(&p.param)),
            None => render_param(&p.param),
        })
        .collect();
    let mut sig = format!("func {name}({})", rendered.join(", "));
    for effect in effects {
        sig.push(' ');
        sig.push_str(effect);
    }
    if let Some(r) = return_type {
        sig.push_str(" -> ");
        sig.push_str(r);
    }
    sig
}

fn doc_purpose(raw_lines: &[&str], line: usize) -> Option<String> {
    docs::line_comment_before(raw_lines, line, "///", is_attribute)
        .or_else(|| docs::doc_block_before(raw_lines, line, is_attribute))
        .or_else(|| docs::line_comment_before(raw_lines, line, "//", is_attribute))
        .and_then(|run| docs::summarize(&run, PURPOSE_BUDGET))
}

impl LanguageParser for SwiftParser {
    fn name(&self) -> &'static str {
        "Swift"
    }

    fn extensions(&self) -> &[&'static str] {
        &["swift"]
    }

    fn capabilities_for(&self, _ext: &str) -> Capabilities {
        Capabilities {
            language_name: "Swift".to_string(),
            default_extension: "swift".to_string(),
            supports_types: true,
            supports_imports: false,
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
        let depths = brace_depths(&masked);

        let mut stack = ScopeStack::new();
        let mut symbols = Vec::new();

        for (i, line) in masked_lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let depth = depths.get(i).copied().unwrap_or(0);
            stack.enter_line(depth);

            if let Some(c) = TYPE_DECL.captures(line) {
                let name = &c[2];
                if !matches!(name, "func" | "var" | "let" | "subscript") {
                    stack.push_type(name, depth);
                    continue;
                }
            }
            let Some(c) = FUNC_HEAD.captures(line) else {
                continue;
            };
            let name = c[1].to_string();
            let open = index.line_start(i) + c[0].len() - 1;
            let Some(close) = matching_paren(&masked, open) else {
                continue;
            };
            let end = tail_end(&masked, close);

            let params = labelled_params(&text[open + 1..close], &masked[open + 1..close]);
            let (effects, return_type) = read_tail(&normalize_whitespace(&text[close + 1..end]));

            let (qualified, scope) = stack.qualify(&name);
            stack.push_function(&name, depth);

            let declaration = &text[index.line_start(i)..open];
            symbols.push(FunctionSymbol {
                signature: signature(&name, &params, &effects, return_type.as_deref()),
                name: qualified,
                line: i + 1,
                scope,
                params: params.into_iter().map(|p| p.param).collect(),
                return_type,
                purpose: doc_purpose(&raw_lines, i),
                exported: has_export_marker(declaration),
            });
        }

        dedup_by_name(symbols)
    }

    fn module_purpose(&self, text: &str) -> Option<String> {
        let lines: Vec<&str> = text.lines().collect();
        docs::leading_comment(&lines, "///", Some(("/**", "*/"))).or_else(|| {
            if is_template_header(&lines) {
                None
            } else {
                docs::leading_comment(&lines, "//", None)
            }
        })
    }

    fn detect_entry_points(&self, text: &str, path: &str) -> Vec<EntryPoint> {
        let masked = mask_source(text, &SYNTAX);
        let index = LineIndex::new(&masked);
        let mut entries = Vec::new();
        let mut main_types = HashSet::new();

        for c in MAIN_ATTR.captures_iter(&masked) {
            let (Some(whole), Some(name)) = (c.get(0), c.get(1)) else {
                continue;
            };
            let at = whole.start() + whole.as_str().find('@').unwrap_or(0);
            main_types.insert(name.as_str().to_string());
            entries.push(
                EntryPoint::new(EntryPointKind::MainBlock, name.as_str(), path, index.line_of(at) + 1)
                    .with_trigger("@main entry point"),
            );
        }

        for c in APP_PROTOCOL.captures_iter(&masked) {
            let (Some(whole), Some(name)) = (c.get(0), c.get(1)) else {
                continue;
            };
            if main_types.contains(name.as_str()) {
                continue;
            }
            entries.push(EntryPoint::new(
                EntryPointKind::AppProtocol,
                name.as_str(),
                path,
                index.line_of(whole.start()) + 1,
            ));
        }

        for (re, kind) in [
            (&*APP_DELEGATE, EntryPointKind::AppDelegate),
            (&*SCENE_DELEGATE, EntryPointKind::SceneDelegate),
        ] {
            for c in re.captures_iter(&masked) {
                let (Some(whole), Some(name)) = (c.get(0), c.get(1)) else {
                    continue;
                };
                entries.push(EntryPoint::new(
                    kind,
                    name.as_str(),
                    path,
                    index.line_of(whole.start()) + 1,
                ));
            }
        }

        entries.sort_by_key(|e| e.line);
        entries
    }

    fn import_syntax(&self) -> ImportSyntax {
        ImportSyntax::Path
    }

    fn is_relative_import(&self, _token: &str) -> bool {
        false
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

/// Xcode's new-file header: a leading `//` block with a `Created by` line.
fn is_template_header(lines: &[&str]) -> bool {
    lines
        .iter()
        .map(|l| l.trim())
        .skip_while(|l| l.is_empty())
        .take_while(|l| l.starts_with("//"))
        .any(|l| l.trim_start_matches('/').trim().starts_with("Created by"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeKind;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> Vec<FunctionSymbol> {
        SwiftParser::new().extract_symbols(src, "Sources/App.swift")
    }

    #[test]
    fn types_extensions_and_nesting() {
        let src = "\
func topLevel() {}

public final class Store {
    static func shared() -> Store { Store() }

    func load() {
        func helper() {}
    }
}

extension Array where Element: Equatable {
    func unique() -> [Element] { [] }
}

protocol Drawable {
    func draw()
    func erase()
}
";
        let syms = parse(src);
        let got: Vec<_> = syms.iter().map(|s| (s.name.as_str(), s.scope, s.line)).collect();
        assert_eq!(
            got,
            vec![
                ("topLevel", ScopeKind::Module, 1),
                ("Store.shared", ScopeKind::Class, 4),
                ("Store.load", ScopeKind::Class, 6),
                ("Store.helper", ScopeKind::Nested, 7),
                ("Array.unique", ScopeKind::Class, 12),
                ("Drawable.draw", ScopeKind::Class, 16),
                ("Drawable.erase", ScopeKind::Class, 17),
            ]
        );
    }

    #[test]
    fn class_func_is_not_a_type() {
        let src = "class Pool {\n    class func make() -> Pool { Pool() }\n}\nfunc after() {}\n";
        let names: Vec<_> = parse(src).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Pool.make", "after"]);
    }

    #[test]
    fn labels_effects_and_return_type() {
        let src = "\
public func fetch(from url: URL, _ retries: Int = 3, completion: @escaping (Data) -> Void) async throws -> [String: Any] {
    return [:]
}
";
        let syms = parse(src);
        let f = &syms[0];
        assert_eq!(
            f.signature,
            "func fetch(from url: URL, _ retries: Int, completion: (Data) -> Void) async throws -> [String: Any]"
        );
        assert_eq!(f.params[0].name, "url");
        assert_eq!(f.params[1].name, "retries");
        assert_eq!(f.params[1].default.as_deref(), Some("3"));
        assert_eq!(f.params[2].type_name.as_deref(), Some("(Data) -> Void"));
        assert_eq!(f.return_type.as_deref(), Some("[String: Any]"));
        assert!(f.exported);
    }

    #[test]
    fn multi_line_signature_with_where_clause() {
        let src = "\
func merge<T>(
    _ lhs: [T],
    _ rhs: [T]
) rethrows
    -> [T]
    where T: Hashable
{
    lhs + rhs
}
";
        let syms = parse(src);
        assert_eq!(syms.len(), 1);
        assert_eq!(syms[0].params.len(), 2);
        assert_eq!(syms[0].return_type.as_deref(), Some("[T]"));
        assert_eq!(syms[0].signature, "func merge(_ lhs: [T], _ rhs: [T]) rethrows -> [T]");
        assert!(!syms[0].exported);
    }

    #[test]
    fn doc_comment_purpose() {
        let src = "\
/// Renders the badge for a user.
/// Falls back to initials.
@MainActor
func badge(for user: User) -> Image {
    Image()
}

/**
 * Clears caches.
 */
func purge() {}
";
        let syms = parse(src);
        assert_eq!(
            syms[0].purpose.as_deref(),
            Some("Renders the badge for a user. Falls back to initials.")
        );
        assert_eq!(syms[1].purpose.as_deref(), Some("Clears caches."));
    }

    #[test]
    fn funcs_in_strings_and_comments_are_ignored() {
        let src = "let s = \"func fake() {}\"\n// func alsoFake() {}\nlet t = \"\"\"\nfunc inBlock() {}\n\"\"\"\nfunc real() {}\n";
        let names: Vec<_> = parse(src).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["real"]);
    }

    #[test]
    fn entry_points() {
        let src = "\
import SwiftUI

@main
struct WeatherApp: App {
    var body: some Scene { WindowGroup {} }
}

struct Preview: App {
}

class AppDelegate: UIResponder, UIApplicationDelegate {
}

class SceneDelegate: UIResponder, UIWindowSceneDelegate {
}
";
        let eps = SwiftParser::new().detect_entry_points(src, "App.swift");
        let got: Vec<_> = eps.iter().map(|e| (e.kind, e.name.as_str(), e.line)).collect();
        assert_eq!(
            got,
            vec![
                (EntryPointKind::MainBlock, "WeatherApp", 3),
                (EntryPointKind::AppProtocol, "Preview", 8),
                (EntryPointKind::AppDelegate, "AppDelegate", 11),
                (EntryPointKind::SceneDelegate, "SceneDelegate", 14),
            ]
        );
        assert_eq!(eps[0].trigger, "@main entry point");
        assert_eq!(eps[1].trigger, "SwiftUI App protocol");
    }

    #[test]
    fn module_purpose_from_doc_comment() {
        let parser = SwiftParser::new();
        assert_eq!(
            parser.module_purpose("/// Networking helpers.\n\nimport Foundation\n").as_deref(),
            Some("Networking helpers.")
        );
        assert_eq!(parser.module_purpose("//  Created by someone\nimport UIKit\n"), None);
    }

    #[test]
    fn module_purpose_from_plain_line_comments() {
        let parser = SwiftParser::new();
        assert_eq!(
            parser
                .module_purpose("// Routing table for the demo app.\n// Loaded once at launch.\n\nimport Foundation\n")
                .as_deref(),
            Some("Routing table for the demo app. Loaded once at launch.")
        );
        let xcode = "//\n//  Router.swift\n//  Demo\n//\n//  Created by someone on 1/2/24.\n//\n\nimport UIKit\n";
        assert_eq!(parser.module_purpose(xcode), None);
    }

    #[test]
    fn branch_count_and_no_imports() {
        let parser = SwiftParser::new();
        let body = "func f(a: Int?) {\n    guard let a = a else { return }\n    let b = a > 1 ? a : 0\n    if b > 2 && a < 9 {}\n}\n";
        assert_eq!(parser.count_branches(body), 4);
        assert!(parser.extract_imports("import Foundation\n").is_empty());
    }
}
