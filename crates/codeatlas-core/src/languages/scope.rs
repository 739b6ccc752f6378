//! Scope tracking and function span walks shared by every language.
//!
//! Indentation languages measure depth in columns, brace languages in open
//! `{` count at the start of the line. Both feed the same [`ScopeStack`].

use super::SpanStyle;
use crate::config::ScopeKind;

/// Width of leading whitespace, with tabs counted as four columns.
pub fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Type,
    Function,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    name: String,
    depth: usize,
}

/// Stack of open type and function scopes.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close every scope that cannot enclose a line at `depth`.
    pub fn enter_line(&mut self, depth: usize) {
        while self.frames.last().is_some_and(|f| f.depth >= depth) {
            self.frames.pop();
        }
    }

    pub fn push_type(&mut self, name: &str, depth: usize) {
        self.frames.push(Frame {
            kind: FrameKind::Type,
            name: name.to_string(),
            depth,
        });
    }

    pub fn push_function(&mut self, name: &str, depth: usize) {
        self.frames.push(Frame {
            kind: FrameKind::Function,
            name: name.to_string(),
            depth,
        });
    }

    /// Qualified name and scope kind for a symbol declared at the current line.
    pub fn qualify(&self, name: &str) -> (String, ScopeKind) {
        let scope = match self.frames.last().map(|f| f.kind) {
            None => ScopeKind::Module,
            Some(FrameKind::Type) => ScopeKind::Class,
            Some(FrameKind::Function) => ScopeKind::Nested,
        };
        let owner = self
            .frames
            .iter()
            .rev()
            .find(|f| f.kind == FrameKind::Type)
            .map(|f| f.name.as_str());
        let qualified = match owner {
            Some(owner) => format!("{owner}.{name}"),
            None => name.to_string(),
        };
        (qualified, scope)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Brace depth at the start of each line of already-masked text.
pub fn brace_depths(masked: &str) -> Vec<usize> {
    let mut depths = Vec::new();
    let mut depth: usize = 0;
    for line in masked.split('\n') {
        depths.push(depth);
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
    }
    depths
}

/// Inclusive 0-based line range of a function body.
pub type Span = (usize, usize);

/// Span of an indentation-delimited function starting at `start`.
///
/// The signature may continue over several lines while parentheses are
/// open; the body is every following line indented deeper than the
/// declaration. Blank lines never end a body.
pub fn indentation_span(masked_lines: &[&str], start: usize) -> Option<Span> {
    let decl = masked_lines.get(start)?;
    let base = indent_width(decl);
    let mut open_parens = paren_balance(decl);
    let mut end = start;

    for (j, line) in masked_lines.iter().enumerate().skip(start + 1) {
        if open_parens > 0 {
            open_parens += paren_balance(line);
            end = j;
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if indent_width(line) <= base {
            break;
        }
        end = j;
    }
    Some((start, end))
}

fn paren_balance(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '(' => acc + 1,
        ')' => acc - 1,
        _ => acc,
    })
}

/// Continuations allowed between a signature and its opening brace.
const SIGNATURE_CONTINUATIONS: &[&str] = &["{", "where", "->", "throws", "rethrows", ":", "=>"];

/// Span of a brace-delimited function starting at `start`.
///
/// Returns the declaration line alone for bodiless declarations (protocol
/// requirements, expression-bodied arrows) and `None` when the body never
/// closes.
pub fn brace_span(masked_lines: &[&str], start: usize) -> Option<Span> {
    masked_lines.get(start)?;
    let mut parens: i64 = 0;
    let mut braces: usize = 0;
    let mut opened = false;

    for j in start..masked_lines.len() {
        let line = masked_lines[j];
        for ch in line.chars() {
            match ch {
                '(' => parens += 1,
                ')' => parens -= 1,
                '{' => {
                    braces += 1;
                    opened = true;
                }
                '}' if opened => {
                    braces = braces.saturating_sub(1);
                    if braces == 0 {
                        return Some((start, j));
                    }
                }
                _ => {}
            }
        }
        if opened {
            continue;
        }
        if parens > 0 {
            continue;
        }
        if let Some(arrow) = line.find("=>") {
            if !line[arrow + 2..].trim().is_empty() {
                return Some((start, j));
            }
        }
        let next = masked_lines
            .iter()
            .skip(j + 1)
            .map(|l| l.trim())
            .find(|l| !l.is_empty());
        match next {
            Some(next) if SIGNATURE_CONTINUATIONS.iter().any(|c| next.starts_with(c)) => {}
            _ => return Some((start, j)),
        }
    }

    if opened {
        None
    } else {
        Some((start, masked_lines.len().saturating_sub(1)))
    }
}

/// Span of the function declared on 0-based line `start`.
pub fn function_span(style: SpanStyle, masked_lines: &[&str], start: usize) -> Option<Span> {
    match style {
        SpanStyle::Indentation => indentation_span(masked_lines, start),
        SpanStyle::Braces => brace_span(masked_lines, start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_counts_tabs_as_four() {
        assert_eq!(indent_width("\tx"), 4);
        assert_eq!(indent_width("  x"), 2);
        assert_eq!(indent_width("x"), 0);
    }

    #[test]
    fn scope_stack_qualifies_members_and_nested() {
        let mut stack = ScopeStack::new();
        stack.enter_line(0);
        stack.push_type("Cache", 0);
        stack.enter_line(4);
        assert_eq!(stack.qualify("get"), ("Cache.get".to_string(), ScopeKind::Class));
        stack.push_function("get", 4);
        stack.enter_line(8);
        assert_eq!(stack.qualify("inner"), ("Cache.inner".to_string(), ScopeKind::Nested));
        stack.enter_line(0);
        assert!(stack.is_empty());
        assert_eq!(stack.qualify("free"), ("free".to_string(), ScopeKind::Module));
    }

    #[test]
    fn brace_depth_per_line() {
        let masked = "class A {\n  m() {\n    x;\n  }\n}\nf();";
        assert_eq!(brace_depths(masked), vec![0, 1, 2, 2, 1, 0]);
    }

    #[test]
    fn indentation_span_stops_at_dedent() {
        let lines = vec!["def f(a,", "      b):", "    x = 1", "", "    return x", "def g():"];
        assert_eq!(indentation_span(&lines, 0), Some((0, 4)));
    }

    #[test]
    fn brace_span_balances() {
        let lines = vec!["function f() {", "  if (a) {", "  }", "}", "function g() {}"];
        assert_eq!(brace_span(&lines, 0), Some((0, 3)));
        assert_eq!(brace_span(&lines, 4), Some((4, 4)));
    }

    #[test]
    fn brace_span_bodiless_declaration() {
        let lines = vec!["    func draw()", "    func erase() {", "    }"];
        assert_eq!(brace_span(&lines, 0), Some((0, 0)));
    }

    #[test]
    fn brace_span_expression_arrow() {
        let lines = vec!["const double = (x) => x * 2;", "function h() {", "}"];
        assert_eq!(brace_span(&lines, 0), Some((0, 0)));
    }

    #[test]
    fn brace_span_unclosed_fails() {
        let lines = vec!["function f() {", "  x();"];
        assert_eq!(brace_span(&lines, 0), None);
    }
}
