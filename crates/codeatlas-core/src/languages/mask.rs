//! Comment/string masking and offset-to-line lookup.
//!
//! Extraction runs its declaration patterns over masked text so that code
//! inside comments, docstrings and string literals never yields symbols or
//! call tokens. Masking preserves byte length and newline positions, so any
//! offset in the masked text is valid in the original.

/// Lexical conventions needed to blank comments and string literals.
#[derive(Debug, Clone, Copy)]
pub struct CommentSyntax {
    pub line: &'static str,
    pub block: Option<(&'static str, &'static str)>,
    /// `"""` / `'''` strings that may span lines.
    pub triple_quotes: bool,
    /// `'` delimits strings (not character literals or apostrophes).
    pub single_quotes: bool,
    /// Backtick template strings that may span lines.
    pub backticks: bool,
}

#[derive(Clone, Copy)]
enum State {
    Code,
    LineComment,
    Block(&'static str),
    Str(char),
    Triple(&'static str),
}

fn blank(out: &mut String, ch: char) {
    for _ in 0..ch.len_utf8() {
        out.push(' ');
    }
}

/// Replace comment text and string literal bodies with spaces.
///
/// Quote characters are kept so empty strings stay visible. An unterminated
/// single-line string ends at the newline.
pub fn mask_source(text: &str, syntax: &CommentSyntax) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        let rest = &text[i..];
        match state {
            State::Code => {
                if rest.starts_with(syntax.line) {
                    blank(&mut out, ch);
                    state = State::LineComment;
                } else if let Some((open, close)) = syntax
                    .block
                    .filter(|(open, _)| rest.starts_with(*open))
                {
                    blank(&mut out, ch);
                    for _ in 1..open.len() {
                        if let Some((_, c)) = chars.next() {
                            blank(&mut out, c);
                        }
                    }
                    state = State::Block(close);
                } else if syntax.triple_quotes
                    && (rest.starts_with("\"\"\"") || rest.starts_with("'''"))
                {
                    let delim = if ch == '"' { "\"\"\"" } else { "'''" };
                    out.push_str(delim);
                    chars.next();
                    chars.next();
                    state = State::Triple(delim);
                } else if ch == '"'
                    || (ch == '\'' && syntax.single_quotes)
                    || (ch == '`' && syntax.backticks)
                {
                    out.push(ch);
                    state = State::Str(ch);
                } else {
                    out.push(ch);
                }
            }
            State::LineComment => {
                if ch == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    blank(&mut out, ch);
                }
            }
            State::Block(close) => {
                if rest.starts_with(close) {
                    blank(&mut out, ch);
                    for _ in 1..close.len() {
                        if let Some((_, c)) = chars.next() {
                            blank(&mut out, c);
                        }
                    }
                    state = State::Code;
                } else if ch == '\n' {
                    out.push('\n');
                } else {
                    blank(&mut out, ch);
                }
            }
            State::Str(quote) => {
                if ch == '\\' {
                    blank(&mut out, ch);
                    if let Some(&(_, next)) = chars.peek() {
                        if next != '\n' {
                            chars.next();
                            blank(&mut out, next);
                        }
                    }
                } else if ch == quote {
                    out.push(ch);
                    state = State::Code;
                } else if ch == '\n' {
                    out.push('\n');
                    if quote != '`' {
                        state = State::Code;
                    }
                } else {
                    blank(&mut out, ch);
                }
            }
            State::Triple(delim) => {
                if ch == '\\' {
                    blank(&mut out, ch);
                    if let Some(&(_, next)) = chars.peek() {
                        if next != '\n' {
                            chars.next();
                            blank(&mut out, next);
                        }
                    }
                } else if rest.starts_with(delim) {
                    out.push_str(delim);
                    chars.next();
                    chars.next();
                    state = State::Code;
                } else if ch == '\n' {
                    out.push('\n');
                } else {
                    blank(&mut out, ch);
                }
            }
        }
    }

    out
}

/// Byte offset to 0-based line number.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset).saturating_sub(1)
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.starts.get(line).copied().unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: CommentSyntax = CommentSyntax {
        line: "#",
        block: None,
        triple_quotes: true,
        single_quotes: true,
        backticks: false,
    };

    const SLASH: CommentSyntax = CommentSyntax {
        line: "//",
        block: Some(("/*", "*/")),
        triple_quotes: false,
        single_quotes: true,
        backticks: true,
    };

    #[test]
    fn mask_preserves_length_and_lines() {
        let src = "def f():\n    \"\"\"call g() here\"\"\"\n    return h('x(') # y()\n";
        let masked = mask_source(src, &HASH);
        assert_eq!(masked.len(), src.len());
        assert_eq!(masked.lines().count(), src.lines().count());
        assert!(!masked.contains("g()"));
        assert!(!masked.contains("y()"));
        assert!(masked.contains("return h("));
    }

    #[test]
    fn mask_handles_block_comments_and_templates() {
        let src = "/* a() */ let s = `x\n${y()}`;\nfoo(); // bar()\n";
        let masked = mask_source(src, &SLASH);
        assert!(!masked.contains("a()"));
        assert!(!masked.contains("bar()"));
        assert!(masked.contains("foo();"));
        assert_eq!(masked.len(), src.len());
    }

    #[test]
    fn mask_keeps_multibyte_offsets() {
        let src = "x = 'héllo'\ny = 1\n";
        let masked = mask_source(src, &HASH);
        assert_eq!(masked.len(), src.len());
        assert_eq!(masked.find("y = 1"), src.find("y = 1"));
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let src = r#"s = "a\"b(c)"; t()"#;
        let masked = mask_source(src, &SLASH);
        assert!(!masked.contains("b(c)"));
        assert!(masked.contains("t()"));
    }

    #[test]
    fn line_index_lookup() {
        let text = "ab\ncd\n\nef";
        let idx = LineIndex::new(text);
        assert_eq!(idx.line_of(0), 0);
        assert_eq!(idx.line_of(3), 1);
        assert_eq!(idx.line_of(6), 2);
        assert_eq!(idx.line_of(7), 3);
        assert_eq!(idx.line_start(1), 3);
    }
}
