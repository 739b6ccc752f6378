//! Purpose summaries and documentation-declared types.
//!
//! Conventions are tried in priority order by each language; the first
//! non-empty result wins.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Character budget for a function purpose.
pub const PURPOSE_BUDGET: usize = 100;
/// Character budget for a file purpose.
pub const MODULE_PURPOSE_BUDGET: usize = 200;

static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:Args|Arguments|Parameters|Params|Returns?|Raises|Yields|Examples?|Notes?|Attributes|Todo):\s*$",
    )
    .unwrap()
});
static JSDOC_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@param\s+\{([^}]+)\}\s+\[?([\w$.]+)").unwrap());
static JSDOC_RETURNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@returns?\s+\{([^}]+)\}").unwrap());
static SPHINX_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:type\s+(\*{0,2}\w+)\s*:\s*(.+)$").unwrap());
static SPHINX_TYPED_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:param\s+([^:]+?)\s+(\*{0,2}\w+)\s*:").unwrap());
static SPHINX_RTYPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^:rtype:\s*(.+)$").unwrap());
static GOOGLE_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\*{0,2}\w+)\s*\(([^)]+)\)\s*:").unwrap());
static GOOGLE_RETURN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][\w\[\], .|]*?)\s*:\s").unwrap());

/// Truncate to `budget` characters, marking the cut with `...`.
pub fn truncate_purpose(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let head: String = text.chars().take(budget.saturating_sub(3)).collect();
    format!("{}...", head.trim_end())
}

/// First paragraph of cleaned comment lines, stopping at an `@tag` line.
pub fn summarize<S: AsRef<str>>(lines: &[S], budget: usize) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for line in lines {
        let line = line.as_ref().trim();
        if line.starts_with('@') {
            break;
        }
        if line.is_empty() {
            if parts.is_empty() {
                continue;
            }
            break;
        }
        parts.push(line);
    }
    if parts.is_empty() {
        return None;
    }
    Some(truncate_purpose(&parts.join(" "), budget))
}

/// First sentence-terminated paragraph of a Python docstring body.
pub fn docstring_summary(body: &str, budget: usize) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for line in body.lines().map(str::trim) {
        if line.is_empty() {
            if parts.is_empty() {
                continue;
            }
            break;
        }
        if line.starts_with(':')
            || line.starts_with('@')
            || line.starts_with(">>>")
            || SECTION_HEADER.is_match(line)
        {
            break;
        }
        parts.push(line);
        if line.ends_with('.') {
            break;
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(truncate_purpose(&parts.join(" "), budget))
}

/// Body of a Python string docstring starting at `start`, if there is one.
///
/// Returns the body with each line trimmed, and the index of the closing
/// line.
pub fn python_docstring_at(lines: &[&str], start: usize) -> Option<(String, usize)> {
    let first = lines.get(start)?.trim_start();
    let unprefixed = first.trim_start_matches(|c: char| "rRuUbB".contains(c));
    let delim = if unprefixed.starts_with("\"\"\"") {
        "\"\"\""
    } else if unprefixed.starts_with("'''") {
        "'''"
    } else {
        return None;
    };
    let after_open = &unprefixed[3..];
    if let Some(close) = after_open.find(delim) {
        return Some((after_open[..close].trim().to_string(), start));
    }

    let mut body = vec![after_open.trim().to_string()];
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        if let Some(close) = line.find(delim) {
            body.push(line[..close].trim().to_string());
            return Some((body.join("\n"), j));
        }
        body.push(line.trim().to_string());
    }
    None
}

/// Docstring following the declaration that ends on `decl_end`.
pub fn python_docstring_after(lines: &[&str], decl_end: usize) -> Option<String> {
    let next = lines
        .iter()
        .enumerate()
        .skip(decl_end + 1)
        .find(|(_, l)| !l.trim().is_empty())
        .map(|(i, _)| i)?;
    python_docstring_at(lines, next).map(|(body, _)| body)
}

/// Run of line comments directly above `line`.
///
/// Lines for which `skip` returns true (decorators, attributes) are passed
/// over before the run starts. Repeated comment characters (`///`, `##`)
/// are stripped.
pub fn line_comment_before(
    lines: &[&str],
    line: usize,
    prefix: &str,
    skip: impl Fn(&str) -> bool,
) -> Option<Vec<String>> {
    let marker = prefix.chars().next()?;
    let mut collected = Vec::new();
    let mut idx = line;
    while idx > 0 {
        idx -= 1;
        let trimmed = lines[idx].trim();
        if collected.is_empty() && skip(trimmed) {
            continue;
        }
        match trimmed.strip_prefix(prefix) {
            Some(_) => collected.push(trimmed.trim_start_matches(marker).trim().to_string()),
            None => break,
        }
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    Some(collected)
}

/// Cleaned lines of a `/** ... */` block ending directly above `line`.
pub fn doc_block_before(
    lines: &[&str],
    line: usize,
    skip: impl Fn(&str) -> bool,
) -> Option<Vec<String>> {
    let mut idx = line;
    let end = loop {
        if idx == 0 {
            return None;
        }
        idx -= 1;
        let trimmed = lines[idx].trim();
        if skip(trimmed) {
            continue;
        }
        if trimmed.ends_with("*/") {
            break idx;
        }
        return None;
    };

    let mut start = end;
    loop {
        if lines[start].contains("/**") {
            break;
        }
        if start == 0 || lines[start].contains("/*") {
            return None;
        }
        start -= 1;
    }

    let cleaned = lines[start..=end]
        .iter()
        .map(|l| {
            let mut t = l.trim();
            if let Some(rest) = t.strip_prefix("/**") {
                t = rest;
            }
            if let Some(rest) = t.strip_suffix("*/") {
                t = rest;
            }
            t.trim().trim_start_matches('*').trim().to_string()
        })
        .collect();
    Some(cleaned)
}

/// Leading file comment: a block comment or a run of line comments.
///
/// Shebang lines are skipped.
pub fn leading_comment(
    lines: &[&str],
    prefix: &str,
    block: Option<(&str, &str)>,
) -> Option<String> {
    let mut idx = 0;
    while idx < lines.len() {
        let t = lines[idx].trim();
        if t.is_empty() || t.starts_with("#!") {
            idx += 1;
            continue;
        }
        break;
    }
    let first = lines.get(idx)?.trim();

    if let Some((open, close)) = block {
        if first.starts_with(open) {
            let mut body = Vec::new();
            for line in &lines[idx..] {
                let t = line.trim();
                let done = t.contains(close);
                let t = t.strip_prefix(open).unwrap_or(t);
                let t = match t.find(close) {
                    Some(c) => &t[..c],
                    None => t,
                };
                body.push(t.trim().trim_start_matches('*').trim().to_string());
                if done {
                    break;
                }
            }
            return summarize(&body, MODULE_PURPOSE_BUDGET);
        }
    }

    let marker = prefix.chars().next()?;
    let body: Vec<String> = lines[idx..]
        .iter()
        .map(|l| l.trim())
        .take_while(|l| l.starts_with(prefix))
        .map(|l| l.trim_start_matches(marker).trim().to_string())
        .collect();
    summarize(&body, MODULE_PURPOSE_BUDGET)
}

/// Declared types from JSDoc `@param {T} name` and `@returns {T}` tags.
pub fn jsdoc_types<S: AsRef<str>>(lines: &[S]) -> (HashMap<String, String>, Option<String>) {
    let mut params = HashMap::new();
    let mut returns = None;
    for line in lines {
        let line = line.as_ref();
        if let Some(c) = JSDOC_PARAM.captures(line) {
            params
                .entry(c[2].to_string())
                .or_insert_with(|| c[1].trim().to_string());
        } else if let Some(c) = JSDOC_RETURNS.captures(line) {
            returns.get_or_insert_with(|| c[1].trim().to_string());
        }
    }
    (params, returns)
}

/// Declared types from Sphinx (`:type x:`, `:rtype:`) and Google
/// (`Args:` / `Returns:`) docstring sections.
pub fn docstring_types(body: &str) -> (HashMap<String, String>, Option<String>) {
    #[derive(PartialEq)]
    enum Section {
        None,
        Args,
        Returns,
    }

    let mut params = HashMap::new();
    let mut returns = None;
    let mut section = Section::None;

    for line in body.lines().map(str::trim) {
        if let Some(c) = SPHINX_TYPE.captures(line) {
            params.insert(c[1].to_string(), c[2].trim().to_string());
            continue;
        }
        if let Some(c) = SPHINX_TYPED_PARAM.captures(line) {
            params
                .entry(c[2].to_string())
                .or_insert_with(|| c[1].trim().to_string());
            continue;
        }
        if let Some(c) = SPHINX_RTYPE.captures(line) {
            returns = Some(c[1].trim().to_string());
            continue;
        }
        if SECTION_HEADER.is_match(line) {
            section = if line.starts_with("Arg") || line.starts_with("Param") {
                Section::Args
            } else if line.starts_with("Return") {
                Section::Returns
            } else {
                Section::None
            };
            continue;
        }
        if line.is_empty() {
            continue;
        }
        match section {
            Section::Args => {
                if let Some(c) = GOOGLE_ARG.captures(line) {
                    let ty = c[2].trim().trim_end_matches(", optional").trim().to_string();
                    params.entry(c[1].to_string()).or_insert(ty);
                }
            }
            Section::Returns => {
                if returns.is_none() {
                    if let Some(c) = GOOGLE_RETURN.captures(line) {
                        returns = Some(c[1].trim().to_string());
                    }
                }
                section = Section::None;
            }
            Section::None => {}
        }
    }
    (params, returns)
}
