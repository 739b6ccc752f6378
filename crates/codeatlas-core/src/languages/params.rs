//! Parameter list parsing: depth-aware splitting and name/type/default triples.

use crate::config::Param;

/// Index of the `)` matching the `(` at `open`, scanning masked text.
pub fn matching_paren(masked: &str, open: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_open(ch: char, angle: bool) -> bool {
    matches!(ch, '(' | '[' | '{') || (angle && ch == '<')
}

fn is_close(ch: char, angle: bool) -> bool {
    matches!(ch, ')' | ']' | '}') || (angle && ch == '>')
}

/// Byte offsets of every top-level occurrence of `sep`.
///
/// Brackets, parens and braces always nest; angle brackets nest only when
/// `angle` is set (generic syntax). The `>` of `=>` and `->` never closes.
fn top_level_positions(text: &str, sep: char, angle: bool) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut depth: usize = 0;
    let mut prev = '\0';
    for (i, ch) in text.char_indices() {
        if ch == '>' && (prev == '=' || prev == '-') {
            prev = ch;
            continue;
        }
        if is_open(ch, angle) {
            depth += 1;
        } else if is_close(ch, angle) {
            depth = depth.saturating_sub(1);
        } else if ch == sep && depth == 0 {
            positions.push(i);
        }
        prev = ch;
    }
    positions
}

/// Split a parameter list on top-level commas.
pub fn split_top_level(params: &str, angle: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut last = 0;
    for pos in top_level_positions(params, ',', angle) {
        parts.push(params[last..pos].trim().to_string());
        last = pos + 1;
    }
    parts.push(params[last..].trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

/// First top-level `=` that is an assignment rather than part of an operator.
fn default_separator(part: &str, angle: bool) -> Option<usize> {
    let bytes = part.as_bytes();
    top_level_positions(part, '=', angle).into_iter().find(|&i| {
        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        let next = bytes.get(i + 1).copied().unwrap_or(b' ');
        !matches!(prev, b'=' | b'!' | b'<' | b'>') && !matches!(next, b'=' | b'>')
    })
}

/// Parse one `name[: type][= default]` parameter.
pub fn parse_param(part: &str, angle: bool) -> Option<Param> {
    let part = part.trim();
    if part.is_empty() {
        return None;
    }

    let (head, default) = match default_separator(part, angle) {
        Some(eq) => (part[..eq].trim(), Some(part[eq + 1..].trim().to_string())),
        None => (part, None),
    };

    let colon = top_level_positions(head, ':', angle).into_iter().next();
    let (name, type_name) = match colon {
        Some(c) => (head[..c].trim(), Some(head[c + 1..].trim().to_string())),
        None => (head, None),
    };

    let name = name.trim_end_matches('?').trim();
    if name.is_empty() {
        return None;
    }

    Some(Param {
        name: name.to_string(),
        type_name: type_name.filter(|t| !t.is_empty()),
        default: default.filter(|d| !d.is_empty()),
    })
}

/// Parse a whole parameter list.
pub fn parse_params(raw: &str, angle: bool) -> Vec<Param> {
    parse_params_masked(raw, raw, angle)
}

/// Parse a parameter list, finding separators in `masked` (same byte
/// length as `raw`) so commas and brackets inside string defaults are
/// ignored.
pub fn parse_params_masked(raw: &str, masked: &str, angle: bool) -> Vec<Param> {
    let mut parts = Vec::new();
    let mut last = 0;
    for pos in top_level_positions(masked, ',', angle) {
        parts.push(&raw[last..pos]);
        last = pos + 1;
    }
    parts.push(&raw[last..]);
    parts
        .into_iter()
        .map(normalize_whitespace)
        .filter_map(|part| parse_param(&part, angle))
        .collect()
}

/// Render `name: type` (or bare `name`) for signatures.
pub fn render_param(param: &Param) -> String {
    match &param.type_name {
        Some(t) => format!("{}: {}", param.name, t),
        None => param.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn split_ignores_nested_commas() {
        let parts = split_top_level("a: Dict[str, int], b=(1, 2), c", false);
        assert_eq!(parts, vec!["a: Dict[str, int]", "b=(1, 2)", "c"]);
    }

    #[test]
    fn split_respects_generics_when_enabled() {
        let parts = split_top_level("m: Map<string, number>, f: (a, b) => void", true);
        assert_eq!(parts, vec!["m: Map<string, number>", "f: (a, b) => void"]);
    }

    #[test]
    fn parse_python_param_triples() {
        let params = parse_params("self, data: List[dict], *args, limit: int = 10, **kw", false);
        assert_eq!(params.len(), 5);
        assert_eq!(params[0], Param::named("self"));
        assert_eq!(params[1].type_name.as_deref(), Some("List[dict]"));
        assert_eq!(params[2].name, "*args");
        assert_eq!(params[3].name, "limit");
        assert_eq!(params[3].type_name.as_deref(), Some("int"));
        assert_eq!(params[3].default.as_deref(), Some("10"));
        assert_eq!(params[4].name, "**kw");
    }

    #[test]
    fn parse_ts_optional_and_arrow_types() {
        let params = parse_params("cb: (x: number) => void = noop, opts?: Options", true);
        assert_eq!(params[0].name, "cb");
        assert_eq!(params[0].type_name.as_deref(), Some("(x: number) => void"));
        assert_eq!(params[0].default.as_deref(), Some("noop"));
        assert_eq!(params[1].name, "opts");
        assert_eq!(params[1].type_name.as_deref(), Some("Options"));
    }

    #[test]
    fn comparison_in_default_is_not_a_separator() {
        let p = parse_param("flag=a == b", false).unwrap();
        assert_eq!(p.name, "flag");
        assert_eq!(p.default.as_deref(), Some("a == b"));
    }

    #[test]
    fn multiline_params_are_normalized() {
        let params = parse_params("a,\n    b: int\n", false);
        assert_eq!(params.len(), 2);
        assert_eq!(render_param(&params[1]), "b: int");
    }

    #[test]
    fn matching_paren_skips_nested() {
        let text = "f(a, g(b), (c))";
        assert_eq!(matching_paren(text, 1), Some(14));
        assert_eq!(matching_paren(text, 0), None);
        assert_eq!(matching_paren("f(a", 1), None);
    }

    #[test]
    fn masked_separators_ignore_string_contents() {
        let raw = r#"sep=", ", end=")""#;
        let masked = r#"sep="  ", end=" ""#;
        let params = parse_params_masked(raw, masked, false);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].default.as_deref(), Some(r#"", ""#));
        assert_eq!(params[1].default.as_deref(), Some(r#"")""#));
    }

    #[test]
    fn empty_list_yields_nothing() {
        assert!(parse_params("   ", false).is_empty());
    }
}
