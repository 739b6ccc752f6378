//! Phase 6: Branch-count complexity per function.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::extraction::ExtractedFile;
use crate::config::FunctionSymbol;
use crate::graph::symbol_table::symbol_id;
use crate::languages::mask::mask_source;
use crate::languages::scope::function_span;
use crate::languages::{LanguageParser, ParserRegistry};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    /// Score ≤ 5 is low, ≤ 10 medium, anything above high.
    pub fn from_score(score: usize) -> Self {
        match score {
            0..=5 => Self::Low,
            6..=10 => Self::Medium,
            _ => Self::High,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionComplexity {
    pub complexity: usize,
    pub risk: Risk,
    pub branches: usize,
    /// Non-blank lines of the span after comments are masked.
    pub lines: usize,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplexitySummary {
    pub low_risk: usize,
    pub medium_risk: usize,
    pub high_risk: usize,
    pub total_functions: usize,
    pub total_complexity: usize,
    pub avg_complexity: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityReport {
    pub functions: BTreeMap<String, FunctionComplexity>,
    pub summary: ComplexitySummary,
}

/// Score every function of every file that has a parser.
pub fn run_complexity_phase(files: &[ExtractedFile], registry: &ParserRegistry) -> ComplexityReport {
    let mut report = ComplexityReport::default();

    for file in files {
        let path = file.source.path.as_str();
        let Some(parser) = registry.parser_for_path(path) else {
            continue;
        };
        if file.extraction.functions.is_empty() {
            continue;
        }
        let view = parser.source_view(path, &file.source.content);
        let masked = mask_source(&view, parser.comment_syntax());
        let lines: Vec<&str> = masked.split('\n').collect();

        for symbol in &file.extraction.functions {
            let span = symbol
                .line
                .checked_sub(1)
                .and_then(|start| function_span(parser.span_style(), &lines, start));
            let text = match span {
                Some((start, end)) => lines[start..=end.min(lines.len() - 1)].join("\n"),
                None => {
                    log::debug!("{path}: no span for {}, scoring to the next declaration", symbol.name);
                    let (start, end) = fallback_span(&file.extraction.functions, symbol.line, lines.len());
                    lines[start..end].join("\n")
                }
            };
            report
                .functions
                .insert(symbol_id(path, &symbol.name), score_text(parser, &text));
        }
    }

    report.summary = summarize(&report.functions);
    log::debug!(
        "complexity: {} functions, {} high risk",
        report.summary.total_functions,
        report.summary.high_risk
    );
    report
}

/// Half-open 0-based line range from the declaration on 1-based `line` up
/// to the next declaration in the file, or to the end of the file.
fn fallback_span(functions: &[FunctionSymbol], line: usize, line_count: usize) -> (usize, usize) {
    let start = line.saturating_sub(1).min(line_count);
    let end = functions
        .iter()
        .map(|f| f.line.saturating_sub(1))
        .filter(|&l| l > start)
        .min()
        .unwrap_or(line_count)
        .min(line_count);
    (start, end)
}

/// Score one span of already-masked text.
pub fn score_text(parser: &dyn LanguageParser, masked_span: &str) -> FunctionComplexity {
    let branches = parser.count_branches(masked_span);
    let complexity = 1 + branches;
    let risk = Risk::from_score(complexity);
    FunctionComplexity {
        complexity,
        risk,
        branches,
        lines: masked_span.lines().filter(|l| !l.trim().is_empty()).count(),
        recommendation: recommendation(complexity, risk),
    }
}

fn recommendation(complexity: usize, risk: Risk) -> String {
    match risk {
        Risk::Low => "Function is simple and maintainable".to_string(),
        Risk::Medium => "Consider breaking into smaller functions for better testability".to_string(),
        Risk::High => {
            let mut advice = Vec::new();
            if complexity > 15 {
                advice.push("HIGH PRIORITY: Refactor immediately");
            }
            advice.push("Break into smaller, single-purpose functions");
            advice.push("Extract complex conditions into well-named helper functions");
            advice.push("Consider using design patterns (Strategy, State, etc.)");
            advice.join("; ")
        }
    }
}

fn summarize(functions: &BTreeMap<String, FunctionComplexity>) -> ComplexitySummary {
    let mut summary = ComplexitySummary::default();
    for f in functions.values() {
        match f.risk {
            Risk::Low => summary.low_risk += 1,
            Risk::Medium => summary.medium_risk += 1,
            Risk::High => summary.high_risk += 1,
        }
        summary.total_complexity += f.complexity;
    }
    summary.total_functions = functions.len();
    if summary.total_functions > 0 {
        let avg = summary.total_complexity as f64 / summary.total_functions as f64;
        summary.avg_complexity = (avg * 100.0).round() / 100.0;
    }
    summary
}
