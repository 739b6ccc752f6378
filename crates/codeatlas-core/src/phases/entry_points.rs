//! Entry-point detection for documents that have no language parser:
//! HTML pages, `package.json` manifests and n8n workflow exports.
//!
//! Source-language entry points come from
//! [`LanguageParser::detect_entry_points`](crate::languages::LanguageParser::detect_entry_points).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::config::{EntryPoint, EntryPointKind};
use crate::languages::mask::LineIndex;

static HTML_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script\s+([^>]*)src\s*=\s*["']([^"']+)["']"#).unwrap()
});
static HTML_SCRIPT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script(\s+[^>]*)?>").unwrap());
static HTML_MODULE_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)type\s*=\s*["']module["']"#).unwrap());

/// Bumped whenever document entry-point detection changes what it finds.
pub const DOCUMENT_PATTERN_VERSION: u32 = 1;

/// Document flavours this module understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    PackageManifest,
    Workflow,
}

impl DocumentKind {
    pub fn for_path(path: &str) -> Option<Self> {
        let p = Path::new(path);
        let file_name = p.file_name()?.to_str()?.to_ascii_lowercase();
        let ext = p
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "html" | "htm" => Some(Self::Html),
            _ if file_name == "package.json" => Some(Self::PackageManifest),
            "json" if file_name.contains("workflow") || file_name.contains("n8n") => {
                Some(Self::Workflow)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::PackageManifest => "package.json",
            Self::Workflow => "n8n",
        }
    }
}

/// Entry points declared by a document. Unparsable JSON yields none.
pub fn detect_document_entry_points(kind: DocumentKind, path: &str, text: &str) -> Vec<EntryPoint> {
    match kind {
        DocumentKind::Html => html_entry_points(path, text),
        DocumentKind::PackageManifest => match serde_json::from_str::<Value>(text) {
            Ok(pkg) => package_entry_points(path, &pkg),
            Err(e) => {
                log::debug!("{path}: not valid JSON ({e})");
                Vec::new()
            }
        },
        DocumentKind::Workflow => match serde_json::from_str::<Value>(text) {
            Ok(workflow) => workflow_entry_points(path, &workflow),
            Err(e) => {
                log::debug!("{path}: not valid JSON ({e})");
                Vec::new()
            }
        },
    }
}

fn html_entry_points(path: &str, text: &str) -> Vec<EntryPoint> {
    let index = LineIndex::new(text);
    let mut entries = Vec::new();

    for c in HTML_SCRIPT.captures_iter(text) {
        let (Some(whole), Some(attrs), Some(src)) = (c.get(0), c.get(1), c.get(2)) else {
            continue;
        };
        let src = src.as_str();
        let is_module = HTML_MODULE_TYPE.is_match(attrs.as_str());
        let trigger = if is_module {
            format!("ES Module: {src}")
        } else {
            format!("Script: {src}")
        };
        entries.push(
            EntryPoint::new(EntryPointKind::Script, src, path, index.line_of(whole.start()) + 1)
                .with_trigger(trigger),
        );
    }

    let mut inline = 0;
    for c in HTML_SCRIPT_TAG.captures_iter(text) {
        let Some(whole) = c.get(0) else {
            continue;
        };
        let attrs = c.get(1).map(|m| m.as_str()).unwrap_or("");
        if attrs.to_ascii_lowercase().contains("src=") {
            continue;
        }
        inline += 1;
        let is_module = HTML_MODULE_TYPE.is_match(attrs);
        entries.push(
            EntryPoint::new(
                EntryPointKind::Script,
                format!("inline-script-{inline}"),
                path,
                index.line_of(whole.start()) + 1,
            )
            .with_trigger(if is_module { "Inline module" } else { "Inline script" }),
        );
    }
    entries
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn package_entry_points(path: &str, pkg: &Value) -> Vec<EntryPoint> {
    let mut entries = Vec::new();

    if let Some(main) = pkg.get("main") {
        let main = display_value(main);
        entries.push(
            EntryPoint::new(EntryPointKind::PackageMain, main.clone(), path, 1)
                .with_trigger(format!("package.json main: {main}")),
        );
    }

    match pkg.get("bin") {
        Some(Value::String(bin)) => {
            let name = pkg.get("name").and_then(Value::as_str).unwrap_or("bin");
            entries.push(
                EntryPoint::new(EntryPointKind::PackageBin, name, path, 1)
                    .with_trigger(format!("package.json bin: {bin}")),
            );
        }
        Some(Value::Object(commands)) => {
            for (command, target) in commands {
                entries.push(
                    EntryPoint::new(EntryPointKind::PackageBin, command.as_str(), path, 1)
                        .with_trigger(format!(
                            "package.json bin: {command} -> {}",
                            display_value(target)
                        )),
                );
            }
        }
        _ => {}
    }

    match pkg.get("exports") {
        Some(Value::String(target)) => entries.push(
            EntryPoint::new(EntryPointKind::PackageExport, ".", path, 1)
                .with_trigger(format!("package.json exports: {target}")),
        ),
        Some(Value::Object(map)) => {
            for key in map.keys() {
                entries.push(
                    EntryPoint::new(EntryPointKind::PackageExport, key.as_str(), path, 1)
                        .with_trigger(format!("package.json exports: {key}")),
                );
            }
        }
        _ => {}
    }
    entries
}

/// Workflow nodes carry no line information; entries use line 0.
fn workflow_entry_points(path: &str, workflow: &Value) -> Vec<EntryPoint> {
    let Some(nodes) = workflow.get("nodes").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut entries = Vec::new();

    for node in nodes {
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or("");
        let name = node.get("name").and_then(Value::as_str).unwrap_or("Unknown");
        let disabled = node.get("disabled").and_then(Value::as_bool).unwrap_or(false);
        let params = node.get("parameters");
        let lowered = node_type.to_ascii_lowercase();

        let entry = if lowered.contains("webhook") {
            let hook_path = params
                .and_then(|p| p.get("path"))
                .and_then(Value::as_str)
                .unwrap_or("");
            let method = params
                .and_then(|p| p.get("httpMethod"))
                .and_then(Value::as_str)
                .unwrap_or("GET");
            EntryPoint::new(EntryPointKind::Webhook, name, path, 0)
                .with_trigger(format!("Webhook: {method} /{hook_path}"))
        } else if lowered.contains("schedule") || lowered.contains("cron") {
            let cron = match params.and_then(|p| p.get("rule")) {
                Some(Value::Object(rule)) => rule
                    .get("cronExpression")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                Some(other) => display_value(other),
                None => String::new(),
            };
            let trigger = if cron.is_empty() {
                "Schedule trigger".to_string()
            } else {
                format!("Schedule: {cron}")
            };
            EntryPoint::new(EntryPointKind::ScheduledTrigger, name, path, 0).with_trigger(trigger)
        } else if lowered.contains("trigger") {
            EntryPoint::new(EntryPointKind::WorkflowTrigger, name, path, 0)
                .with_trigger(format!("Trigger: {node_type}"))
        } else {
            continue;
        };

        entries.push(if disabled { entry.inactive() } else { entry });
    }
    entries
}
