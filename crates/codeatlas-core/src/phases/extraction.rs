//! Phase 2: Parallel per-file extraction.
//!
//! Each file is a pure unit of work over its bytes and a read-only cache
//! snapshot. Workers never write the cache or any shared map; results are
//! collected in input order and merged after the join.

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;

use super::entry_points::{detect_document_entry_points, DocumentKind, DOCUMENT_PATTERN_VERSION};
use super::structure::DiscoveredFile;
use crate::cache::{content_hash, CacheStore, Fingerprint};
use crate::config::{FileExtraction, FileImports, FileMeta, ScanConfig, SourceFile};
use crate::error::{ScanError, ScanWarning, WarningKind};
use crate::languages::{Capabilities, LanguageParser, ParserRegistry};

/// One file that made it through extraction.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub source: SourceFile,
    pub extraction: FileExtraction,
    /// Revision of the patterns that produced `extraction`.
    pub pattern_version: u32,
    /// Reused from the cache rather than re-parsed.
    pub from_cache: bool,
}

/// Merged result of the extraction phase.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// Sorted by path.
    pub files: Vec<ExtractedFile>,
    pub warnings: Vec<ScanWarning>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Files dropped as oversized, unreadable or unparsable.
    pub skipped: usize,
}

enum WorkResult {
    Extracted(Box<ExtractedFile>, Option<ScanWarning>),
    Skipped(ScanWarning),
    Ignored,
}

enum Handler<'r> {
    Code(&'r dyn LanguageParser, &'r Capabilities),
    Document(DocumentKind),
}

impl Handler<'_> {
    fn pattern_version(&self) -> u32 {
        match self {
            Handler::Code(_, caps) => caps.pattern_version,
            Handler::Document(_) => DOCUMENT_PATTERN_VERSION,
        }
    }
}

/// Run extraction over every listed file on a bounded worker pool.
pub fn run_extraction_phase(
    config: &ScanConfig,
    listed: &[DiscoveredFile],
    registry: &ParserRegistry,
    cache: &CacheStore,
) -> Result<ExtractionOutcome, ScanError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_jobs())
        .build()?;

    let results: Vec<WorkResult> = pool.install(|| {
        listed
            .par_iter()
            .map(|file| process_file(config, file, registry, cache))
            .collect()
    });

    // Single owner from here on
    let mut outcome = ExtractionOutcome::default();
    for result in results {
        match result {
            WorkResult::Extracted(file, warning) => {
                if file.from_cache {
                    outcome.cache_hits += 1;
                } else {
                    outcome.cache_misses += 1;
                }
                outcome.warnings.extend(warning);
                outcome.files.push(*file);
            }
            WorkResult::Skipped(warning) => {
                outcome.skipped += 1;
                outcome.warnings.push(warning);
            }
            WorkResult::Ignored => {}
        }
    }

    log::debug!(
        "extraction: {} files ({} cached, {} parsed, {} skipped)",
        outcome.files.len(),
        outcome.cache_hits,
        outcome.cache_misses,
        outcome.skipped
    );
    Ok(outcome)
}

fn handler_for<'r>(registry: &'r ParserRegistry, path: &str) -> Option<Handler<'r>> {
    let ext = std::path::Path::new(path).extension()?.to_str()?;
    if let (Some(parser), Some(caps)) = (registry.get_parser(ext), registry.capabilities(ext)) {
        return Some(Handler::Code(parser, caps));
    }
    DocumentKind::for_path(path).map(Handler::Document)
}

fn process_file(
    config: &ScanConfig,
    file: &DiscoveredFile,
    registry: &ParserRegistry,
    cache: &CacheStore,
) -> WorkResult {
    let path = file.path.as_str();
    let Some(handler) = handler_for(registry, path) else {
        return WorkResult::Ignored;
    };

    if config.max_file_size > 0 && file.size > config.max_file_size {
        return WorkResult::Skipped(ScanWarning::new(
            WarningKind::Oversized,
            Some(path),
            format!("{} bytes exceeds the {} byte ceiling", file.size, config.max_file_size),
        ));
    }

    let bytes = match std::fs::read(&file.abs_path) {
        Ok(b) => b,
        Err(e) => {
            return WorkResult::Skipped(ScanWarning::new(
                WarningKind::Unreadable,
                Some(path),
                e.to_string(),
            ))
        }
    };
    let hash = content_hash(&bytes);
    let text = String::from_utf8_lossy(&bytes);

    let (content, was_truncated) = apply_line_ceiling(&text, config.max_lines);
    let truncation = was_truncated.then(|| {
        ScanWarning::new(
            WarningKind::Truncated,
            Some(path),
            format!("only the first {} lines were analysed", config.max_lines),
        )
    });

    let pattern_version = handler.pattern_version();
    let current = Fingerprint {
        hash: &hash,
        text: &text,
        pattern_version,
    };
    let cached = cache.lookup(path, &current).cloned();

    let language = match &handler {
        Handler::Code(_, caps) => Some(caps.language_name.clone()),
        Handler::Document(_) => None,
    };
    let source = SourceFile {
        path: file.path.clone(),
        language,
        content,
        content_hash: hash,
        was_truncated,
    };

    if let Some(hit) = cached {
        log::debug!("cache hit: {path}");
        return WorkResult::Extracted(
            Box::new(ExtractedFile {
                source,
                extraction: hit,
                pattern_version,
                from_cache: true,
            }),
            truncation,
        );
    }

    let extracted = catch_unwind(AssertUnwindSafe(|| match &handler {
        Handler::Code(parser, caps) => extract_code(*parser, caps, &source),
        Handler::Document(kind) => extract_document(*kind, &source),
    }));
    match extracted {
        Ok(extraction) => WorkResult::Extracted(
            Box::new(ExtractedFile {
                source,
                extraction,
                pattern_version,
                from_cache: false,
            }),
            truncation,
        ),
        Err(_) => WorkResult::Skipped(ScanWarning::new(
            WarningKind::Unparsable,
            Some(path),
            "extraction failed; file excluded from symbol output",
        )),
    }
}

/// Keep only the first `max_lines` lines; 0 means unlimited.
fn apply_line_ceiling(text: &str, max_lines: usize) -> (String, bool) {
    if max_lines == 0 {
        return (text.to_string(), false);
    }
    match text.match_indices('\n').nth(max_lines - 1) {
        Some((cut, _)) if cut + 1 < text.len() => (text[..=cut].to_string(), true),
        _ => (text.to_string(), false),
    }
}

/// Symbol, import, purpose and entry-point extraction for one source file.
///
/// Features the capability record does not declare are left empty.
pub fn extract_code(
    parser: &dyn LanguageParser,
    caps: &Capabilities,
    source: &SourceFile,
) -> FileExtraction {
    let path = source.path.as_str();
    let view = parser.source_view(path, &source.content);

    let mut functions = parser.extract_symbols(&view, path);
    for f in functions.iter_mut() {
        if !caps.supports_types {
            f.return_type = None;
            for p in f.params.iter_mut() {
                p.type_name = None;
            }
        }
        if !caps.supports_purpose {
            f.purpose = None;
        }
    }

    let mut imports = FileImports::default();
    if caps.supports_imports {
        for token in parser.extract_imports(&view) {
            if parser.is_internal_import(&token) {
                imports.internal.push(token);
            } else {
                imports.external.push(token);
            }
        }
    }

    let purpose = if caps.supports_purpose {
        parser.module_purpose(&view)
    } else {
        None
    };
    let entry_points = if caps.supports_entry_points {
        parser.detect_entry_points(&view, path)
    } else {
        Vec::new()
    };

    FileExtraction {
        functions,
        meta: FileMeta {
            language: caps.language_name.clone(),
            purpose,
            imports,
            entry_points,
            was_truncated: source.was_truncated,
        },
    }
}

fn extract_document(kind: DocumentKind, source: &SourceFile) -> FileExtraction {
    FileExtraction {
        functions: Vec::new(),
        meta: FileMeta {
            language: kind.label().to_string(),
            entry_points: detect_document_entry_points(kind, &source.path, &source.content),
            was_truncated: source.was_truncated,
            ..Default::default()
        },
    }
}
