//! Phase 1: Walk the file tree and list candidate files.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::{ScanError, ScanWarning, WarningKind};

/// A file found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Root-relative path with `/` separators.
    pub path: String,
    pub abs_path: PathBuf,
    pub size: u64,
}

/// Files sorted by relative path, plus anything that could not be listed.
#[derive(Debug, Default)]
pub struct TreeListing {
    pub files: Vec<DiscoveredFile>,
    pub warnings: Vec<ScanWarning>,
}

/// Run the structure phase.
///
/// Failure to read the root itself is the only fatal error of a scan;
/// unreadable entries further down become warnings.
pub fn run_structure_phase(config: &ScanConfig) -> Result<TreeListing, ScanError> {
    let root = config.root.as_path();
    let meta = std::fs::metadata(root).map_err(|source| ScanError::Enumerate {
        path: root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(ScanError::Enumerate {
            path: root.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }

    let mut listing = TreeListing::default();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if config.exclude_names.iter().any(|p| name == p.as_str()) {
                return false;
            }
            // Hidden directories are skipped, the root itself never is
            !(e.file_type().is_dir() && name.starts_with('.'))
        })
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                if err.depth() == 0 {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walk failed at root"));
                    return Err(ScanError::Enumerate {
                        path: root.to_path_buf(),
                        source,
                    });
                }
                let path = err.path().map(|p| relative_path(root, p));
                listing.warnings.push(ScanWarning::new(
                    WarningKind::Enumeration,
                    path.as_deref(),
                    err.to_string(),
                ));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative_path(root, entry.path());
        if rel.is_empty() {
            continue;
        }
        match discovered(rel, entry.path(), entry.metadata().map(|m| m.len())) {
            Ok(file) => listing.files.push(file),
            Err(warning) => listing.warnings.push(warning),
        }
    }

    listing.files.sort_by(|a, b| a.path.cmp(&b.path));
    log::debug!("structure: {} files under {}", listing.files.len(), root.display());
    Ok(listing)
}

/// A listed file, or an `Unreadable` warning when its size is unknown and
/// the byte ceiling cannot be applied.
fn discovered<E: std::fmt::Display>(
    rel: String,
    abs_path: &Path,
    size: Result<u64, E>,
) -> Result<DiscoveredFile, ScanWarning> {
    match size {
        Ok(size) => Ok(DiscoveredFile {
            path: rel,
            abs_path: abs_path.to_path_buf(),
            size,
        }),
        Err(e) => Err(ScanWarning::new(
            WarningKind::Unreadable,
            Some(&rel),
            format!("size unavailable: {e}"),
        )),
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
