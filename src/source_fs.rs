use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::extract::DocFormat;

/// A local document candidate found by the filesystem walk.
#[derive(Debug, Clone)]
pub struct LocalCandidate {
    pub path: PathBuf,
    pub format: DocFormat,
}

/// Result of a local walk: the candidates plus any entries that could
/// not be visited (permission errors, broken symlinks). A bad entry
/// never aborts the walk.
#[derive(Debug, Default)]
pub struct LocalScan {
    pub candidates: Vec<LocalCandidate>,
    pub errors: Vec<(PathBuf, String)>,
}

/// Recursively enumerate supported documents under `root`, sorted by
/// path for deterministic ordering. `max_items` caps this local set
/// only — remote enumeration is not affected by it. Errors only when
/// `root` itself does not exist.
pub fn scan_local(root: &Path, max_items: Option<usize>) -> Result<LocalScan> {
    if !root.exists() {
        bail!("Ingest root does not exist: {}", root.display());
    }

    let mut scan = LocalScan::default();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                scan.errors.push((path, e.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(format) = DocFormat::from_path(path) {
            scan.candidates.push(LocalCandidate {
                path: path.to_path_buf(),
                format,
            });
        }
    }

    scan.candidates.sort_by(|a, b| a.path.cmp(&b.path));

    if let Some(cap) = max_items {
        scan.candidates.truncate(cap);
    }

    Ok(scan)
}
