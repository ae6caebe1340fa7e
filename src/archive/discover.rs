use glob::{glob, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// All `*.zip` files directly inside `dir`, sorted by path.
///
/// A missing directory yields an empty list; the pipelines decide whether
/// that is fatal.
pub fn list_zip_archives(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let pattern = format!("{}/*.zip", Pattern::escape(&dir.to_string_lossy()));

    let mut zips = Vec::new();
    for entry in glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => zips.push(path),
            Ok(_) => {}
            Err(e) => warn!("cannot read glob entry: {:?}", e),
        }
    }
    zips.sort();
    debug!(dir = %dir.display(), count = zips.len(), "found archives");
    Ok(zips)
}

/// Year label of a yearly archive: the last whitespace-separated token of
/// the file stem, e.g. `"UBPR All Reports 2019.zip"` → `"2019"`.
pub fn year_label(zip_path: impl AsRef<Path>) -> String {
    let stem = zip_path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split_whitespace()
        .last()
        .map(str::to_string)
        .unwrap_or(stem)
}
