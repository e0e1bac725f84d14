use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};
use walkdir::WalkDir;

/// Recursively collects files whose extension is exactly `extension` (no
/// leading dot, case-sensitive) under every root, in discovery order.
///
/// Returned paths are absolute. Unreadable entries and missing roots are
/// skipped. Symlinks are not followed.
pub fn search<P: AsRef<Path>>(extension: &str, roots: &[P]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for root in roots {
        let root = root.as_ref();
        let root = match std::path::absolute(root) {
            Ok(r) => r,
            Err(e) => {
                debug!(?root, "can't make path absolute: {e:#}");
                continue;
            }
        };
        for entry in WalkDir::new(&root).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    trace!(?root, "skipping unreadable entry: {e:#}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension() == Some(OsStr::new(extension)) {
                found.push(entry.into_path());
            }
        }
    }
    found
}

/// Finds the first file named exactly `name` with the given extension.
pub fn find_by_name<P: AsRef<Path>>(extension: &str, name: &str, roots: &[P]) -> Option<PathBuf> {
    search(extension, roots)
        .into_iter()
        .find(|path| path.file_name() == Some(OsStr::new(name)))
}
