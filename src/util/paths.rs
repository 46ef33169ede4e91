use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Join path segments, skipping empty ones.
pub fn get_path<S: AsRef<str>>(segments: &[S]) -> PathBuf {
    segments
        .iter()
        .map(<S as AsRef<str>>::as_ref)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Join URL segments with `/`, skipping empty ones. Segments are not
/// re-escaped and surrounding slashes are left alone.
pub fn get_url<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(<S as AsRef<str>>::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Sub-directories of `path`, ignoring hidden (`.`) and private (`_`) names.
/// Sorted so callers see a stable order.
pub fn get_dirs(path: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(path).map_err(|e| Error::io(path, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(path, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| Error::io(entry.path(), e))?
            .is_dir();
        if !is_dir {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        dirs.push(name);
    }

    dirs.sort();
    Ok(dirs)
}
