//! On-demand creation of the directory chain above a file.
//!
//! The walk goes backward from the full parent path to the first existing ancestor (never
//! past the start boundary, which the caller guarantees exists), then forward creating each
//! missing segment. A failed mkdir stops the walk; directories already created stay.

use tracing::{debug, warn};

use crate::error::{GridError, GridResult};
use crate::fsdriver::FileDriver;

/// Bits or-ed into the requested mode so created directories stay traversable.
pub const DIR_TRAVERSE_BITS: u32 = 0o110;

/// Split a path at its last '/' into (parent, leaf). The parent of "/x" is "/".
pub fn split_path(path: &str) -> GridResult<(&str, &str)> {
    match path.rfind('/') {
        Some(0) => Ok(("/", &path[1..])),
        Some(i) => Ok((&path[..i], &path[i + 1..])),
        None => Err(GridError::input(format!("path '{}' has no parent directory", path))),
    }
}

/// Create every missing directory between `start_dir` and the parent of `file_path`.
/// Returns the number of directories created.
pub fn ensure_parent_dirs(driver: &dyn FileDriver, start_dir: &str, file_path: &str, mode: u32) -> GridResult<usize> {
    let (parent, _leaf) = split_path(file_path)?;
    make_dirs(driver, start_dir, parent, mode | DIR_TRAVERSE_BITS)
}

/// Create `dest_dir` and any missing ancestors below `start_dir`.
pub fn make_dirs(driver: &dyn FileDriver, start_dir: &str, dest_dir: &str, mode: u32) -> GridResult<usize> {
    let start = start_dir.trim_end_matches('/');
    let dest = dest_dir.trim_end_matches('/');
    if !is_under(dest, start) {
        return Err(GridError::input(format!("'{}' is not below start directory '{}'", dest_dir, start_dir)));
    }

    let mut cur = dest.len();
    while cur > start.len() {
        let candidate = &dest[..cur];
        if let Ok(st) = driver.stat(candidate) {
            if st.is_dir {
                break;
            }
            warn!(target: "gridvault::materialize", "make_dirs: non-directory '{}' already exists", candidate);
            return Err(GridError::NotADirectory { path: candidate.to_string() });
        }
        cur = dest[..cur].rfind('/').unwrap_or(0);
    }

    let mut created = 0usize;
    while cur < dest.len() {
        let next = dest[cur + 1..].find('/').map(|i| cur + 1 + i).unwrap_or(dest.len());
        let dir = &dest[..next];
        if let Err(e) = driver.mkdir(dir, mode) {
            warn!(target: "gridvault::materialize", "make_dirs: mkdir failed for '{}': {}", dir, e);
            return Err(GridError::FileDriver { op: "mkdir".into(), path: dir.to_string(), message: e.to_string() });
        }
        debug!(target: "gridvault::materialize", "make_dirs: created '{}' mode={:o}", dir, mode);
        created += 1;
        cur = next;
    }
    Ok(created)
}

fn is_under(dest: &str, start: &str) -> bool {
    if start.is_empty() {
        return dest.is_empty() || dest.starts_with('/');
    }
    match dest.strip_prefix(start) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
#[path = "materialize_tests.rs"]
mod materialize_tests;
