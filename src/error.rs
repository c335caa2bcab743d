// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Crate-wide error taxonomy

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced by this crate
#[derive(Error, Debug)]
pub enum Error {
    /// No theme with the given name (and no fallback) could be located
    #[error("theme not found: {0}")]
    ThemeNotFound(String),

    /// A themed SVG (or any other themed asset) could not be resolved to a path
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// The SVG document at this path failed to parse
    #[error("failed to parse SVG at {path}: {source}")]
    ParseFailure {
        path: PathBuf,
        #[source]
        source: usvg::Error,
    },

    /// The persistent cache could not be opened or is corrupt beyond repair
    #[error("cache unavailable at {path}: {reason}")]
    CacheUnavailable { path: PathBuf, reason: String },

    /// A cache entry was found but is stale with respect to its source file
    #[error("cache entry stale for {0}")]
    CacheStale(PathBuf),

    /// The requested element id does not exist in the document
    #[error("no such element: {0}")]
    InvalidElement(String),

    /// Low-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Theme metadata failed to (de)serialize
    #[error("metadata error: {0}")]
    Metadata(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Tracks which `(path, error-kind)` pairs have already been logged
///
/// Mirrors the desktop shell's habit of logging a broken-asset warning once
/// rather than once per failed render attempt.
#[derive(Default, Debug)]
pub struct WarnOnce {
    seen: HashSet<(PathBuf, &'static str)>,
}

impl WarnOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` at `log::warn!` the first time this `(path, kind)` pair
    /// is seen; silently skip subsequent repeats.
    pub fn warn(&mut self, path: &Path, kind: &'static str, message: impl std::fmt::Display) {
        let key = (path.to_path_buf(), kind);
        if self.seen.insert(key) {
            log::warn!(target: "svgtheme", "{}: {}", path.display(), message);
        }
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_once_deduplicates() {
        let mut w = WarnOnce::new();
        let p = Path::new("/tmp/foo.svg");
        assert!(w.seen.is_empty());
        w.warn(p, "parse", "bad xml");
        assert_eq!(w.seen.len(), 1);
        w.warn(p, "parse", "bad xml again");
        assert_eq!(w.seen.len(), 1);
        w.warn(p, "missing", "no such file");
        assert_eq!(w.seen.len(), 2);
    }
}
