// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Resolves theme-relative image names to absolute paths, walking the
//! active theme's fallback chain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A single probe root: `<data-dir>/<base>/<theme-name>`.
#[derive(Clone, Debug)]
pub struct ThemeRoot {
    pub theme_name: String,
    pub base_dir: PathBuf,
}

/// Maps `(theme, relative-name)` to an absolute file, trying each selector
/// and each fallback theme in order, memoizing negative and positive results.
#[derive(Default)]
pub struct PathResolver {
    selectors: Vec<String>,
    cache: HashMap<(String, String), Option<PathBuf>>,
}

impl PathResolver {
    pub fn new(selectors: Vec<String>) -> Self {
        PathResolver {
            selectors,
            cache: HashMap::new(),
        }
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    /// Clear memoized results; called on theme change or explicit
    /// SvgElements invalidation.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Resolve `name` against the fallback chain `roots` (the active theme
    /// first, then each fallback in order, conventionally ending in
    /// `default`).
    pub fn resolve(&mut self, roots: &[ThemeRoot], name: &str) -> Option<PathBuf> {
        let key = (
            roots.first().map(|r| r.theme_name.clone()).unwrap_or_default(),
            name.to_string(),
        );
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        let mut found = None;
        for root in roots {
            if let Some(path) = self.probe_one(root, name) {
                found = Some(path);
                break;
            }
        }
        self.cache.insert(key, found.clone());
        found
    }

    fn probe_one(&self, root: &ThemeRoot, name: &str) -> Option<PathBuf> {
        for selector in &self.selectors {
            let candidate = root.base_dir.join(selector).join(name);
            if file_exists_with_svg_extensions(&candidate) {
                return resolve_svg_extension(&candidate);
            }
        }
        let candidate = root.base_dir.join(name);
        if file_exists_with_svg_extensions(&candidate) {
            return resolve_svg_extension(&candidate);
        }
        None
    }
}

fn file_exists_with_svg_extensions(base: &Path) -> bool {
    resolve_svg_extension(base).is_some()
}

/// An asset may be named without extension (`widgets/background`), with
/// `.svg`, or with the gzip-compressed `.svgz` variant. Probe in that order.
fn resolve_svg_extension(base: &Path) -> Option<PathBuf> {
    if base.exists() {
        return Some(base.to_path_buf());
    }
    let svg = with_extension_appended(base, "svg");
    if svg.exists() {
        return Some(svg);
    }
    let svgz = with_extension_appended(base, "svgz");
    if svgz.exists() {
        return Some(svgz);
    }
    None
}

fn with_extension_appended(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}
