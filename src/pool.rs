// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Deduplicated SVG document loading.
//!
//! Two consumers asking for the same `(path, style sheet)` pair share one
//! parsed [`usvg::Tree`]; the pool holds only weak references so the last
//! consumer to drop its handle frees the parsed document.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

const COLOR_SCHEME_SENTINEL: &str = "current-color-scheme";
const APPLY_COLOR_SCHEME_HINT: &str = "hint-apply-color-scheme";

/// A parsed document, immutable after construction.
pub struct Renderer {
    tree: Option<usvg::Tree>,
    /// Set when loading failed; `is_valid()` reports false and all queries
    /// return empty results rather than panicking.
    valid: bool,
}

impl Renderer {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn tree(&self) -> Option<&usvg::Tree> {
        self.tree.as_ref()
    }

    fn invalid() -> Self {
        Renderer {
            tree: None,
            valid: false,
        }
    }
}

/// A reference-counted handle to a pooled [`Renderer`]. The pool itself only
/// holds a `Weak`, so dropping the last `SharedRenderer` frees the document.
pub type SharedRenderer = Rc<Renderer>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    theme_tag: u64,
    stylesheet_checksum: u64,
    path: PathBuf,
}

/// Computes a checksum of style-sheet text, used both as the pool's
/// discriminator and as the stylesheet component of a `PixmapKey`.
pub fn checksum_str(s: &str) -> u64 {
    let mut hasher = FxHasher::default();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Process-local map of currently-loaded documents, keyed by theme identity,
/// style-sheet checksum and source path.
#[derive(Default)]
pub struct RendererPool {
    entries: RefCell<HashMap<PoolKey, std::rc::Weak<Renderer>>>,
}

impl RendererPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries; exposed for tests verifying
    /// dedup behavior.
    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Fetch a pooled renderer for `path`, loading it if absent. `theme_tag`
    /// disambiguates identical style sheets belonging to different themes
    /// (see the design notes on pool-key collisions).
    pub fn acquire(
        &self,
        path: &Path,
        theme_tag: u64,
        style_sheet: &str,
    ) -> SharedRenderer {
        let key = PoolKey {
            theme_tag,
            stylesheet_checksum: checksum_str(style_sheet),
            path: path.to_path_buf(),
        };

        {
            let entries = self.entries.borrow();
            if let Some(weak) = entries.get(&key) {
                if let Some(strong) = weak.upgrade() {
                    return strong;
                }
            }
        }

        let renderer = Rc::new(load(path, style_sheet));
        self.entries.borrow_mut().insert(key, Rc::downgrade(&renderer));
        renderer
    }

    /// Drop any expired weak references; called opportunistically, e.g. from
    /// the Theme Engine's tick.
    pub fn sweep(&self) {
        self.entries.borrow_mut().retain(|_, w| w.strong_count() > 0);
    }
}

fn load(path: &Path, style_sheet: &str) -> Renderer {
    let bytes = match read_possibly_compressed(path) {
        Ok(b) => b,
        Err(err) => {
            log::warn!(target: "svgtheme", "{}: failed to read: {err}", path.display());
            return Renderer::invalid();
        }
    };

    let uses_color_scheme = contains_sentinel(&bytes, COLOR_SCHEME_SENTINEL);
    let opts = usvg::Options {
        resources_dir: path.parent().map(|p| p.to_owned()),
        style_sheet: if uses_color_scheme {
            Some(style_sheet.to_string())
        } else {
            None
        },
        ..Default::default()
    };

    match usvg::Tree::from_data(&bytes, &opts) {
        Ok(tree) => Renderer {
            tree: Some(tree),
            valid: true,
        },
        Err(err) => {
            log::warn!(target: "svgtheme", "{}: parse failed: {err}", path.display());
            Renderer::invalid()
        }
    }
}

fn read_possibly_compressed(path: &Path) -> std::io::Result<Vec<u8>> {
    let raw = fs::read(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("svgz") || is_gzip(&raw) {
        let mut decoder = flate2::read::GzDecoder::new(&raw[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(raw)
    }
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

fn contains_sentinel(bytes: &[u8], sentinel: &str) -> bool {
    let needle = sentinel.as_bytes();
    bytes.windows(needle.len()).any(|w| w == needle)
}

/// The three states an SVG document's color-hint elements can put it into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorHint {
    /// Document has `hint-apply-color-scheme`: tint the raster after
    /// rendering.
    ApplyColors,
    /// Document has `current-color-scheme`: already handled by the pool key
    /// and style-sheet substitution.
    UsesColors,
    /// Neither hint present.
    Neither,
}

/// Inspect raw (pre-decompression-aware) bytes for the two recognized hint
/// elements. Exactly one state applies, `ApplyColors` taking precedence if
/// (pathologically) both sentinels are present.
pub fn check_color_hints(bytes: &[u8]) -> ColorHint {
    if contains_sentinel(bytes, APPLY_COLOR_SCHEME_HINT) {
        ColorHint::ApplyColors
    } else if contains_sentinel(bytes, COLOR_SCHEME_SENTINEL) {
        ColorHint::UsesColors
    } else {
        ColorHint::Neither
    }
}
