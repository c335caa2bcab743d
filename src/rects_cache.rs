// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Persistent cache of element bounding rectangles, separate from pixmap
//! data so a size query never forces a raster.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geom::Rect;

/// Key into the persistent rects index: the source path plus a size-prefixed
/// element id (`"Natural_foo"` or `"32x32_foo"`), matching the original
/// cache-id convention so unscaled and scaled bounds never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct RectKey {
    path: PathBuf,
    cache_id: String,
}

/// Build the `<w>x<h>_<id>` / `Natural_<id>` cache-id string.
pub fn cache_id(element_id: &str, size: Option<(u32, u32)>) -> String {
    match size {
        Some((w, h)) => format!("{w}x{h}_{element_id}"),
        None => format!("Natural_{element_id}"),
    }
}

/// One theme's element-rect index, persisted to disk as a single file.
#[derive(Default)]
pub struct RectsCache {
    entries: HashMap<RectKey, Rect>,
    disk_path: Option<PathBuf>,
    dirty: bool,
}

impl RectsCache {
    pub fn new(disk_path: Option<PathBuf>) -> Self {
        let mut cache = RectsCache {
            entries: HashMap::new(),
            disk_path: disk_path.clone(),
            dirty: false,
        };
        if let Some(path) = disk_path {
            if path.exists() {
                if let Err(err) = cache.load(&path) {
                    log::warn!(target: "svgtheme", "{}: rects cache unavailable: {err}", path.display());
                }
            }
        }
        cache
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = fs::read(path)?;
        let pairs: Vec<(RectKey, Rect)> = bincode::deserialize(&bytes).unwrap_or_default();
        self.entries = pairs.into_iter().collect();
        Ok(())
    }

    pub fn find(&self, path: &Path, element_id: &str, size: Option<(u32, u32)>) -> Option<Rect> {
        let key = RectKey {
            path: path.to_path_buf(),
            cache_id: cache_id(element_id, size),
        };
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, path: &Path, element_id: &str, size: Option<(u32, u32)>, rect: Rect) {
        let key = RectKey {
            path: path.to_path_buf(),
            cache_id: cache_id(element_id, size),
        };
        self.entries.insert(key, rect);
        self.dirty = true;
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }

    /// Flush to disk if there are unsaved changes; a no-op for in-memory
    /// caches (no `disk_path` configured).
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(path) = self.disk_path.clone() else {
            self.dirty = false;
            return Ok(());
        };
        let pairs: Vec<(&RectKey, &Rect)> = self.entries.iter().collect();
        let bytes = bincode::serialize(&pairs).map_err(|e| crate::error::Error::CacheUnavailable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A Facade's local rect cache: avoids repeated lookups into the persistent
/// store for the lifetime of one image-path/size combination.
#[derive(Default)]
pub struct LocalRectCache {
    entries: HashMap<String, Rect>,
}

impl LocalRectCache {
    pub fn get(&self, cache_id: &str) -> Option<Rect> {
        self.entries.get(cache_id).copied()
    }

    pub fn insert(&mut self, cache_id: String, rect: Rect) {
        self.entries.insert(cache_id, rect);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_id_distinguishes_natural_from_scaled() {
        assert_eq!(cache_id("foo", None), "Natural_foo");
        assert_eq!(cache_id("foo", Some((32, 32))), "32x32_foo");
    }

    #[test]
    fn insert_then_find_round_trips() {
        let mut cache = RectsCache::new(None);
        let path = Path::new("/themes/default/a.svg");
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        cache.insert(path, "foo", None, rect);
        assert_eq!(cache.find(path, "foo", None), Some(rect));
        assert_eq!(cache.find(path, "foo", Some((32, 32))), None);
    }

    #[test]
    fn disk_round_trip_survives_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let disk_path = tmp.path().join("rects.bin");
        let path = Path::new("/themes/default/a.svg");
        {
            let mut cache = RectsCache::new(Some(disk_path.clone()));
            cache.insert(path, "foo", None, Rect::new(1.0, 2.0, 3.0, 4.0));
            cache.save().unwrap();
        }
        let reloaded = RectsCache::new(Some(disk_path));
        assert_eq!(reloaded.find(path, "foo", None), Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn local_cache_cleared_on_demand() {
        let mut local = LocalRectCache::default();
        local.insert("Natural_foo".to_string(), Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(local.get("Natural_foo").is_some());
        local.clear();
        assert!(local.get("Natural_foo").is_none());
    }
}
