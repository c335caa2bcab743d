// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Two-tier pixmap cache: an in-process pending map flushed on a timer into
//! a bounded, on-disk LRU store shared across processes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies one rasterized pixmap.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixmapKey {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub element_id: String,
    pub stylesheet_checksum: u64,
}

/// A rasterized pixmap plus the source file's mtime at render time, used to
/// detect staleness without re-parsing the SVG.
#[derive(Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub source_mtime: SystemTime,
}

impl CacheEntry {
    fn byte_size(&self) -> usize {
        self.rgba.len()
    }
}

const SOFT_PENDING_CAP: usize = 256;
const FLUSH_DELAY: Duration = Duration::from_millis(600);
const DEFAULT_DISK_BUDGET_BYTES: usize = 32 * 1024 * 1024;

/// Two-tier cache, owned by the Theme Engine, one instance per theme.
pub struct PixmapCache {
    pending: HashMap<PixmapKey, CacheEntry>,
    persistent: LruCache<PixmapKey, CacheEntry>,
    persistent_bytes: usize,
    disk_budget_bytes: usize,
    disk_path: Option<PathBuf>,
    flush_deadline: Option<Instant>,
    disk_unavailable: bool,
}

impl PixmapCache {
    /// `disk_path`: `None` demotes the cache to in-process-only, matching
    /// the `CacheUnavailable` recovery policy (permissions/quota failures).
    pub fn new(disk_path: Option<PathBuf>) -> Self {
        let mut cache = PixmapCache {
            pending: HashMap::new(),
            persistent: LruCache::unbounded(),
            persistent_bytes: 0,
            disk_budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
            disk_path: disk_path.clone(),
            flush_deadline: None,
            disk_unavailable: false,
        };
        if let Some(path) = disk_path {
            if let Err(err) = cache.load_from_disk(&path) {
                log::warn!(target: "svgtheme", "{}: cache unavailable: {err}", path.display());
                cache.disk_unavailable = true;
            }
        }
        cache
    }

    pub fn with_disk_budget_bytes(mut self, bytes: usize) -> Self {
        self.disk_budget_bytes = bytes;
        self
    }

    fn load_from_disk(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let bytes = fs::read(path)?;
        let entries: Vec<(PixmapKey, CacheEntry)> = bincode::deserialize(&bytes)
            .map_err(|e| Error::CacheUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        for (key, entry) in entries {
            self.persistent_bytes += entry.byte_size();
            self.persistent.put(key, entry);
        }
        Ok(())
    }

    /// `find` returns a cached pixmap only if it is fresh with respect to
    /// `source_mtime`: a cache entry older than the source file is treated
    /// as a miss (`CacheStale`) without evicting anything else.
    pub fn find(&mut self, key: &PixmapKey, source_mtime: SystemTime) -> Option<&CacheEntry> {
        if let Some(entry) = self.pending.get(key) {
            if entry.source_mtime >= source_mtime {
                return self.pending.get(key);
            }
            return None;
        }
        if let Some(entry) = self.persistent.get(key) {
            if entry.source_mtime >= source_mtime {
                return self.persistent.peek(key);
            }
        }
        None
    }

    /// Insert a freshly rendered pixmap; schedules (or resets) the flush
    /// timer, or flushes immediately if the pending map's soft cap is
    /// exceeded.
    pub fn insert(&mut self, key: PixmapKey, entry: CacheEntry, now: Instant) {
        self.pending.insert(key, entry);
        if self.pending.len() > SOFT_PENDING_CAP {
            self.flush(now);
        } else {
            self.flush_deadline = Some(now + FLUSH_DELAY);
        }
    }

    /// Host-driven poll; call periodically (or at least whenever idle) so
    /// the 600 ms debounce actually fires.
    pub fn tick(&mut self, now: Instant) {
        if let Some(deadline) = self.flush_deadline {
            if now >= deadline {
                self.flush(now);
            }
        }
    }

    fn flush(&mut self, _now: Instant) {
        self.flush_deadline = None;
        if self.pending.is_empty() {
            return;
        }
        for (key, entry) in self.pending.drain() {
            self.persistent_bytes += entry.byte_size();
            if let Some((_, evicted)) = self.persistent.push(key, entry) {
                self.persistent_bytes = self.persistent_bytes.saturating_sub(evicted.byte_size());
            }
        }
        self.evict_to_budget();
        if let Some(path) = self.disk_path.clone() {
            if let Err(err) = self.save_to_disk(&path) {
                log::warn!(target: "svgtheme", "{}: failed to flush cache: {err}", path.display());
                self.disk_unavailable = true;
            }
        }
    }

    fn evict_to_budget(&mut self) {
        while self.persistent_bytes > self.disk_budget_bytes {
            match self.persistent.pop_lru() {
                Some((_, entry)) => {
                    self.persistent_bytes = self.persistent_bytes.saturating_sub(entry.byte_size());
                }
                None => break,
            }
        }
    }

    fn save_to_disk(&self, path: &Path) -> Result<()> {
        let entries: Vec<(&PixmapKey, &CacheEntry)> = self.persistent.iter().collect();
        let bytes = bincode::serialize(&entries).map_err(|e| Error::CacheUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Drop every cached pixmap (theme change, palette change).
    pub fn invalidate_all(&mut self) {
        self.pending.clear();
        self.persistent.clear();
        self.persistent_bytes = 0;
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn persistent_len(&self) -> usize {
        self.persistent.len()
    }

    pub fn is_disk_backed(&self) -> bool {
        self.disk_path.is_some() && !self.disk_unavailable
    }
}

/// Build the on-disk cache filename convention: `plasma_theme_<name>_v<version>.kcache`.
pub fn cache_file_name(theme_name: &str, version: &str) -> String {
    format!("plasma_theme_{theme_name}_v{version}.kcache")
}

/// Delete any `plasma_theme_<name>*.kcache` file in `dir` that isn't the
/// current version's file, as the theme loader does on every theme switch.
pub fn sweep_stale_cache_files(dir: &Path, theme_name: &str, current_file_name: &str) {
    let prefix = format!("plasma_theme_{theme_name}");
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) && name.ends_with(".kcache") && name != current_file_name {
            if let Err(err) = fs::remove_file(entry.path()) {
                log::warn!(target: "svgtheme", "{}: failed to remove stale cache file: {err}", entry.path().display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> PixmapKey {
        PixmapKey {
            path: PathBuf::from("/themes/default/a.svg"),
            width: 16,
            height: 16,
            element_id: id.to_string(),
            stylesheet_checksum: 0,
        }
    }

    fn entry(mtime: SystemTime) -> CacheEntry {
        CacheEntry {
            rgba: vec![0u8; 16 * 16 * 4],
            width: 16,
            height: 16,
            source_mtime: mtime,
        }
    }

    #[test]
    fn insert_then_find_hits_pending() {
        let mut cache = PixmapCache::new(None);
        let now = Instant::now();
        let mtime = SystemTime::now();
        cache.insert(key("a"), entry(mtime), now);
        assert!(cache.find(&key("a"), mtime).is_some());
    }

    #[test]
    fn stale_source_mtime_is_a_miss() {
        let mut cache = PixmapCache::new(None);
        let now = Instant::now();
        let old_mtime = SystemTime::UNIX_EPOCH;
        cache.insert(key("a"), entry(old_mtime), now);
        let newer_mtime = SystemTime::now();
        assert!(cache.find(&key("a"), newer_mtime).is_none());
    }

    #[test]
    fn exceeding_soft_cap_flushes_immediately() {
        let mut cache = PixmapCache::new(None);
        let now = Instant::now();
        for i in 0..(SOFT_PENDING_CAP + 1) {
            cache.insert(key(&i.to_string()), entry(SystemTime::now()), now);
        }
        assert_eq!(cache.pending_len(), 0);
        assert_eq!(cache.persistent_len(), SOFT_PENDING_CAP + 1);
    }

    #[test]
    fn tick_flushes_after_deadline() {
        let mut cache = PixmapCache::new(None);
        let t0 = Instant::now();
        cache.insert(key("a"), entry(SystemTime::now()), t0);
        assert_eq!(cache.pending_len(), 1);
        cache.tick(t0 + Duration::from_millis(100));
        assert_eq!(cache.pending_len(), 1, "must not flush before deadline");
        cache.tick(t0 + FLUSH_DELAY + Duration::from_millis(1));
        assert_eq!(cache.pending_len(), 0);
        assert_eq!(cache.persistent_len(), 1);
    }

    #[test]
    fn invalidate_all_clears_both_tiers() {
        let mut cache = PixmapCache::new(None);
        let now = Instant::now();
        cache.insert(key("a"), entry(SystemTime::now()), now);
        cache.tick(now + FLUSH_DELAY + Duration::from_millis(1));
        cache.invalidate_all();
        assert_eq!(cache.pending_len(), 0);
        assert_eq!(cache.persistent_len(), 0);
    }

    #[test]
    fn disk_round_trip_survives_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let disk_path = tmp.path().join("theme.kcache");
        let now = Instant::now();
        {
            let mut cache = PixmapCache::new(Some(disk_path.clone()));
            cache.insert(key("a"), entry(SystemTime::now()), now);
            cache.tick(now + FLUSH_DELAY + Duration::from_millis(1));
        }
        let reloaded = PixmapCache::new(Some(disk_path));
        assert_eq!(reloaded.persistent_len(), 1);
    }

    #[test]
    fn cache_file_name_matches_convention() {
        assert_eq!(cache_file_name("breeze", "6.0"), "plasma_theme_breeze_v6.0.kcache");
    }
}
