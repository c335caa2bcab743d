// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Theme Engine: resolves theme metadata and fallback chains, owns the
//! color model, the shared renderer pool, and both on-disk caches.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use crate::color::{ColorGroup, ColorScheme, FontHint, Status};
use crate::config::{Settings, ThemeMetadata, XdgDirs};
use crate::error::{Error, Result};
use crate::pixmap_cache::{cache_file_name, sweep_stale_cache_files, PixmapCache};
use crate::pool::RendererPool;
use crate::rects_cache::RectsCache;
use crate::resolver::{PathResolver, ThemeRoot};

/// Synthetic theme name used to cache recolorings of absolute-path SVGs
/// without a real theme directory behind them.
pub const INTERNAL_SYSTEM_COLORS: &str = "internal-system-colors";

const THEME_CHANGE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Bitmask of cache families a trigger can invalidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheTypes {
    pub svg_elements: bool,
    pub pixmaps: bool,
}

impl CacheTypes {
    pub const NONE: CacheTypes = CacheTypes {
        svg_elements: false,
        pixmaps: false,
    };
    pub const ALL: CacheTypes = CacheTypes {
        svg_elements: true,
        pixmaps: true,
    };

    pub fn union(self, other: CacheTypes) -> CacheTypes {
        CacheTypes {
            svg_elements: self.svg_elements || other.svg_elements,
            pixmaps: self.pixmaps || other.pixmaps,
        }
    }

    pub fn is_none(self) -> bool {
        !self.svg_elements && !self.pixmaps
    }
}

/// Capability the hosting application implements to hand the engine
/// resources it has no business knowing the layout of (an applet package,
/// for instance). See the design notes on the "package resolver" pattern.
pub trait PackageResolver {
    fn resolve(&self, kind: &str, name: &str) -> Option<PathBuf>;
}

/// Observer capability set, replacing a signal/slot framework with plain
/// callback registration. The engine coalesces emissions through the
/// pixmap-flush and theme-change timers.
pub trait Observer {
    fn on_theme_changed(&self) {}
    fn on_palette_changed(&self) {}
}

struct ObserverSlot {
    handle: Weak<dyn Observer>,
}

/// The Theme Engine. One instance is conventionally shared globally; a
/// consumer MAY construct its own for isolation/testing.
pub struct Theme {
    name: String,
    fixed_name: bool,
    fallback_chain: Vec<String>,
    metadata: Option<ThemeMetadata>,
    api_version: (u32, u32, u32),
    color_scheme: ColorScheme,
    font: FontHint,
    base_dir: PathBuf,
    xdg: XdgDirs,
    app_base: String,
    rc_file: String,
    resolver: PathResolver,
    pool: Rc<RendererPool>,
    pixmap_cache: RefCell<PixmapCache>,
    rects_cache: RefCell<RectsCache>,
    style_sheets: RefCell<HashMap<(ColorGroup, StatusKey), String>>,
    observers: RefCell<Vec<ObserverSlot>>,
    change_deadline: Option<Instant>,
    pending_invalidation: CacheTypes,
    cache_version: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum StatusKey {
    Normal,
    Selected,
    Inactive,
}

impl From<Status> for StatusKey {
    fn from(s: Status) -> Self {
        match s {
            Status::Normal => StatusKey::Normal,
            Status::Selected => StatusKey::Selected,
            Status::Inactive => StatusKey::Inactive,
        }
    }
}

impl Theme {
    /// Construct the engine for `app_base` (the `<base>` path segment under
    /// each XDG data directory, e.g. `"plasma/desktoptheme"`), reading
    /// `rc_file` (e.g. `"plasmarc"`) for the initial theme selection.
    pub fn new(app_base: impl Into<String>, rc_file: impl Into<String>) -> Self {
        let app_base = app_base.into();
        let rc_file = rc_file.into();
        let xdg = XdgDirs::discover(&app_base);
        let settings_path = xdg.global_settings_path(&rc_file);
        let initial_name = Settings::load(&settings_path)
            .ok()
            .and_then(|s| s.theme_name)
            .unwrap_or_else(|| "default".to_string());

        let mut theme = Theme {
            name: String::new(),
            fixed_name: false,
            fallback_chain: Vec::new(),
            metadata: None,
            api_version: (0, 0, 0),
            color_scheme: ColorScheme::from_entries(&[]),
            font: FontHint::default(),
            base_dir: PathBuf::new(),
            xdg,
            app_base,
            rc_file,
            resolver: PathResolver::new(Vec::new()),
            pool: Rc::new(RendererPool::new()),
            pixmap_cache: RefCell::new(PixmapCache::new(None)),
            rects_cache: RefCell::new(RectsCache::new(None)),
            style_sheets: RefCell::new(HashMap::new()),
            observers: RefCell::new(Vec::new()),
            change_deadline: None,
            pending_invalidation: CacheTypes::NONE,
            cache_version: "1".to_string(),
        };
        let _ = theme.set_theme(&initial_name);
        theme
    }

    /// Construct a theme fixed to `name` for the lifetime of the engine
    /// (never re-reads the settings file); used for per-consumer overrides.
    pub fn with_fixed_name(app_base: impl Into<String>, name: &str) -> Self {
        let mut theme = Theme::new(app_base, "plasmarc");
        theme.fixed_name = true;
        let _ = theme.set_theme(name);
        theme
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_system_colors(&self) -> bool {
        self.name == INTERNAL_SYSTEM_COLORS
    }

    pub fn color_scheme(&self) -> &ColorScheme {
        &self.color_scheme
    }

    pub fn pool(&self) -> Rc<RendererPool> {
        self.pool.clone()
    }

    /// Register a weak observer handle; removed automatically once the
    /// observer is dropped.
    pub fn add_observer(&self, observer: &Rc<dyn Observer>) {
        self.observers.borrow_mut().push(ObserverSlot {
            handle: Rc::downgrade(observer),
        });
    }

    fn notify_observers(&self, f: impl Fn(&dyn Observer)) {
        self.observers.borrow_mut().retain(|slot| slot.handle.strong_count() > 0);
        for slot in self.observers.borrow().iter() {
            if let Some(obs) = slot.handle.upgrade() {
                f(obs.as_ref());
            }
        }
    }

    /// Validate and switch to `name`. On failure, falls back to `default`;
    /// if `default` is also unavailable, returns an error without mutating
    /// any state.
    pub fn set_theme(&mut self, name: &str) -> Result<()> {
        if self.fixed_name && !self.name.is_empty() {
            return Ok(());
        }

        let resolved = self.load_theme(name).or_else(|err| {
            if name == "default" {
                Err(err)
            } else {
                log::warn!(target: "svgtheme", "theme '{name}' unavailable, falling back to default: {err}");
                self.load_theme("default")
            }
        })?;

        self.apply_loaded(resolved);
        Ok(())
    }

    fn load_theme(&self, name: &str) -> Result<LoadedTheme> {
        if name == INTERNAL_SYSTEM_COLORS {
            return Ok(LoadedTheme {
                name: name.to_string(),
                base_dir: PathBuf::new(),
                metadata: None,
                fallback_chain: vec![],
                api_version: (0, 0, 0),
            });
        }

        let base_dir = self
            .xdg
            .data_dirs
            .iter()
            .map(|d| d.join(name))
            .find(|p| p.exists())
            .ok_or_else(|| Error::ThemeNotFound(name.to_string()))?;

        let metadata = ThemeMetadata::load_for_theme_dir(&base_dir)?;
        let api_version = metadata.api_version_triple();

        let mut chain = vec![name.to_string()];
        let mut current_fallback = metadata.fallback_theme.clone();
        while let Some(fallback) = current_fallback.take() {
            if chain.contains(&fallback) {
                break;
            }
            chain.push(fallback.clone());
            if fallback == "default" {
                break;
            }
            current_fallback = self
                .xdg
                .data_dirs
                .iter()
                .map(|d| d.join(&fallback))
                .find(|p| p.exists())
                .and_then(|dir| ThemeMetadata::load_for_theme_dir(&dir).ok())
                .and_then(|m| m.fallback_theme);
        }
        if chain.last().map(String::as_str) != Some("default") {
            chain.push("default".to_string());
        }

        Ok(LoadedTheme {
            name: name.to_string(),
            base_dir,
            metadata: Some(metadata),
            fallback_chain: chain,
            api_version,
        })
    }

    fn apply_loaded(&mut self, loaded: LoadedTheme) {
        self.name = loaded.name;
        self.base_dir = loaded.base_dir;
        self.metadata = loaded.metadata;
        self.fallback_chain = loaded.fallback_chain;
        self.api_version = loaded.api_version;

        self.resolver.invalidate();
        self.style_sheets.borrow_mut().clear();

        let version = self
            .metadata
            .as_ref()
            .map(|m| m.version.clone())
            .unwrap_or_else(|| "0".to_string());
        self.cache_version = version.clone();

        let cache_dir = self.xdg.cache_dir.clone();
        let current_file = cache_file_name(&self.name, &version);
        sweep_stale_cache_files(&cache_dir, &self.name, &current_file);

        self.pixmap_cache
            .replace(PixmapCache::new(Some(cache_dir.join(&current_file))));
        self.rects_cache
            .replace(RectsCache::new(Some(cache_dir.join(format!("{}.rects", self.name)))));

        self.schedule_theme_change_notification(CacheTypes::ALL);
    }

    /// Remap a non-Normal group request to `Button` for themes whose
    /// `X-Plasma-API` major version predates 5 (a backward-compatibility
    /// shim carried from the original color-group dispatch).
    pub fn compat_group(&self, group: ColorGroup) -> ColorGroup {
        if self.api_version.0 < 5 && group != ColorGroup::Normal {
            ColorGroup::Button
        } else {
            group
        }
    }

    pub fn set_color_scheme(&mut self, scheme: ColorScheme) {
        self.color_scheme = scheme;
        self.style_sheets.borrow_mut().clear();
        self.pixmap_cache.borrow_mut().invalidate_all();
        self.notify_observers(|o| o.on_palette_changed());
    }

    pub fn set_font_hint(&mut self, font: FontHint) {
        self.font = font;
        self.style_sheets.borrow_mut().clear();
    }

    /// Cached, token-substituted style sheet for `(group, status)`.
    pub fn style_sheet(&self, group: ColorGroup, status: Status) -> String {
        let group = self.compat_group(group);
        let key = (group, StatusKey::from(status));
        if let Some(cached) = self.style_sheets.borrow().get(&key) {
            return cached.clone();
        }
        let generated = self.color_scheme.generate_style_sheet(group, status, &self.font);
        self.style_sheets.borrow_mut().insert(key, generated.clone());
        generated
    }

    /// Resolve `name` through the active theme's fallback chain.
    pub fn resolve_path(&mut self, name: &str) -> Option<PathBuf> {
        if self.is_system_colors() {
            return None;
        }
        let roots: Vec<ThemeRoot> = self
            .fallback_chain
            .iter()
            .filter_map(|theme_name| {
                self.xdg
                    .data_dirs
                    .iter()
                    .map(|d| d.join(theme_name))
                    .find(|p| p.exists())
                    .map(|base_dir| ThemeRoot {
                        theme_name: theme_name.clone(),
                        base_dir,
                    })
            })
            .collect();
        self.resolver.resolve(&roots, name)
    }

    pub fn pixmap_cache(&self) -> &RefCell<PixmapCache> {
        &self.pixmap_cache
    }

    pub fn rects_cache(&self) -> &RefCell<RectsCache> {
        &self.rects_cache
    }

    /// A tag folded into the Renderer Pool key so that two themes with
    /// identical style sheets never collide (Open Question (a)).
    pub fn tag(&self) -> u64 {
        crate::pool::checksum_str(&format!("{}/{}", self.name, self.cache_version))
    }

    pub fn invalidate(&mut self, types: CacheTypes) {
        if types.svg_elements {
            self.resolver.invalidate();
            self.rects_cache.borrow_mut().invalidate_all();
        }
        if types.pixmaps {
            self.pixmap_cache.borrow_mut().invalidate_all();
        }
    }

    /// Arm (or re-arm) the 100 ms theme-change debounce timer, remembering
    /// which cache families should be dropped when it fires.
    pub fn schedule_theme_change_notification(&mut self, pending: CacheTypes) {
        self.pending_invalidation = self.pending_invalidation.union(pending);
        self.change_deadline = Some(Instant::now() + THEME_CHANGE_DEBOUNCE);
    }

    /// Host-driven poll for both debounce timers this engine owns (the
    /// pixmap flush lives on `PixmapCache`; the theme-change notification
    /// lives here).
    pub fn tick(&mut self, now: Instant) {
        self.pixmap_cache.borrow_mut().tick(now);
        if let Some(deadline) = self.change_deadline {
            if now >= deadline {
                self.change_deadline = None;
                let pending = std::mem::take(&mut self.pending_invalidation);
                if !pending.is_none() {
                    self.invalidate(pending);
                }
                self.notify_observers(|o| o.on_theme_changed());
            }
        }
    }
}

struct LoadedTheme {
    name: String,
    base_dir: PathBuf,
    metadata: Option<ThemeMetadata>,
    fallback_chain: Vec<String>,
    api_version: (u32, u32, u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compat_group_remaps_for_old_api() {
        let mut theme = Theme::new("svgtheme-tests-nonexistent", "plasmarc");
        theme.api_version = (4, 0, 0);
        assert_eq!(theme.compat_group(ColorGroup::View), ColorGroup::Button);
        assert_eq!(theme.compat_group(ColorGroup::Normal), ColorGroup::Normal);
        theme.api_version = (5, 0, 0);
        assert_eq!(theme.compat_group(ColorGroup::View), ColorGroup::View);
    }

    #[test]
    fn style_sheet_is_cached_between_calls() {
        let theme = Theme::new("svgtheme-tests-nonexistent", "plasmarc");
        let a = theme.style_sheet(ColorGroup::Normal, Status::Normal);
        let b = theme.style_sheet(ColorGroup::Normal, Status::Normal);
        assert_eq!(a, b);
    }

    #[test]
    fn system_colors_theme_skips_path_resolution() {
        let mut theme = Theme::new("svgtheme-tests-nonexistent", "plasmarc");
        theme.apply_loaded(LoadedTheme {
            name: INTERNAL_SYSTEM_COLORS.to_string(),
            base_dir: PathBuf::new(),
            metadata: None,
            fallback_chain: vec![],
            api_version: (0, 0, 0),
        });
        assert!(theme.is_system_colors());
        assert_eq!(theme.resolve_path("anything"), None);
    }

    #[test]
    fn tick_fires_theme_changed_after_debounce() {
        let mut theme = Theme::new("svgtheme-tests-nonexistent", "plasmarc");
        let fired = Rc::new(std::cell::Cell::new(false));
        struct Obs(Rc<std::cell::Cell<bool>>);
        impl Observer for Obs {
            fn on_theme_changed(&self) {
                self.0.set(true);
            }
        }
        let obs: Rc<dyn Observer> = Rc::new(Obs(fired.clone()));
        theme.add_observer(&obs);
        theme.schedule_theme_change_notification(CacheTypes::ALL);
        let t0 = Instant::now();
        theme.tick(t0);
        assert!(!fired.get());
        theme.tick(t0 + THEME_CHANGE_DEBOUNCE + Duration::from_millis(1));
        assert!(fired.get());
    }
}
