// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! A themed SVG rendering and caching engine.
//!
//! Given a theme-relative or absolute image path and an optional
//! sub-element identifier, this crate delivers pixel-perfect rasterizations
//! of vector artwork at arbitrary sizes, recolors those vectors at runtime
//! according to an active color scheme, and answers geometric queries about
//! named sub-elements, without redundant file I/O, re-parsing, or
//! re-rasterization.
//!
//! The crate is organized around three collaborating subsystems:
//!
//! - [`theme`]: resolves logical image names to files under a themed
//!   directory tree (with fallback themes), maintains the color scheme, and
//!   owns the shared on-disk pixmap cache.
//! - [`pool`]: deduplicates parsed SVG documents across all consumers,
//!   keyed by path and style-sheet checksum.
//! - [`pixmap_cache`] / [`rects_cache`]: two-tier caches of rasterized
//!   pixmaps and element bounding rectangles.
//!
//! [`facade::Facade`] is the per-consumer entry point most embedders use
//! directly.

mod color;
mod config;
mod error;
mod facade;
mod geom;
mod pixmap_cache;
mod pool;
mod rects_cache;
mod resolver;
mod theme;
mod watch;

pub use color::{ColorGroup, ColorRole, ColorScheme, FontHint, RgbaColor, Status};
pub use config::{Settings, ThemeMetadata, XdgDirs};
pub use error::{Error, Result, WarnOnce};
pub use facade::{Facade, FacadeState, ImagePath, Pixmap};
pub use geom::{Rect, Size};
pub use pixmap_cache::{CacheEntry, PixmapCache, PixmapKey};
pub use pool::{ColorHint, Renderer, RendererPool, SharedRenderer};
pub use rects_cache::{LocalRectCache, RectsCache};
pub use resolver::{PathResolver, ThemeRoot};
pub use theme::{CacheTypes, Observer, PackageResolver, Theme, INTERNAL_SYSTEM_COLORS};
pub use watch::{WatchPoint, Watcher};
