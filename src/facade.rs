// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Per-consumer view onto a themed (or absolute) SVG: path, target size,
//! multi-image mode, and the paint/query entry points.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use crate::color::{ColorGroup, Status};
use crate::geom::{Rect, Size};
use crate::pixmap_cache::{CacheEntry, PixmapKey};
use crate::pool::{check_color_hints, ColorHint, SharedRenderer};
use crate::rects_cache::{cache_id, LocalRectCache};
use crate::theme::Theme;

/// Either an absolute filesystem path or a theme-relative logical name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImagePath {
    Absolute(PathBuf),
    Themed(String),
}

/// Per-consumer lifecycle state, mirroring the facade's documented state
/// machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacadeState {
    Unset,
    ValidThemed,
    ValidAbsolute,
    Invalid,
}

/// A rendered pixmap: raw RGBA8 plus its dimensions.
#[derive(Clone)]
pub struct Pixmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Pixmap {
    fn transparent(width: u32, height: u32) -> Self {
        Pixmap {
            width,
            height,
            rgba: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }
}

pub struct Facade {
    theme: Rc<RefCell<Theme>>,
    image_path: Option<ImagePath>,
    resolved_path: Option<PathBuf>,
    state: FacadeState,
    target_size: Option<Size>,
    natural_size: Size,
    multiple_images: bool,
    local_rects: LocalRectCache,
    color_hint: ColorHint,
    source_mtime: SystemTime,
    color_group: ColorGroup,
}

impl Facade {
    pub fn new(theme: Rc<RefCell<Theme>>) -> Self {
        Facade {
            theme,
            image_path: None,
            resolved_path: None,
            state: FacadeState::Unset,
            target_size: None,
            natural_size: Size::default(),
            multiple_images: false,
            local_rects: LocalRectCache::default(),
            color_hint: ColorHint::Neither,
            source_mtime: SystemTime::UNIX_EPOCH,
            color_group: ColorGroup::Normal,
        }
    }

    pub fn state(&self) -> FacadeState {
        self.state
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, FacadeState::ValidThemed | FacadeState::ValidAbsolute)
    }

    pub fn image_path(&self) -> Option<&ImagePath> {
        self.image_path.as_ref()
    }

    pub fn set_contains_multiple_images(&mut self, v: bool) {
        self.multiple_images = v;
    }

    pub fn contains_multiple_images(&self) -> bool {
        self.multiple_images
    }

    pub fn set_color_group(&mut self, group: ColorGroup) {
        self.color_group = group;
    }

    /// Returns `true` if the path actually changed (a no-op idempotently
    /// returns `false`, per invariant 7).
    pub fn set_image_path(&mut self, path: ImagePath) -> bool {
        if self.image_path.as_ref() == Some(&path) {
            return false;
        }

        self.image_path = Some(path.clone());
        self.local_rects.clear();
        self.target_size = None;

        let resolved = match &path {
            ImagePath::Absolute(p) => Some(p.clone()),
            ImagePath::Themed(name) => self.theme.borrow_mut().resolve_path(name),
        };

        match resolved {
            Some(p) => {
                self.resolved_path = Some(p.clone());
                self.state = match &path {
                    ImagePath::Absolute(_) => FacadeState::ValidAbsolute,
                    ImagePath::Themed(_) => FacadeState::ValidThemed,
                };
                self.source_mtime = std::fs::metadata(&p)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                self.color_hint = std::fs::read(&p).map(|b| check_color_hints(&b)).unwrap_or(ColorHint::Neither);
                self.natural_size = self.compute_natural_size(&p);
            }
            None => {
                self.resolved_path = None;
                self.state = FacadeState::Invalid;
                self.natural_size = Size::default();
                self.color_hint = ColorHint::Neither;
            }
        }
        true
    }

    fn style_sheet(&self) -> String {
        self.theme.borrow().style_sheet(self.color_group, Status::Normal)
    }

    fn acquire_renderer(&self) -> Option<SharedRenderer> {
        let path = self.resolved_path.as_ref()?;
        let theme = self.theme.borrow();
        let pool = theme.pool();
        let style = self.style_sheet();
        Some(pool.acquire(path, theme.tag(), &style))
    }

    fn compute_natural_size(&mut self, path: &Path) -> Size {
        if let Some(rect) = self.theme.borrow().rects_cache().borrow().find(path, "", None) {
            return Size::new(rect.w.round() as u32, rect.h.round() as u32);
        }
        let size = self
            .acquire_renderer()
            .filter(|r| r.is_valid())
            .and_then(|r| r.tree().map(|t| t.size()))
            .map(|s| Size::new(s.width().round() as u32, s.height().round() as u32))
            .unwrap_or(Size::new(0, 0));
        self.theme.borrow().rects_cache().borrow_mut().insert(
            path,
            "",
            None,
            Rect::new(0.0, 0.0, size.w as f64, size.h as f64),
        );
        size
    }

    pub fn natural_size(&self) -> Size {
        self.natural_size
    }

    /// Resize the target; `None` restores the natural size.
    pub fn resize(&mut self, size: Option<Size>) {
        self.target_size = size;
        self.local_rects.clear();
    }

    /// The size driving `elementRect`'s natural-to-target scaling: the
    /// caller's explicit `resize()` target, or the document's natural size
    /// if none was set.
    fn scale_target(&self) -> Size {
        self.target_size.unwrap_or(self.natural_size)
    }

    /// Size a render canvas should use for `element_id`: the whole-canvas
    /// target for an empty id or multi-image mode, otherwise the element's
    /// own (already target-scaled) bounding box, matching the original's
    /// `multipleImages`-gated size selection.
    fn effective_size(&mut self, element_id: &str) -> Size {
        if element_id.is_empty() || self.multiple_images {
            self.scale_target()
        } else {
            let rect = self.element_rect(element_id);
            Size::new(rect.w.max(0.0).round() as u32, rect.h.max(0.0).round() as u32)
        }
    }

    /// `elementRect` equivalent: bounding rect of `element_id` scaled from
    /// document coordinates to the current target size (or natural, for an
    /// empty id). Consults the local cache, then the persistent one, then
    /// forces a renderer query.
    pub fn element_rect(&mut self, element_id: &str) -> Rect {
        let Some(path) = self.resolved_path.clone() else {
            return Rect::INVALID;
        };
        let target = self.scale_target();
        let id = cache_id(element_id, Some((target.w, target.h)));
        if let Some(r) = self.local_rects.get(&id) {
            return r;
        }
        if let Some(r) = self.theme.borrow().rects_cache().borrow().find(&path, element_id, Some((target.w, target.h))) {
            self.local_rects.insert(id, r);
            return r;
        }

        let orig_rect = self
            .acquire_renderer()
            .filter(|r| r.is_valid())
            .and_then(|r| r.tree().and_then(|t| t.node_by_id(element_id)).and_then(node_bounds));

        let rect = match orig_rect {
            Some(orig) => {
                let natural = self.natural_size;
                let dx = if natural.w > 0 {
                    target.w as f64 / natural.w as f64
                } else {
                    1.0
                };
                let dy = if natural.h > 0 {
                    target.h as f64 / natural.h as f64
                } else {
                    1.0
                };
                Rect::new(orig.x * dx, orig.y * dy, orig.w * dx, orig.h * dy)
            }
            None => Rect::INVALID,
        };

        self.theme
            .borrow()
            .rects_cache()
            .borrow_mut()
            .insert(&path, element_id, Some((target.w, target.h)), rect);
        self.local_rects.insert(id, rect);
        rect
    }

    pub fn element_size(&mut self, element_id: &str) -> Size {
        let rect = self.element_rect(element_id);
        Size::new(rect.w.max(0.0) as u32, rect.h.max(0.0) as u32)
    }

    pub fn has_element(&mut self, element_id: &str) -> bool {
        self.element_rect(element_id).is_valid()
    }

    /// Render (or fetch from cache) `element_id` (empty string for the
    /// whole document) at the current target size.
    pub fn pixmap(&mut self, element_id: &str) -> Pixmap {
        if !self.is_valid() {
            return Pixmap::transparent(0, 0);
        }
        let size = self.effective_size(element_id);
        if size.w == 0 || size.h == 0 {
            return Pixmap::transparent(0, 0);
        }
        let path = self.resolved_path.clone().unwrap();
        let style = self.style_sheet();
        let checksum = crate::pool::checksum_str(&style);
        let key = PixmapKey {
            path: path.clone(),
            width: size.w,
            height: size.h,
            element_id: element_id.to_string(),
            stylesheet_checksum: checksum,
        };

        let theme = self.theme.clone();
        let found = {
            let theme_ref = theme.borrow();
            let mut cache = theme_ref.pixmap_cache().borrow_mut();
            cache
                .find(&key, self.source_mtime)
                .map(|e| Pixmap {
                    width: e.width,
                    height: e.height,
                    rgba: e.rgba.clone(),
                })
        };
        if let Some(pixmap) = found {
            return pixmap;
        }

        let pixmap = self.render(element_id, size);
        let entry = CacheEntry {
            rgba: pixmap.rgba.clone(),
            width: pixmap.width,
            height: pixmap.height,
            source_mtime: self.source_mtime,
        };
        theme
            .borrow()
            .pixmap_cache()
            .borrow_mut()
            .insert(key, entry, std::time::Instant::now());
        pixmap
    }

    fn render(&mut self, element_id: &str, size: Size) -> Pixmap {
        let Some(renderer) = self.acquire_renderer() else {
            return Pixmap::transparent(size.w, size.h);
        };
        if !renderer.is_valid() {
            return Pixmap::transparent(size.w, size.h);
        }
        let Some(tree) = renderer.tree() else {
            return Pixmap::transparent(size.w, size.h);
        };

        let mut pixmap = match tiny_skia::Pixmap::new(size.w.max(1), size.h.max(1)) {
            Some(p) => p,
            None => return Pixmap::transparent(size.w, size.h),
        };

        if element_id.is_empty() {
            let doc_size = tree.size();
            let transform = tiny_skia::Transform::from_scale(
                size.w as f32 / doc_size.width().max(1.0),
                size.h as f32 / doc_size.height().max(1.0),
            );
            resvg::render(tree, transform, &mut pixmap.as_mut());
        } else if let Some(node) = tree.node_by_id(element_id) {
            let doc_size = tree.size();
            let orig_rect = node_bounds(node).unwrap_or(Rect::INVALID);
            let dst_rect = Rect::new(0.0, 0.0, size.w as f64, size.h as f64);
            let snapped = make_uniform(orig_rect, dst_rect);
            let sx = size.w as f32 / doc_size.width().max(1.0);
            let sy = size.h as f32 / doc_size.height().max(1.0);
            let transform = tiny_skia::Transform::from_scale(sx, sy).post_translate(
                (snapped.x - orig_rect.x) as f32,
                (snapped.y - orig_rect.y) as f32,
            );
            resvg::render(tree, transform, &mut pixmap.as_mut());
        } else {
            return Pixmap::transparent(size.w, size.h);
        }

        let mut rgba = pixmap.data().to_vec();
        if self.color_hint == ColorHint::ApplyColors {
            tint_apply_colors(&mut rgba, self.theme.borrow().color_scheme().color(self.color_group, crate::color::ColorRole::Background));
        }

        Pixmap {
            width: size.w,
            height: size.h,
            rgba,
        }
    }
}

/// Isolates the exact `usvg` bounding-box accessor behind one call site, so
/// an API-shape change only needs a fix here.
fn node_bounds(node: &usvg::Node) -> Option<Rect> {
    let bbox = node.abs_bounding_box();
    Some(Rect::new(
        bbox.x() as f64,
        bbox.y() as f64,
        bbox.width() as f64,
        bbox.height() as f64,
    ))
}

/// Utility: `to`/`from` are always in `0..=1`; returns the signed offset
/// that snaps `from` onto the nearest pixel boundary implied by `to`.
fn closest_distance(to: f64, from: f64) -> f64 {
    let a = to - from;
    if (to - from).abs() < f64::EPSILON {
        0.0
    } else if to > from {
        let b = to - from - 1.0;
        if a.abs() > b.abs() {
            b
        } else {
            a
        }
    } else {
        let b = 1.0 + to - from;
        if a.abs() > b.abs() {
            b
        } else {
            a
        }
    }
}

/// Aligns a rendered element's bounding rect to the pixel grid so repeated
/// elements composited side-by-side don't show seams.
fn make_uniform(orig: Rect, dst: Rect) -> Rect {
    if orig.x.abs() < f64::EPSILON || orig.y.abs() < f64::EPSILON {
        return dst;
    }

    let mut res = dst;
    let div_w = dst.w / orig.w;
    let div_h = dst.h / orig.h;
    let div_x = dst.x / orig.x;
    let div_y = dst.y / orig.y;

    if div_x.abs() > f64::EPSILON && (div_w - div_x).abs() > f64::EPSILON {
        let rem_orig = orig.x - orig.x.floor();
        let rem_dst = dst.x - dst.x.floor();
        let offset = closest_distance(rem_dst, rem_orig);
        res.x += offset + offset * div_w;
        res.w += offset;
    }
    if div_y.abs() > f64::EPSILON && (div_h - div_y).abs() > f64::EPSILON {
        let rem_orig = orig.y - orig.y.floor();
        let rem_dst = dst.y - dst.y.floor();
        let offset = closest_distance(rem_dst, rem_orig);
        res.y += offset + offset * div_h;
        res.h += offset;
    }
    res
}

fn tint_apply_colors(rgba: &mut [u8], color: crate::color::RgbaColor) {
    for px in rgba.chunks_exact_mut(4) {
        let alpha = px[3] as u32;
        if alpha == 0 {
            continue;
        }
        px[0] = color.r;
        px[1] = color.g;
        px[2] = color.b;
    }
}
