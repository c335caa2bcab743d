// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Minimal geometry types shared by the cache and facade modules.

/// An integer pixel size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Size { w, h }
    }
}

/// A rectangle in document (unscaled) or pixel (scaled) coordinates,
/// depending on context.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Rect { x, y, w, h }
    }

    pub fn is_valid(&self) -> bool {
        self.w > 0.0 && self.h > 0.0 && self.w.is_finite() && self.h.is_finite()
    }

    pub const INVALID: Rect = Rect::new(0.0, 0.0, -1.0, -1.0);
}

impl Default for Rect {
    fn default() -> Self {
        Rect::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_rect_reports_invalid() {
        assert!(!Rect::INVALID.is_valid());
        assert!(!Rect::default().is_valid());
    }

    #[test]
    fn positive_rect_is_valid() {
        assert!(Rect::new(0.0, 0.0, 10.0, 10.0).is_valid());
    }
}
