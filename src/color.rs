// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Color groups, roles and style-sheet generation
//!
//! Mirrors the desktop shell's `Plasma::Theme::ColorGroup` / `ColorRole`
//! matrix and its `%token` style-sheet substitution language.

use std::fmt;

/// A named subset of a color scheme, selected by which kind of surface is
/// being painted (a button, a view, a tooltip, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColorGroup {
    Normal,
    Button,
    View,
    Complementary,
    Header,
    Tooltip,
    Selection,
}

impl ColorGroup {
    pub const ALL: [ColorGroup; 7] = [
        ColorGroup::Normal,
        ColorGroup::Button,
        ColorGroup::View,
        ColorGroup::Complementary,
        ColorGroup::Header,
        ColorGroup::Tooltip,
        ColorGroup::Selection,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Lower-case token infix used when building `%<group><role>color` tokens,
    /// e.g. `Button` -> `button`. `Normal` and `Selection` have no infix.
    fn token_infix(self) -> &'static str {
        match self {
            ColorGroup::Normal | ColorGroup::Selection => "",
            ColorGroup::Button => "button",
            ColorGroup::View => "view",
            ColorGroup::Complementary => "complementary",
            ColorGroup::Header => "header",
            ColorGroup::Tooltip => "tooltip",
        }
    }

    /// CSS class infix used for group-qualified `.ColorScheme-<Group><Role>`
    /// rules, e.g. `Button` -> `Button`. `Normal` has no infix (its rules are
    /// unqualified); `Selection` is not emitted as its own qualified block,
    /// matching the original implementation.
    fn class_infix(self) -> &'static str {
        match self {
            ColorGroup::Normal | ColorGroup::Selection => "",
            ColorGroup::Button => "Button",
            ColorGroup::View => "View",
            ColorGroup::Complementary => "Complementary",
            ColorGroup::Header => "Header",
            ColorGroup::Tooltip => "Tooltip",
        }
    }
}

/// A role within a [`ColorGroup`]: what the color is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColorRole {
    Text,
    Background,
    Highlight,
    HighlightedText,
    Hover,
    Focus,
    Link,
    VisitedLink,
    PositiveText,
    NeutralText,
    NegativeText,
    DisabledText,
}

impl ColorRole {
    pub const ALL: [ColorRole; 12] = [
        ColorRole::Text,
        ColorRole::Background,
        ColorRole::Highlight,
        ColorRole::HighlightedText,
        ColorRole::Hover,
        ColorRole::Focus,
        ColorRole::Link,
        ColorRole::VisitedLink,
        ColorRole::PositiveText,
        ColorRole::NeutralText,
        ColorRole::NegativeText,
        ColorRole::DisabledText,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// CSS class suffix used in `.ColorScheme-<Group><Role>` rules.
    fn class_suffix(self) -> &'static str {
        match self {
            ColorRole::Text => "Text",
            ColorRole::Background => "Background",
            ColorRole::Highlight => "Highlight",
            ColorRole::HighlightedText => "HighlightedText",
            ColorRole::Hover => "Hover",
            ColorRole::Focus => "Focus",
            ColorRole::Link => "Link",
            ColorRole::VisitedLink => "VisitedLink",
            ColorRole::PositiveText => "PositiveText",
            ColorRole::NeutralText => "NeutralText",
            ColorRole::NegativeText => "NegativeText",
            ColorRole::DisabledText => "DisabledText",
        }
    }
}

/// The status a renderable SVG is painted in, affecting which color is
/// substituted for `%textcolor`/`%backgroundcolor`-style tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Normal,
    Selected,
    Inactive,
}

/// An 8-bit sRGB color with alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl RgbaColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        RgbaColor { r, g, b, a }
    }

    /// `#rrggbb` hex form used in generated style sheets (alpha is dropped,
    /// matching `QColor::name()`, which CSS color-keyword substitution in the
    /// original implementation relies on).
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for RgbaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A complete `ColorGroup` × `ColorRole` → color mapping.
///
/// Every `(group, role)` pair is always populated: roles missing from the
/// source palette are filled in from `Normal` at construction time, so
/// lookups never need to fall back dynamically.
#[derive(Clone, Debug)]
pub struct ColorScheme {
    table: [[RgbaColor; 12]; 7],
}

impl ColorScheme {
    /// Build a scheme from a sparse set of `(group, role, color)` triples.
    /// Any `(group, role)` not given is filled from `(Normal, role)`, and any
    /// `(Normal, role)` not given falls back to a mid-gray placeholder.
    pub fn from_entries(entries: &[(ColorGroup, ColorRole, RgbaColor)]) -> Self {
        let placeholder = RgbaColor::new(128, 128, 128, 255);
        let mut normal_row = [placeholder; 12];
        for &(group, role, color) in entries {
            if group == ColorGroup::Normal {
                normal_row[role.index()] = color;
            }
        }

        let mut table = [normal_row; 7];
        for &(group, role, color) in entries {
            table[group.index()][role.index()] = color;
        }

        ColorScheme { table }
    }

    pub fn color(&self, group: ColorGroup, role: ColorRole) -> RgbaColor {
        self.table[group.index()][role.index()]
    }

    fn status_role(&self, group: ColorGroup, status: Status, role: ColorRole) -> RgbaColor {
        match (status, role) {
            (Status::Selected, ColorRole::Text) => self.color(group, ColorRole::HighlightedText),
            (Status::Inactive, ColorRole::Text) if group == ColorGroup::Normal => {
                self.color(group, ColorRole::DisabledText)
            }
            (Status::Selected, ColorRole::Background) => self.color(group, ColorRole::Highlight),
            _ => self.color(group, role),
        }
    }

    /// Build the `%token` substitution table for `status`, covering every
    /// group at once (the original implementation fills a single flat hash
    /// regardless of which group's style sheet is being requested).
    fn tokens(&self, status: Status, font: &FontHint) -> Vec<(String, String)> {
        let mut tokens = Vec::new();
        for group in ColorGroup::ALL {
            if group == ColorGroup::Selection {
                continue;
            }
            let infix = group.token_infix();
            tokens.push((
                format!("%{infix}textcolor"),
                self.status_role(group, status, ColorRole::Text).to_hex(),
            ));
            tokens.push((
                format!("%{infix}backgroundcolor"),
                self.status_role(group, status, ColorRole::Background).to_hex(),
            ));
            tokens.push((
                format!("%{infix}hovercolor"),
                self.color(group, ColorRole::Hover).to_hex(),
            ));
            if group == ColorGroup::Normal {
                tokens.push((
                    "%highlightcolor".into(),
                    self.color(group, ColorRole::Highlight).to_hex(),
                ));
                tokens.push((
                    "%visitedlink".into(),
                    self.color(group, ColorRole::VisitedLink).to_hex(),
                ));
                tokens.push((
                    "%activatedlink".into(),
                    self.color(group, ColorRole::Highlight).to_hex(),
                ));
                tokens.push((
                    "%hoveredlink".into(),
                    self.color(group, ColorRole::Highlight).to_hex(),
                ));
                tokens.push(("%link".into(), self.color(group, ColorRole::Link).to_hex()));
            } else {
                tokens.push((
                    format!("%{infix}focuscolor"),
                    self.color(group, ColorRole::Focus).to_hex(),
                ));
            }
            tokens.push((
                format!("%{infix}highlightedtextcolor"),
                self.color(group, ColorRole::HighlightedText).to_hex(),
            ));
            tokens.push((
                format!("%{infix}positivetextcolor"),
                self.color(group, ColorRole::PositiveText).to_hex(),
            ));
            tokens.push((
                format!("%{infix}neutraltextcolor"),
                self.color(group, ColorRole::NeutralText).to_hex(),
            ));
            tokens.push((
                format!("%{infix}negativetextcolor"),
                self.color(group, ColorRole::NegativeText).to_hex(),
            ));
        }
        tokens.push(("%fontsize".into(), font.size.clone()));
        tokens.push(("%fontfamily".into(), font.family.clone()));
        tokens
    }

    /// Substitute every `%token` in `css` for its resolved color/font value.
    pub fn process_style_sheet(&self, css: &str, status: Status, font: &FontHint) -> String {
        let mut out = css.to_string();
        for (token, value) in self.tokens(status, font) {
            out = out.replace(&token, &value);
        }
        out
    }

    /// Build the full `.ColorScheme-<Role>{color:...;}` rule set for `group`,
    /// with tokens already substituted. This is the string injected wherever
    /// a document contains `<style id="current-color-scheme">`.
    pub fn generate_style_sheet(&self, group: ColorGroup, status: Status, font: &FontHint) -> String {
        let mut css = String::new();
        let push = |css: &mut String, class: &str, token: &str| {
            css.push_str(&format!(".ColorScheme-{class}{{color:{token};}}"));
        };

        let infix = group.token_infix();
        let roles = [
            ("Text", format!("%{infix}textcolor")),
            ("Background", format!("%{infix}backgroundcolor")),
            (
                "Highlight",
                if infix.is_empty() {
                    "%highlightcolor".to_string()
                } else {
                    format!("%{infix}hovercolor")
                },
            ),
            ("HighlightedText", format!("%{infix}highlightedtextcolor")),
            ("PositiveText", format!("%{infix}positivetextcolor")),
            ("NeutralText", format!("%{infix}neutraltextcolor")),
            ("NegativeText", format!("%{infix}negativetextcolor")),
        ];
        for (class, token) in &roles {
            push(&mut css, class, token);
        }

        // Group-qualified blocks, one per non-Normal, non-Selection group,
        // always present regardless of which `group` was requested: Normal's
        // rules are the unqualified block above, and Selection has no
        // qualified block of its own.
        for g in ColorGroup::ALL {
            if g == ColorGroup::Selection || g == ColorGroup::Normal {
                continue;
            }
            let infix = g.token_infix();
            let class_infix = g.class_infix();
            let qualified = [
                ("Text", format!("%{infix}textcolor")),
                ("Background", format!("%{infix}backgroundcolor")),
                ("Hover", format!("%{infix}hovercolor")),
                (
                    "Focus",
                    if infix.is_empty() {
                        "%highlightcolor".to_string()
                    } else {
                        format!("%{infix}focuscolor")
                    },
                ),
                ("HighlightedText", format!("%{infix}highlightedtextcolor")),
                ("PositiveText", format!("%{infix}positivetextcolor")),
                ("NeutralText", format!("%{infix}neutraltextcolor")),
                ("NegativeText", format!("%{infix}negativetextcolor")),
            ];
            for (suffix, token) in &qualified {
                push(&mut css, &format!("{class_infix}{suffix}"), token);
            }
        }

        self.process_style_sheet(&css, status, font)
    }
}

/// Font hint supplied by the embedding application; this crate never queries
/// a live desktop font setting itself (see Non-goals).
#[derive(Clone, Debug)]
pub struct FontHint {
    pub size: String,
    pub family: String,
}

impl Default for FontHint {
    fn default() -> Self {
        FontHint {
            size: "10pt".to_string(),
            family: "sans-serif".to_string(),
        }
    }
}
