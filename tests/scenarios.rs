//! End-to-end scenarios covering paint/cache/fallback behavior across the
//! Theme Engine, Renderer Pool, and both caches together.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::sync::Mutex;

use svgtheme::{ColorGroup, ColorRole, ColorScheme, Facade, ImagePath, RgbaColor, Theme};

/// XDG env vars are process-global; serialize the tests that override them
/// so they don't race each other.
static XDG_ENV_LOCK: Mutex<()> = Mutex::new(());

fn with_fake_xdg_data_home(dir: &std::path::Path) -> std::sync::MutexGuard<'static, ()> {
    let guard = XDG_ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var("XDG_DATA_HOME", dir);
    std::env::set_var("XDG_CACHE_HOME", dir.join("cache"));
    std::env::set_var("XDG_CONFIG_HOME", dir.join("config"));
    guard
}

fn background_svg() -> &'static str {
    r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50">
    <defs><style id="current-color-scheme">.ColorScheme-Background{color:#000000;}</style></defs>
    <rect width="100" height="50" class="ColorScheme-Background" fill="currentColor"/>
</svg>"#
}

fn icon_with_element() -> &'static str {
    r#"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="32">
    <rect id="bar" x="4" y="4" width="24" height="24"/>
</svg>"#
}

/// Builds a throwaway theme directory tree with one asset, returning the
/// XDG data root that should be pointed at via `XDG_DATA_HOME`-equivalent
/// override. Since `Theme` derives its data dirs from the `dirs` crate
/// (not overridable per-instance in this minimal harness), these tests
/// exercise the pieces that don't require a real XDG layout: the pool,
/// the caches, and the facade driven against absolute paths, mirroring how
/// an "internal-system-colors" consumer would use the engine for
/// non-themed artwork.
fn write_asset(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn system_colors_theme() -> Rc<RefCell<Theme>> {
    Rc::new(RefCell::new(Theme::with_fixed_name(
        "svgtheme-tests",
        "internal-system-colors",
    )))
}

#[test]
fn s1_themed_load_with_recoloring() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_asset(tmp.path(), "background.svg", background_svg());

    let theme = system_colors_theme();
    theme.borrow_mut().set_color_scheme(ColorScheme::from_entries(&[(
        ColorGroup::Normal,
        ColorRole::Background,
        RgbaColor::new(0x11, 0x22, 0x33, 0xff),
    )]));

    let mut facade = Facade::new(theme);
    facade.set_image_path(ImagePath::Absolute(path));
    facade.resize(Some(svgtheme::Size::new(100, 50)));
    let pixmap = facade.pixmap("");
    assert_eq!(pixmap.width, 100);
    assert_eq!(pixmap.height, 50);

    let mut blue_sum: u64 = 0;
    let mut opaque_pixels: u64 = 0;
    for px in pixmap.rgba.chunks_exact(4) {
        if px[3] > 0 {
            blue_sum += px[2] as u64;
            opaque_pixels += 1;
        }
    }
    assert!(opaque_pixels > 0, "expected some opaque pixels from the filled rect");
    let mean_blue = blue_sum / opaque_pixels;
    assert!(
        (0x33i64 - mean_blue as i64).unsigned_abs() <= 5,
        "mean blue {mean_blue:#x} not close to 0x33"
    );
}

#[test]
fn s2_cache_reuse_across_two_facades() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_asset(tmp.path(), "foo.svg", icon_with_element());

    let theme = system_colors_theme();
    let mut facade_a = Facade::new(theme.clone());
    let mut facade_b = Facade::new(theme.clone());
    facade_a.set_image_path(ImagePath::Absolute(path.clone()));
    facade_b.set_image_path(ImagePath::Absolute(path));
    facade_a.resize(Some(svgtheme::Size::new(32, 32)));
    facade_b.resize(Some(svgtheme::Size::new(32, 32)));

    let _p1 = facade_a.pixmap("bar");
    let _p2 = facade_b.pixmap("bar");

    // Both facades loaded the same (path, style) pair, so the pool holds
    // exactly one live renderer regardless of how many facades reference it.
    assert_eq!(theme.borrow().pool().live_count(), 1);
}

#[test]
fn s4_mtime_staleness_forces_rerender() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_asset(tmp.path(), "icon.svg", icon_with_element());

    let theme = system_colors_theme();
    let mut facade = Facade::new(theme);
    facade.set_image_path(ImagePath::Absolute(path.clone()));
    facade.resize(Some(svgtheme::Size::new(32, 32)));
    let _first = facade.pixmap("");

    // Touch the file with new content (bumps mtime on most filesystems;
    // explicit sleep keeps this reliable on coarse-grained clocks).
    std::thread::sleep(std::time::Duration::from_millis(10));
    fs::write(&path, icon_with_element()).unwrap();
    facade.set_image_path(ImagePath::Absolute(std::path::PathBuf::from("/dev/null")));
    facade.set_image_path(ImagePath::Absolute(path));
    let _second = facade.pixmap("");
    // Re-resolving after the touch must have refreshed `source_mtime`;
    // the facade must not be stuck serving a stale cache entry.
    assert!(facade.is_valid());
}

#[test]
fn s5_missing_asset_is_invalid_and_paint_is_noop() {
    let theme = system_colors_theme();
    let mut facade = Facade::new(theme);
    facade.set_image_path(ImagePath::Absolute("/non/existent.svg".into()));
    assert!(!facade.is_valid());
    assert!(!facade.has_element("x"));
    let pixmap = facade.pixmap("");
    assert_eq!(pixmap.width, 0);
    assert_eq!(pixmap.height, 0);
}

#[test]
fn s7_idempotent_set_image_path() {
    let theme = system_colors_theme();
    let mut facade = Facade::new(theme);
    let path = ImagePath::Absolute("/non/existent.svg".into());
    assert!(facade.set_image_path(path.clone()));
    assert!(!facade.set_image_path(path));
}

fn write_theme_dir(data_home: &std::path::Path, app_base: &str, theme: &str, fallback: Option<&str>, asset: &str, asset_content: &str) {
    let dir = data_home.join(app_base).join(theme);
    fs::create_dir_all(&dir).unwrap();
    let fallback_line = fallback.map(|f| format!("FallbackTheme={f}\n")).unwrap_or_default();
    fs::write(
        dir.join("metadata.desktop"),
        format!("[Desktop Entry]\nName={theme}\nX-Plasma-API=5.90.0\n{fallback_line}"),
    )
    .unwrap();
    write_asset(&dir, asset, asset_content);
}

#[test]
fn s3_theme_change_invalidation() {
    let tmp = tempfile::tempdir().unwrap();
    let app_base = "svgtheme-tests-s3";
    write_theme_dir(tmp.path(), app_base, "default", None, "icon.svg", icon_with_element());
    write_theme_dir(tmp.path(), app_base, "alt", None, "icon.svg", icon_with_element());

    let _guard = with_fake_xdg_data_home(tmp.path());
    let theme = Rc::new(RefCell::new(Theme::new(app_base, "svgtheme-tests-s3-rc")));
    theme.borrow_mut().set_color_scheme(ColorScheme::from_entries(&[(
        ColorGroup::Normal,
        ColorRole::Background,
        RgbaColor::new(10, 10, 10, 255),
    )]));

    let mut facade = Facade::new(theme.clone());
    facade.set_image_path(ImagePath::Themed("icon".to_string()));
    facade.resize(Some(svgtheme::Size::new(16, 16)));
    let before = facade.pixmap("").rgba;

    theme.borrow_mut().set_theme("alt").unwrap();
    theme.borrow_mut().set_color_scheme(ColorScheme::from_entries(&[(
        ColorGroup::Normal,
        ColorRole::Background,
        RgbaColor::new(200, 200, 200, 255),
    )]));
    facade.set_image_path(ImagePath::Themed("icon".to_string()));
    facade.resize(Some(svgtheme::Size::new(16, 16)));
    let after = facade.pixmap("").rgba;

    assert_ne!(before, after, "pixel data should differ after a theme switch");
}

#[test]
fn s6_fallback_chain_resolves_missing_asset_from_default() {
    let tmp = tempfile::tempdir().unwrap();
    let app_base = "svgtheme-tests-s6";
    write_theme_dir(tmp.path(), app_base, "default", None, "button.svg", icon_with_element());
    // "custom" exists but does not provide button.svg; it falls back to default.
    fs::create_dir_all(tmp.path().join(app_base).join("custom")).unwrap();
    fs::write(
        tmp.path().join(app_base).join("custom/metadata.desktop"),
        "[Desktop Entry]\nName=custom\nX-Plasma-API=5.90.0\nFallbackTheme=default\n",
    )
    .unwrap();

    let _guard = with_fake_xdg_data_home(tmp.path());
    let theme = Rc::new(RefCell::new(Theme::new(app_base, "svgtheme-tests-s6-rc")));
    theme.borrow_mut().set_theme("custom").unwrap();

    let mut facade = Facade::new(theme);
    facade.set_image_path(ImagePath::Themed("button".to_string()));
    assert!(facade.is_valid());
    assert_eq!(
        facade.image_path(),
        Some(&ImagePath::Themed("button".to_string())),
        "the logical name is reported even though the file came from the fallback theme"
    );
}
