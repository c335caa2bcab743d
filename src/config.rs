// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Theme metadata, global settings and XDG path resolution.
//!
//! File formats are read with format-guessing the way the toolkit's own
//! config loader does it: JSON goes through `serde_json`, and the
//! desktop-style `key=value` INI files (`metadata.desktop`, `plasmarc`,
//! `colors`) go through a small hand-rolled reader since none of the serde
//! backends understand that format.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// A parsed `key=value` INI-style file, grouped by `[Section]`. This covers
/// `metadata.desktop`, `plasmarc` and `colors` without pulling in a
/// full-blown INI crate for three flat formats.
#[derive(Clone, Debug, Default)]
pub struct IniDocument {
    sections: HashMap<String, HashMap<String, String>>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = String::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(stripped) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current = stripped.to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                sections
                    .entry(current.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        IniDocument { sections }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    pub fn read_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }
}

/// A theme's `metadata.json` (falls back to `metadata.desktop`).
#[derive(Clone, Debug, Deserialize)]
pub struct ThemeMetadata {
    pub name: String,
    #[serde(rename = "X-Plasma-API", default)]
    pub api_version: Option<String>,
    #[serde(rename = "FallbackTheme", default)]
    pub fallback_theme: Option<String>,
    #[serde(default)]
    pub version: String,
}

impl ThemeMetadata {
    /// Parse the `X-Plasma-API` field, e.g. `"5.90.0"`, into a (major, minor,
    /// revision) triple, defaulting unset components to 0.
    pub fn api_version_triple(&self) -> (u32, u32, u32) {
        let Some(v) = &self.api_version else {
            return (0, 0, 0);
        };
        let mut parts = v.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
        (
            parts.next().unwrap_or(0),
            parts.next().unwrap_or(0),
            parts.next().unwrap_or(0),
        )
    }

    fn from_json(path: &Path) -> Result<Self> {
        #[cfg(feature = "json")]
        {
            let text = std::fs::read_to_string(path)?;
            return serde_json::from_str(&text).map_err(|e| Error::Metadata(e.to_string()));
        }
        #[cfg(not(feature = "json"))]
        {
            let _ = path;
            Err(Error::Metadata("json support not enabled".to_string()))
        }
    }

    fn from_desktop_ini(path: &Path) -> Result<Self> {
        let ini = IniDocument::read_path(path)?;
        let name = ini
            .get("Desktop Entry", "Name")
            .ok_or_else(|| Error::Metadata("missing Name".to_string()))?
            .to_string();
        Ok(ThemeMetadata {
            name,
            api_version: ini.get("Desktop Entry", "X-Plasma-API").map(str::to_string),
            fallback_theme: ini.get("Desktop Entry", "FallbackTheme").map(str::to_string),
            version: ini.get("Desktop Entry", "Version").unwrap_or_default().to_string(),
        })
    }

    /// Locate and parse `<theme-dir>/metadata.json` or `metadata.desktop`,
    /// preferring the JSON form.
    pub fn load_for_theme_dir(theme_dir: &Path) -> Result<Self> {
        let json_path = theme_dir.join("metadata.json");
        if json_path.exists() {
            return Self::from_json(&json_path);
        }
        let desktop_path = theme_dir.join("metadata.desktop");
        if desktop_path.exists() {
            return Self::from_desktop_ini(&desktop_path);
        }
        Err(Error::ThemeNotFound(theme_dir.display().to_string()))
    }
}

/// The global `plasmarc`-equivalent settings file: `[Theme] name=<theme>`.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub theme_name: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let ini = IniDocument::read_path(path)?;
        Ok(Settings {
            theme_name: ini.get("Theme", "name").map(str::to_string),
        })
    }
}

/// XDG-derived directories the engine reads from and writes to. Built atop
/// the platform abstraction (`dirs` crate) rather than hand-rolled
/// `$HOME`-joining, matching how `dirs` is already used elsewhere in the
/// corpus for exactly this purpose.
#[derive(Clone, Debug)]
pub struct XdgDirs {
    pub data_dirs: Vec<PathBuf>,
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl XdgDirs {
    pub fn discover(app_base: &str) -> Self {
        let mut data_dirs = Vec::new();
        if let Some(dir) = dirs::data_dir() {
            data_dirs.push(dir.join(app_base));
        }
        if let Some(dir) = dirs::data_local_dir() {
            data_dirs.push(dir.join(app_base));
        }
        XdgDirs {
            data_dirs,
            config_dir: dirs::config_dir().unwrap_or_else(std::env::temp_dir),
            cache_dir: dirs::cache_dir().unwrap_or_else(std::env::temp_dir),
        }
    }

    pub fn global_settings_path(&self, rc_file: &str) -> PathBuf {
        self.config_dir.join(rc_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ini_document_parses_sections_and_keys() {
        let text = "[Theme]\nname = breeze-dark\n\n[Other]\nfoo=bar\n";
        let doc = IniDocument::parse(text);
        assert_eq!(doc.get("Theme", "name"), Some("breeze-dark"));
        assert_eq!(doc.get("Other", "foo"), Some("bar"));
        assert_eq!(doc.get("Theme", "missing"), None);
    }

    #[test]
    fn desktop_metadata_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let theme_dir = tmp.path().join("breeze");
        std::fs::create_dir_all(&theme_dir).unwrap();
        std::fs::write(
            theme_dir.join("metadata.desktop"),
            "[Desktop Entry]\nName=Breeze\nX-Plasma-API=5.90.0\nFallbackTheme=default\n",
        )
        .unwrap();
        let meta = ThemeMetadata::load_for_theme_dir(&theme_dir).unwrap();
        assert_eq!(meta.name, "Breeze");
        assert_eq!(meta.fallback_theme.as_deref(), Some("default"));
        assert_eq!(meta.api_version_triple(), (5, 90, 0));
    }

    #[test]
    fn missing_metadata_is_theme_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ThemeMetadata::load_for_theme_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::ThemeNotFound(_)));
    }

    #[test]
    fn settings_reads_theme_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plasmarc");
        std::fs::write(&path, "[Theme]\nname=oxygen\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.theme_name.as_deref(), Some("oxygen"));
    }

    #[test]
    fn missing_settings_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(&tmp.path().join("missing")).unwrap();
        assert_eq!(settings.theme_name, None);
    }
}
