//! Persisted crosshair configuration
//!
//! One TOML table, `[Crosshair]`, with flat scalar keys. Loading is
//! tolerant: a missing or unparsable file means "no overrides", and every
//! key is applied on its own, so one bad value never discards the rest.

use std::path::{Path, PathBuf};

use crosshair_types::{CrosshairConfig, CrosshairStyle, Offset, Outline, Rgba};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Application name used for the config directory and file stem
pub const APP_NAME: &str = "crosshair";

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),

    #[error("failed to resolve configuration directory")]
    Dir(#[source] confy::ConfyError),
}

// ─────────────────────────────────────────────────────────────────────────────
// On-disk schema
// ─────────────────────────────────────────────────────────────────────────────

/// Accepts floats and integers (`size = 40`), drops anything else.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match toml::Value::deserialize(deserializer)? {
        toml::Value::Float(v) => Some(v),
        toml::Value::Integer(v) => Some(v as f64),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(toml::Value::deserialize(deserializer)?.as_bool())
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(toml::Value::deserialize(deserializer)?.as_integer())
}

/// The `[Crosshair]` table. Every key is optional; absent or mistyped keys
/// keep whatever the target config already holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub b: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub a: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub show_outline: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub outline_thickness: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub or: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub og: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub ob: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub oa: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub outline_opacity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub style: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub offset_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub offset_y: Option<f64>,
}

impl ConfigOverrides {
    /// Write every present key into `config`, then clamp it back into range.
    pub fn apply_to(&self, config: &mut CrosshairConfig) {
        fn set<T: Copy>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut config.color.r, self.r);
        set(&mut config.color.g, self.g);
        set(&mut config.color.b, self.b);
        set(&mut config.color.a, self.a);
        set(&mut config.thickness, self.thickness);
        set(&mut config.size, self.size);
        set(&mut config.gap, self.gap);
        set(&mut config.outline.enabled, self.show_outline);
        set(&mut config.outline.thickness, self.outline_thickness);
        set(&mut config.outline.color.r, self.or);
        set(&mut config.outline.color.g, self.og);
        set(&mut config.outline.color.b, self.ob);
        set(&mut config.outline.color.a, self.oa);
        set(&mut config.outline.opacity, self.outline_opacity);
        set(&mut config.offset.x, self.offset_x);
        set(&mut config.offset.y, self.offset_y);

        if let Some(index) = self.style {
            config.style = CrosshairStyle::from_index(index);
            if config.style.index() != index {
                warn!(style = index, "unknown crosshair style, using Cross");
            }
        }

        for field in config.normalize() {
            warn!(field, "configuration value out of range, clamped");
        }
    }
}

impl From<&CrosshairConfig> for ConfigOverrides {
    fn from(config: &CrosshairConfig) -> Self {
        let CrosshairConfig {
            color,
            thickness,
            size,
            gap,
            style,
            outline:
                Outline {
                    enabled,
                    thickness: outline_thickness,
                    color: outline_color,
                    opacity,
                },
            offset: Offset { x, y },
        } = *config;
        let Rgba { r, g, b, a } = color;

        Self {
            r: Some(r),
            g: Some(g),
            b: Some(b),
            a: Some(a),
            thickness: Some(thickness),
            size: Some(size),
            gap: Some(gap),
            show_outline: Some(enabled),
            outline_thickness: Some(outline_thickness),
            or: Some(outline_color.r),
            og: Some(outline_color.g),
            ob: Some(outline_color.b),
            oa: Some(outline_color.a),
            outline_opacity: Some(opacity),
            style: Some(style.index()),
            offset_x: Some(x),
            offset_y: Some(y),
        }
    }
}

/// Whole file: unknown tables and keys are ignored
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(rename = "Crosshair", default)]
    crosshair: ConfigOverrides,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.config/crosshair/crosshair.toml` (or platform equivalent)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        confy::get_configuration_file_path(APP_NAME, APP_NAME).map_err(ConfigError::Dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read. `Ok(None)` when the file does not exist.
    pub fn read_overrides(&self) -> Result<Option<ConfigOverrides>, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(file.crosshair))
    }

    /// Tolerant read: any failure yields no overrides.
    pub fn load_overrides(&self) -> ConfigOverrides {
        match self.read_overrides() {
            Ok(Some(overrides)) => overrides,
            Ok(None) => {
                debug!(path = %self.path.display(), "no configuration file, using defaults");
                ConfigOverrides::default()
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable configuration");
                ConfigOverrides::default()
            }
        }
    }

    /// Defaults with the on-disk overrides applied
    pub fn load(&self) -> CrosshairConfig {
        let mut config = CrosshairConfig::default();
        self.load_overrides().apply_to(&mut config);
        info!(path = %self.path.display(), style = config.style.label(), "configuration loaded");
        config
    }

    /// Write the full field set
    pub fn try_save(&self, config: &CrosshairConfig) -> Result<(), ConfigError> {
        let file = ConfigFile {
            crosshair: ConfigOverrides::from(config),
        };
        confy::store_path(&self.path, file).map_err(ConfigError::Save)
    }

    /// Write the full field set; failures are logged and otherwise ignored,
    /// the in-memory config stays authoritative.
    pub fn save(&self, config: &CrosshairConfig) {
        match self.try_save(config) {
            Ok(()) => debug!(path = %self.path.display(), "configuration saved"),
            Err(e) => warn!(error = %e, path = %self.path.display(), "failed to save configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosshair_types::limits;

    fn store_with(contents: &str) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crosshair.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, ConfigStore::new(path))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nope.toml"));
        assert!(store.read_overrides().unwrap().is_none());
        assert_eq!(store.load(), CrosshairConfig::default());
    }

    #[test]
    fn save_then_load_roundtrips_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("crosshair.toml"));
        let config = CrosshairConfig {
            color: Rgba::new(0.9, 0.1, 0.333, 0.75),
            thickness: 3.5,
            size: 120.0,
            gap: 0.0,
            style: CrosshairStyle::X,
            outline: Outline {
                enabled: false,
                thickness: 2.25,
                color: Rgba::new(1.0, 1.0, 1.0, 0.4),
                opacity: 0.6,
            },
            offset: Offset {
                x: -150.5,
                y: 3999.0,
            },
        };

        store.try_save(&config).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let (_dir, store) = store_with("[Crosshair]\nsize = 12\ngap = 3.5\nshow_outline = false\n");
        let loaded = store.load();

        let expected = CrosshairConfig {
            size: 12.0,
            gap: 3.5,
            outline: Outline {
                enabled: false,
                ..Outline::default()
            },
            ..CrosshairConfig::default()
        };
        assert_eq!(loaded, expected);
    }

    #[test]
    fn out_of_range_style_loads_as_cross() {
        for style in ["-1", "99"] {
            let (_dir, store) = store_with(&format!("[Crosshair]\nstyle = {style}\n"));
            assert_eq!(store.load().style, CrosshairStyle::Cross);
        }
        let (_dir, store) = store_with("[Crosshair]\nstyle = 3\n");
        assert_eq!(store.load().style, CrosshairStyle::Dot);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let (_dir, store) = store_with("[Crosshair\nthis is = = not toml");
        assert!(matches!(store.read_overrides(), Err(ConfigError::Parse { .. })));
        assert_eq!(store.load(), CrosshairConfig::default());
    }

    #[test]
    fn mistyped_key_is_ignored_alone() {
        let (_dir, store) =
            store_with("[Crosshair]\nthickness = \"wide\"\nsize = 10\nstyle = 2.0\nunknown = 1\n");
        let loaded = store.load();
        assert_eq!(loaded.thickness, CrosshairConfig::default().thickness);
        assert_eq!(loaded.size, 10.0);
        assert_eq!(loaded.style, CrosshairConfig::default().style);
    }

    #[test]
    fn out_of_range_values_are_clamped_on_load() {
        let (_dir, store) =
            store_with("[Crosshair]\nr = 2.0\noa = -1\nthickness = 0\noffset_x = 10000\n");
        let loaded = store.load();
        assert_eq!(loaded.color.r, 1.0);
        assert_eq!(loaded.outline.color.a, 0.0);
        assert_eq!(loaded.thickness, limits::MIN_THICKNESS);
        assert_eq!(loaded.offset.x, limits::MAX_OFFSET);
    }

    #[test]
    fn saved_file_uses_flat_crosshair_section() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("crosshair.toml"));
        store.try_save(&CrosshairConfig::default()).unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        let table: toml::Table = toml::from_str(&text).unwrap();
        let section = table["Crosshair"].as_table().unwrap();
        for key in [
            "r",
            "g",
            "b",
            "a",
            "thickness",
            "size",
            "gap",
            "show_outline",
            "outline_thickness",
            "or",
            "og",
            "ob",
            "oa",
            "outline_opacity",
            "style",
            "offset_x",
            "offset_y",
        ] {
            assert!(section.contains_key(key), "missing {key}");
        }
        assert_eq!(section["style"].as_integer(), Some(4));
    }

    #[test]
    fn save_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be written as a file
        let store = ConfigStore::new(dir.path());
        assert!(store.try_save(&CrosshairConfig::default()).is_err());
        store.save(&CrosshairConfig::default());
    }
}
