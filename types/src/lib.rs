//! Shared configuration types for the crosshair overlay
//!
//! `CrosshairConfig` is the single record the renderer draws from. It is
//! serializable so commands can carry parts of it over the control socket,
//! and it knows its own defaults and valid ranges.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Limits
// ─────────────────────────────────────────────────────────────────────────────

/// Valid ranges for the numeric fields. Values outside are clamped on load
/// and on every command.
pub mod limits {
    pub const MIN_THICKNESS: f64 = 0.5;
    pub const MIN_SIZE: f64 = 2.0;
    pub const MIN_GAP: f64 = 0.0;
    pub const MAX_OFFSET: f64 = 4000.0;
}

/// Clamp to `[min, max]`, mapping NaN to `min`.
fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    clamp_finite(value, 0.0, 1.0)
}

pub fn clamp_thickness(value: f64) -> f64 {
    clamp_finite(value, limits::MIN_THICKNESS, f64::MAX)
}

pub fn clamp_size(value: f64) -> f64 {
    clamp_finite(value, limits::MIN_SIZE, f64::MAX)
}

pub fn clamp_gap(value: f64) -> f64 {
    clamp_finite(value, limits::MIN_GAP, f64::MAX)
}

pub fn clamp_offset(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-limits::MAX_OFFSET, limits::MAX_OFFSET)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Color
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized color, every channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with every channel clamped into range
    pub fn clamped(self) -> Self {
        Self {
            r: clamp_unit(self.r),
            g: clamp_unit(self.g),
            b: clamp_unit(self.b),
            a: clamp_unit(self.a),
        }
    }

    /// Same color with a different alpha
    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Style
// ─────────────────────────────────────────────────────────────────────────────

/// Crosshair shape. Persisted as its integer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrosshairStyle {
    #[default]
    Cross,
    X,
    Circle,
    Dot,
    CrossDot,
}

impl CrosshairStyle {
    pub const ALL: [CrosshairStyle; 5] = [
        CrosshairStyle::Cross,
        CrosshairStyle::X,
        CrosshairStyle::Circle,
        CrosshairStyle::Dot,
        CrosshairStyle::CrossDot,
    ];

    /// Look up a style by index. Anything outside the known range becomes `Cross`.
    pub fn from_index(index: i64) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or_default()
    }

    pub fn index(self) -> i64 {
        match self {
            CrosshairStyle::Cross => 0,
            CrosshairStyle::X => 1,
            CrosshairStyle::Circle => 2,
            CrosshairStyle::Dot => 3,
            CrosshairStyle::CrossDot => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CrosshairStyle::Cross => "Cross",
            CrosshairStyle::X => "X",
            CrosshairStyle::Circle => "Circle",
            CrosshairStyle::Dot => "Dot",
            CrosshairStyle::CrossDot => "Cross + Dot",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outline / Offset
// ─────────────────────────────────────────────────────────────────────────────

/// Contrasting ring drawn under every primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub enabled: bool,
    pub thickness: f64,
    pub color: Rgba,
    /// Multiplier on top of `color.a`
    pub opacity: f64,
}

impl Outline {
    /// Outline color alpha composed with the outline opacity
    pub fn effective_alpha(&self) -> f64 {
        self.color.a * self.opacity
    }

    /// Whether the outline pass contributes anything at all
    pub fn is_drawn(&self) -> bool {
        self.enabled && self.thickness > 0.0 && self.effective_alpha() > 0.0
    }
}

impl Default for Outline {
    fn default() -> Self {
        Self {
            enabled: true,
            thickness: 1.5,
            color: Rgba::new(0.0, 0.0, 0.0, 0.9),
            opacity: 1.0,
        }
    }
}

/// Displacement of the crosshair center from the canvas center, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Crosshair Config
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrosshairConfig {
    /// Primary color; alpha doubles as the overall opacity
    pub color: Rgba,
    pub thickness: f64,
    /// Arm length, or radius for `Circle`
    pub size: f64,
    /// Empty space between the center and where the arms start
    pub gap: f64,
    pub style: CrosshairStyle,
    pub outline: Outline,
    pub offset: Offset,
}

impl Default for CrosshairConfig {
    fn default() -> Self {
        Self {
            color: Rgba::new(0.15, 0.85, 0.35, 0.95),
            thickness: 2.0,
            size: 40.0,
            gap: 8.0,
            style: CrosshairStyle::CrossDot,
            outline: Outline::default(),
            offset: Offset::default(),
        }
    }
}

impl CrosshairConfig {
    /// Pull every field back into its valid range.
    ///
    /// Returns the names of the fields that had to be corrected so the caller
    /// can report them.
    pub fn normalize(&mut self) -> Vec<&'static str> {
        let mut corrected = Vec::new();
        let mut fix = |name: &'static str, value: &mut f64, clamp: fn(f64) -> f64| {
            let fixed = clamp(*value);
            if fixed.to_bits() != value.to_bits() {
                *value = fixed;
                corrected.push(name);
            }
        };

        fix("r", &mut self.color.r, clamp_unit);
        fix("g", &mut self.color.g, clamp_unit);
        fix("b", &mut self.color.b, clamp_unit);
        fix("a", &mut self.color.a, clamp_unit);
        fix("thickness", &mut self.thickness, clamp_thickness);
        fix("size", &mut self.size, clamp_size);
        fix("gap", &mut self.gap, clamp_gap);
        fix("outline_thickness", &mut self.outline.thickness, clamp_gap);
        fix("or", &mut self.outline.color.r, clamp_unit);
        fix("og", &mut self.outline.color.g, clamp_unit);
        fix("ob", &mut self.outline.color.b, clamp_unit);
        fix("oa", &mut self.outline.color.a, clamp_unit);
        fix("outline_opacity", &mut self.outline.opacity, clamp_unit);
        fix("offset_x", &mut self.offset.x, clamp_offset);
        fix("offset_y", &mut self.offset.y, clamp_offset);

        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_index_out_of_range_is_cross() {
        assert_eq!(CrosshairStyle::from_index(-1), CrosshairStyle::Cross);
        assert_eq!(CrosshairStyle::from_index(5), CrosshairStyle::Cross);
        assert_eq!(CrosshairStyle::from_index(99), CrosshairStyle::Cross);
        assert_eq!(CrosshairStyle::from_index(i64::MIN), CrosshairStyle::Cross);
    }

    #[test]
    fn style_index_roundtrips_for_known_styles() {
        for style in CrosshairStyle::ALL {
            assert_eq!(CrosshairStyle::from_index(style.index()), style);
        }
    }

    #[test]
    fn effective_outline_alpha_multiplies() {
        let outline = Outline {
            color: Rgba::new(0.0, 0.0, 0.0, 0.5),
            opacity: 0.5,
            ..Outline::default()
        };
        assert_eq!(outline.effective_alpha(), 0.25);
        assert!(outline.is_drawn());

        let invisible = Outline {
            opacity: 0.0,
            ..Outline::default()
        };
        assert!(!invisible.is_drawn());
    }

    #[test]
    fn normalize_leaves_defaults_alone() {
        let mut config = CrosshairConfig::default();
        assert!(config.normalize().is_empty());
        assert_eq!(config, CrosshairConfig::default());
    }

    #[test]
    fn normalize_clamps_out_of_range_fields() {
        let mut config = CrosshairConfig {
            color: Rgba::new(1.5, -0.2, 0.5, f64::NAN),
            thickness: 0.0,
            size: -3.0,
            offset: Offset { x: 9000.0, y: -9000.0 },
            ..CrosshairConfig::default()
        };
        let corrected = config.normalize();

        assert_eq!(config.color, Rgba::new(1.0, 0.0, 0.5, 0.0));
        assert_eq!(config.thickness, limits::MIN_THICKNESS);
        assert_eq!(config.size, limits::MIN_SIZE);
        assert_eq!(config.offset.x, 4000.0);
        assert_eq!(config.offset.y, -4000.0);
        assert_eq!(
            corrected,
            vec!["r", "g", "a", "thickness", "size", "offset_x", "offset_y"]
        );
    }

    #[test]
    fn config_serializes_through_json() {
        let config = CrosshairConfig {
            style: CrosshairStyle::Circle,
            ..CrosshairConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: CrosshairConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
