//! Commands that drive the overlay
//!
//! Every input source (the control socket, signals) produces one of
//! these. Config mutations are pure: [`Command::apply`] edits the config and
//! reports which side effects the dispatcher has to carry out.

use crosshair_types::{
    CrosshairConfig, CrosshairStyle, Offset, Rgba, clamp_gap, clamp_offset, clamp_size,
    clamp_thickness, clamp_unit,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    SetColor(Rgba),
    /// Alpha of the primary color
    SetOpacity(f64),
    SetThickness(f64),
    SetSize(f64),
    SetGap(f64),
    /// Style index; unknown indices become Cross
    SetStyle(i64),
    SetOutlineEnabled(bool),
    SetOutlineColor(Rgba),
    SetOutlineThickness(f64),
    SetOutlineOpacity(f64),
    SetOffset { x: f64, y: f64 },
    SelectMonitor(usize),
    RefreshMonitors,
    ToggleVisibility,
    Quit,
}

/// Side effects requested by a config mutation, performed persist first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effects {
    pub persist: bool,
    pub redraw: bool,
}

impl Effects {
    pub const NONE: Effects = Effects {
        persist: false,
        redraw: false,
    };
    pub const PERSIST_AND_REDRAW: Effects = Effects {
        persist: true,
        redraw: true,
    };
}

impl Command {
    /// True for commands handled by the overlay surface or the loop itself
    pub fn is_surface_command(&self) -> bool {
        matches!(
            self,
            Command::SelectMonitor(_)
                | Command::RefreshMonitors
                | Command::ToggleVisibility
                | Command::Quit
        )
    }

    /// Apply a config mutation. Surface commands leave the config untouched
    /// and return [`Effects::NONE`].
    pub fn apply(&self, config: &mut CrosshairConfig) -> Effects {
        match *self {
            Command::SetColor(color) => config.color = color.clamped(),
            Command::SetOpacity(alpha) => config.color.a = clamp_unit(alpha),
            Command::SetThickness(v) => config.thickness = clamp_thickness(v),
            Command::SetSize(v) => config.size = clamp_size(v),
            Command::SetGap(v) => config.gap = clamp_gap(v),
            Command::SetStyle(index) => config.style = CrosshairStyle::from_index(index),
            Command::SetOutlineEnabled(enabled) => config.outline.enabled = enabled,
            Command::SetOutlineColor(color) => config.outline.color = color.clamped(),
            Command::SetOutlineThickness(v) => config.outline.thickness = clamp_gap(v),
            Command::SetOutlineOpacity(v) => config.outline.opacity = clamp_unit(v),
            Command::SetOffset { x, y } => {
                config.offset = Offset {
                    x: clamp_offset(x),
                    y: clamp_offset(y),
                }
            }
            Command::SelectMonitor(_)
            | Command::RefreshMonitors
            | Command::ToggleVisibility
            | Command::Quit => return Effects::NONE,
        }
        Effects::PERSIST_AND_REDRAW
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosshair_types::limits;

    #[test]
    fn thickness_updates_only_thickness() {
        let mut config = CrosshairConfig::default();
        let effects = Command::SetThickness(4.0).apply(&mut config);

        assert_eq!(effects, Effects::PERSIST_AND_REDRAW);
        assert_eq!(
            config,
            CrosshairConfig {
                thickness: 4.0,
                ..CrosshairConfig::default()
            }
        );
    }

    #[test]
    fn set_style_clamps_unknown_index() {
        let mut config = CrosshairConfig::default();
        Command::SetStyle(2).apply(&mut config);
        assert_eq!(config.style, CrosshairStyle::Circle);

        Command::SetStyle(42).apply(&mut config);
        assert_eq!(config.style, CrosshairStyle::Cross);
        Command::SetStyle(-3).apply(&mut config);
        assert_eq!(config.style, CrosshairStyle::Cross);
    }

    #[test]
    fn numeric_setters_clamp_like_load() {
        let mut config = CrosshairConfig::default();
        Command::SetThickness(0.0).apply(&mut config);
        Command::SetSize(-10.0).apply(&mut config);
        Command::SetGap(-1.0).apply(&mut config);
        Command::SetOpacity(1.5).apply(&mut config);
        Command::SetOffset { x: -9000.0, y: 12.0 }.apply(&mut config);

        assert_eq!(config.thickness, limits::MIN_THICKNESS);
        assert_eq!(config.size, limits::MIN_SIZE);
        assert_eq!(config.gap, 0.0);
        assert_eq!(config.color.a, 1.0);
        assert_eq!(config.offset, Offset { x: -limits::MAX_OFFSET, y: 12.0 });
    }

    #[test]
    fn colors_are_clamped_per_channel() {
        let mut config = CrosshairConfig::default();
        Command::SetOutlineColor(Rgba::new(2.0, -1.0, 0.5, 0.25)).apply(&mut config);
        assert_eq!(config.outline.color, Rgba::new(1.0, 0.0, 0.5, 0.25));
    }

    #[test]
    fn surface_commands_do_not_touch_config() {
        for command in [
            Command::SelectMonitor(1),
            Command::RefreshMonitors,
            Command::ToggleVisibility,
            Command::Quit,
        ] {
            let mut config = CrosshairConfig::default();
            assert!(command.is_surface_command());
            assert_eq!(command.apply(&mut config), Effects::NONE);
            assert_eq!(config, CrosshairConfig::default());
        }
    }

    #[test]
    fn json_shape_is_stable() {
        let json = serde_json::to_string(&Command::SetOffset { x: 1.0, y: -2.0 }).unwrap();
        assert_eq!(json, r#"{"SetOffset":{"x":1.0,"y":-2.0}}"#);
        let back: Command = serde_json::from_str(r#""ToggleVisibility""#).unwrap();
        assert_eq!(back, Command::ToggleVisibility);
    }
}
