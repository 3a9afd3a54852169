//! Platform abstraction for the overlay surface
//!
//! This module defines the trait every backend implements, so the surface
//! controller and renderer stay platform-agnostic. The backend (and with it
//! the surface mode) is chosen once at startup by [`probe_surface_mode`].

use thiserror::Error;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod wayland;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod x11;

#[cfg(any(test, feature = "headless"))]
pub mod headless;

/// Information about a connected monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Platform handle used to re-anchor onto this monitor
    pub id: String,
    /// Human-readable label ("description - connector", or "Monitor")
    pub label: String,
    /// X position of the monitor in virtual screen space
    pub x: i32,
    /// Y position of the monitor in virtual screen space
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

/// Build a display label from a monitor's description and connector name.
pub fn monitor_label(description: &str, connector: &str) -> String {
    match (description.is_empty(), connector.is_empty()) {
        (false, false) => format!("{description} - {connector}"),
        (false, true) => description.to_string(),
        (true, false) => connector.to_string(),
        (true, true) => "Monitor".to_string(),
    }
}

/// How the overlay surface is placed. Decided once, never re-probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    /// Compositor-placed layer surface pinned to one monitor's edges
    Anchored,
    /// Undecorated full-screen window spanning the virtual screen
    Fallback,
}

impl std::fmt::Display for SurfaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceMode::Anchored => write!(f, "anchored"),
            SurfaceMode::Fallback => write!(f, "fallback"),
        }
    }
}

/// Configuration for creating the overlay surface
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Layer-shell namespace / window class, used for compositor rules
    pub namespace: String,
    /// Monitor to anchor to initially. `None` lets the compositor choose.
    pub target_monitor_id: Option<String>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            namespace: "crosshair".to_string(),
            target_monitor_id: None,
        }
    }
}

/// Errors that can occur in platform operations
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("buffer error: {0}")]
    BufferError(String),

    #[error("platform error: {0}")]
    Other(String),
}

/// Trait that all platform backends must implement
pub trait OverlayPlatform: Sized {
    /// Create and show the overlay surface
    fn new(config: OverlayConfig) -> Result<Self, PlatformError>;

    /// Surface mode of this backend
    fn mode(&self) -> SurfaceMode;

    /// Current canvas width in pixels
    fn width(&self) -> u32;

    /// Current canvas height in pixels
    fn height(&self) -> u32;

    /// Enumerate connected monitors, in a stable order
    fn get_monitors(&self) -> Vec<MonitorInfo>;

    /// Move the surface onto `monitor`. Only meaningful in anchored mode.
    fn anchor_to_monitor(&mut self, monitor: &MonitorInfo);

    /// Show or hide the surface
    fn set_visible(&mut self, visible: bool);

    /// Empty the input region and drop any opaque region.
    ///
    /// Realizing a surface may reset both, so this is re-applied after every show.
    fn apply_click_through(&mut self);

    /// Whether the platform asked for a repaint (configure, expose, resize).
    /// Clears the request.
    fn take_redraw_request(&mut self) -> bool;

    /// Whether monitors were added, removed or reconfigured, or the surface
    /// lost its output, since the last call. Clears the flag.
    fn take_monitors_changed(&mut self) -> bool;

    /// Get mutable access to the pixel buffer (RGBA, premultiplied)
    /// Returns None if the buffer is not ready
    fn pixel_buffer(&mut self) -> Option<&mut [u8]>;

    /// Commit the current pixel buffer to the screen
    fn commit(&mut self);

    /// Process pending platform events (non-blocking)
    /// Returns false once the display server connection is gone
    fn poll_events(&mut self) -> bool;
}

/// Copy premultiplied RGBA pixels into a little-endian ARGB8888 (BGRA) buffer.
#[cfg(all(unix, not(target_os = "macos")))]
pub(crate) fn rgba_to_bgra(src: &[u8], dst: &mut [u8]) {
    for (from, to) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        to[0] = from[2];
        to[1] = from[1];
        to[2] = from[0];
        to[3] = from[3];
    }
}

/// Re-export the appropriate platform for the current target
#[cfg(all(unix, not(target_os = "macos")))]
pub use linux::{LinuxOverlay as NativeOverlay, get_all_monitors, probe_surface_mode};

// ─────────────────────────────────────────────────────────────────────────────
// Linux Runtime Detection (Wayland layer-shell vs X11)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(all(unix, not(target_os = "macos")))]
mod linux {
    use super::*;

    /// Decide the surface mode: anchored when a Wayland compositor offers
    /// `zwlr_layer_shell_v1`, otherwise the X11 fallback window.
    pub fn probe_surface_mode() -> SurfaceMode {
        if wayland::layer_shell_available() {
            SurfaceMode::Anchored
        } else {
            SurfaceMode::Fallback
        }
    }

    /// Get all monitors using the backend matching `probe_surface_mode`
    pub fn get_all_monitors() -> Vec<MonitorInfo> {
        match probe_surface_mode() {
            SurfaceMode::Anchored => wayland::get_all_monitors(),
            SurfaceMode::Fallback => x11::get_all_monitors(),
        }
    }

    /// Linux overlay that wraps either the Wayland or the X11 backend
    pub enum LinuxOverlay {
        Wayland(wayland::WaylandOverlay),
        X11(x11::X11Overlay),
    }

    impl LinuxOverlay {
        /// Create the backend for an already-probed mode
        pub fn with_mode(mode: SurfaceMode, config: OverlayConfig) -> Result<Self, PlatformError> {
            match mode {
                SurfaceMode::Anchored => {
                    wayland::WaylandOverlay::new(config).map(LinuxOverlay::Wayland)
                }
                SurfaceMode::Fallback => x11::X11Overlay::new(config).map(LinuxOverlay::X11),
            }
        }
    }

    impl OverlayPlatform for LinuxOverlay {
        fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
            Self::with_mode(probe_surface_mode(), config)
        }

        fn mode(&self) -> SurfaceMode {
            match self {
                Self::Wayland(w) => w.mode(),
                Self::X11(x) => x.mode(),
            }
        }

        fn width(&self) -> u32 {
            match self {
                Self::Wayland(w) => w.width(),
                Self::X11(x) => x.width(),
            }
        }

        fn height(&self) -> u32 {
            match self {
                Self::Wayland(w) => w.height(),
                Self::X11(x) => x.height(),
            }
        }

        fn get_monitors(&self) -> Vec<MonitorInfo> {
            match self {
                Self::Wayland(w) => w.get_monitors(),
                Self::X11(x) => x.get_monitors(),
            }
        }

        fn anchor_to_monitor(&mut self, monitor: &MonitorInfo) {
            match self {
                Self::Wayland(w) => w.anchor_to_monitor(monitor),
                Self::X11(x) => x.anchor_to_monitor(monitor),
            }
        }

        fn set_visible(&mut self, visible: bool) {
            match self {
                Self::Wayland(w) => w.set_visible(visible),
                Self::X11(x) => x.set_visible(visible),
            }
        }

        fn apply_click_through(&mut self) {
            match self {
                Self::Wayland(w) => w.apply_click_through(),
                Self::X11(x) => x.apply_click_through(),
            }
        }

        fn take_redraw_request(&mut self) -> bool {
            match self {
                Self::Wayland(w) => w.take_redraw_request(),
                Self::X11(x) => x.take_redraw_request(),
            }
        }

        fn take_monitors_changed(&mut self) -> bool {
            match self {
                Self::Wayland(w) => w.take_monitors_changed(),
                Self::X11(x) => x.take_monitors_changed(),
            }
        }

        fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
            match self {
                Self::Wayland(w) => w.pixel_buffer(),
                Self::X11(x) => x.pixel_buffer(),
            }
        }

        fn commit(&mut self) {
            match self {
                Self::Wayland(w) => w.commit(),
                Self::X11(x) => x.commit(),
            }
        }

        fn poll_events(&mut self) -> bool {
            match self {
                Self::Wayland(w) => w.poll_events(),
                Self::X11(x) => x.poll_events(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_joins_description_and_connector() {
        assert_eq!(monitor_label("LG ULTRAWIDE", "HDMI-A-1"), "LG ULTRAWIDE - HDMI-A-1");
        assert_eq!(monitor_label("LG ULTRAWIDE", ""), "LG ULTRAWIDE");
        assert_eq!(monitor_label("", "DP-2"), "DP-2");
        assert_eq!(monitor_label("", ""), "Monitor");
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn bgra_swizzle_swaps_red_and_blue() {
        let src = [10, 20, 30, 40, 1, 2, 3, 4];
        let mut dst = [0u8; 8];
        rgba_to_bgra(&src, &mut dst);
        assert_eq!(dst, [30, 20, 10, 40, 3, 2, 1, 4]);
    }
}
