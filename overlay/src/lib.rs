//! Crosshair Overlay Library
//!
//! Click-through crosshair rendering on Wayland (wlr-layer-shell) and X11.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    surface                          │
//! │                OverlaySurface                       │
//! │   (visibility, click-through, centering, redraws)   │
//! ├──────────────────────────┬──────────────────────────┤
//! │        monitor           │        renderer          │
//! │    MonitorRegistry       │  draw plan + tiny-skia   │
//! ├──────────────────────────┴──────────────────────────┤
//! │                    platform/                        │
//! │     wayland (anchored), x11 (fallback), headless    │
//! │            (OS surface management)                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod monitor;
pub mod platform;
pub mod renderer;
pub mod surface;

// Re-export commonly used types
pub use monitor::MonitorRegistry;
#[cfg(all(unix, not(target_os = "macos")))]
pub use platform::{NativeOverlay, get_all_monitors, probe_surface_mode};
pub use platform::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError, SurfaceMode};
pub use surface::{OverlayState, OverlaySurface, centering_offset};
