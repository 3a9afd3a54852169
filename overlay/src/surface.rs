//! Overlay surface controller
//!
//! Owns the platform surface and the monitor registry. Keeps the surface
//! click-through, places it on the selected monitor (anchored mode) or
//! offsets the drawing onto it (fallback mode), and coalesces redraw
//! requests so the renderer runs at most once per frame.

use crosshair_types::CrosshairConfig;
use tracing::{debug, info, warn};

use crate::monitor::MonitorRegistry;
use crate::platform::{MonitorInfo, OverlayPlatform, SurfaceMode};
use crate::renderer;

/// Translation that centers a drawing on `monitor` inside a larger canvas.
///
/// Only the sizes matter: the canvas is assumed to start where the monitor
/// set starts.
pub fn centering_offset(canvas_width: u32, canvas_height: u32, monitor: &MonitorInfo) -> (f64, f64) {
    (
        (f64::from(canvas_width) - f64::from(monitor.width)) / 2.0,
        (f64::from(canvas_height) - f64::from(monitor.height)) / 2.0,
    )
}

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayState {
    pub visible: bool,
    pub selected_monitor: usize,
    pub mode: SurfaceMode,
}

pub struct OverlaySurface<P: OverlayPlatform> {
    platform: P,
    /// Fixed at construction, never re-probed
    mode: SurfaceMode,
    registry: MonitorRegistry,
    visible: bool,
    redraw_pending: bool,
}

impl<P: OverlayPlatform> OverlaySurface<P> {
    /// Take ownership of a realized platform surface and place it on monitor
    /// `initial` (or the first monitor if that index does not exist).
    pub fn new(platform: P, initial: usize) -> Self {
        let mode = platform.mode();
        let mut registry = MonitorRegistry::new(platform.get_monitors());
        if !registry.select(initial) && initial != 0 {
            warn!(index = initial, "monitor index out of range, using the first monitor");
        }

        let mut surface = Self {
            platform,
            mode,
            registry,
            visible: true,
            redraw_pending: true,
        };
        surface.platform.apply_click_through();
        surface.place_on_selected();

        info!(
            %mode,
            monitors = surface.registry.len(),
            selected = surface.registry.selected_index(),
            "overlay surface ready"
        );
        surface
    }

    fn place_on_selected(&mut self) {
        if self.mode != SurfaceMode::Anchored {
            return;
        }
        if let Some(monitor) = self.registry.geometry_of(self.registry.selected_index()) {
            self.platform.anchor_to_monitor(monitor);
        }
    }

    pub fn mode(&self) -> SurfaceMode {
        self.mode
    }

    pub fn state(&self) -> OverlayState {
        OverlayState {
            visible: self.visible,
            selected_monitor: self.registry.selected_index(),
            mode: self.mode,
        }
    }

    pub fn monitors(&self) -> &MonitorRegistry {
        &self.registry
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Offset handed to the renderer this frame
    pub fn centering_offset(&self) -> (f64, f64) {
        match (
            self.mode,
            self.registry.geometry_of(self.registry.selected_index()),
        ) {
            (SurfaceMode::Fallback, Some(monitor)) => {
                centering_offset(self.platform.width(), self.platform.height(), monitor)
            }
            _ => (0.0, 0.0),
        }
    }

    /// Switch to another monitor. Out-of-range indices are ignored.
    pub fn select_monitor(&mut self, index: usize) -> bool {
        if !self.registry.select(index) {
            return false;
        }
        if let Some(monitor) = self.registry.selected() {
            info!(index, monitor = %monitor.label, "monitor selected");
        }
        self.place_on_selected();
        self.request_redraw();
        true
    }

    /// Enumerate monitors again, replacing the previous set
    pub fn refresh_monitors(&mut self) {
        self.registry.replace(self.platform.get_monitors());
        self.place_on_selected();
        self.request_redraw();
    }

    /// Flip visibility. Returns the new state.
    pub fn toggle_visibility(&mut self) -> bool {
        self.visible = !self.visible;
        self.platform.set_visible(self.visible);
        if self.visible {
            // Showing may reset the input region
            self.platform.apply_click_through();
            self.request_redraw();
        }
        info!(visible = self.visible, "overlay visibility toggled");
        self.visible
    }

    pub fn request_redraw(&mut self) {
        self.redraw_pending = true;
    }

    pub fn redraw_pending(&self) -> bool {
        self.redraw_pending
    }

    /// Pump platform events. Monitor changes (hotplug, a closed surface)
    /// trigger a re-enumeration and re-anchor. Returns false once the
    /// display server connection is gone.
    pub fn poll_events(&mut self) -> bool {
        let alive = self.platform.poll_events();
        if self.platform.take_monitors_changed() {
            info!("monitor configuration changed");
            self.refresh_monitors();
        }
        if self.platform.take_redraw_request() {
            self.redraw_pending = true;
        }
        alive
    }

    /// Render and commit one frame if a redraw is pending and the surface is shown.
    pub fn render_if_needed(&mut self, config: &CrosshairConfig) -> bool {
        if !self.redraw_pending || !self.visible {
            return false;
        }
        self.redraw_pending = false;

        let (width, height) = (self.platform.width(), self.platform.height());
        let centering = self.centering_offset();
        let Some(buffer) = self.platform.pixel_buffer() else {
            debug!("pixel buffer not ready, skipping frame");
            return false;
        };

        if !renderer::render(buffer, width, height, config, centering) {
            warn!(width, height, "pixel buffer does not match canvas size");
            return false;
        }
        self.platform.commit();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::{HeadlessOverlay, monitor};

    fn fallback() -> OverlaySurface<HeadlessOverlay> {
        let platform = HeadlessOverlay::with_monitors(
            SurfaceMode::Fallback,
            3000,
            1080,
            vec![
                monitor("DP-1", 0, 0, 1920, 1080),
                monitor("DP-2", 1920, 0, 1080, 1080),
            ],
        );
        OverlaySurface::new(platform, 0)
    }

    fn anchored() -> OverlaySurface<HeadlessOverlay> {
        let platform = HeadlessOverlay::with_monitors(
            SurfaceMode::Anchored,
            0,
            0,
            vec![
                monitor("DP-1", 0, 0, 64, 48),
                monitor("DP-2", 64, 0, 32, 32),
            ],
        );
        OverlaySurface::new(platform, 0)
    }

    #[test]
    fn fallback_centering_for_selected_monitor() {
        let mut surface = fallback();
        assert_eq!(surface.centering_offset(), (540.0, 0.0));

        assert!(surface.select_monitor(1));
        assert_eq!(surface.centering_offset(), (960.0, 0.0));
        assert!(surface.platform().anchored.is_empty());
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let mut surface = fallback();
        surface.render_if_needed(&CrosshairConfig::default());

        assert!(!surface.select_monitor(7));
        assert_eq!(surface.state().selected_monitor, 0);
        assert!(!surface.redraw_pending());
    }

    #[test]
    fn anchored_mode_reanchors_and_never_offsets() {
        let mut surface = anchored();
        assert_eq!(surface.platform().anchored, vec!["DP-1"]);
        assert_eq!(surface.centering_offset(), (0.0, 0.0));

        surface.select_monitor(1);
        assert_eq!(surface.platform().anchored, vec!["DP-1", "DP-2"]);
        assert_eq!(surface.platform().width(), 32);
        assert_eq!(surface.centering_offset(), (0.0, 0.0));
    }

    #[test]
    fn initial_index_out_of_range_falls_back_to_first() {
        let platform = HeadlessOverlay::with_monitors(
            SurfaceMode::Anchored,
            0,
            0,
            vec![monitor("DP-1", 0, 0, 64, 48)],
        );
        let surface = OverlaySurface::new(platform, 5);
        assert_eq!(surface.state().selected_monitor, 0);
        assert_eq!(surface.platform().anchored, vec!["DP-1"]);
    }

    #[test]
    fn click_through_applied_on_realize_and_every_show() {
        let mut surface = fallback();
        assert_eq!(surface.platform().click_through_applied, 1);

        assert!(!surface.toggle_visibility());
        assert!(!surface.platform().is_visible());
        assert_eq!(surface.platform().click_through_applied, 1);

        assert!(surface.toggle_visibility());
        assert!(surface.platform().is_visible());
        assert_eq!(surface.platform().click_through_applied, 2);
        assert!(surface.redraw_pending());
    }

    #[test]
    fn hidden_surface_does_not_render() {
        let mut surface = fallback();
        surface.toggle_visibility();
        surface.request_redraw();
        assert!(!surface.render_if_needed(&CrosshairConfig::default()));
        assert_eq!(surface.platform().commits, 0);
    }

    #[test]
    fn redraw_requests_are_coalesced() {
        let mut surface = anchored();
        let config = CrosshairConfig::default();
        surface.request_redraw();
        surface.request_redraw();

        assert!(surface.render_if_needed(&config));
        assert!(!surface.render_if_needed(&config));
        assert_eq!(surface.platform().commits, 1);
    }

    #[test]
    fn platform_redraw_request_is_picked_up_by_poll() {
        let mut surface = anchored();
        surface.render_if_needed(&CrosshairConfig::default());
        assert!(!surface.redraw_pending());

        surface.platform_mut().request_redraw();
        assert!(surface.poll_events());
        assert!(surface.redraw_pending());
    }

    #[test]
    fn rendered_frame_lands_on_selected_monitor() {
        let platform = HeadlessOverlay::with_monitors(
            SurfaceMode::Fallback,
            300,
            100,
            vec![monitor("DP-1", 0, 0, 100, 100)],
        );
        let mut surface = OverlaySurface::new(platform, 0);
        let config = CrosshairConfig {
            style: crosshair_types::CrosshairStyle::Dot,
            ..CrosshairConfig::default()
        };
        assert!(surface.render_if_needed(&config));

        // Canvas center is x=150, centering shifts it by (300-100)/2
        let pixels = surface.platform().pixels();
        let alpha_at = |x: usize, y: usize| pixels[(y * 300 + x) * 4 + 3];
        assert!(alpha_at(250, 50) > 0);
        assert_eq!(alpha_at(150, 50), 0);
    }

    #[test]
    fn hotplug_is_picked_up_by_poll() {
        let mut surface = fallback();
        surface.select_monitor(1);
        assert_eq!(surface.centering_offset(), (960.0, 0.0));

        surface
            .platform_mut()
            .set_monitors(vec![monitor("DP-1", 0, 0, 1920, 1080)]);
        assert!(surface.poll_events());

        assert_eq!(surface.monitors().len(), 1);
        assert_eq!(surface.state().selected_monitor, 0);
        assert_eq!(surface.centering_offset(), (540.0, 0.0));
        assert!(surface.redraw_pending());
    }

    #[test]
    fn closed_surface_is_reanchored_on_poll() {
        let mut surface = anchored();
        surface.select_monitor(1);
        surface.platform_mut().close_surface();

        assert!(surface.poll_events());
        assert!(!surface.platform().is_surface_closed());
        assert_eq!(surface.platform().anchored.last().map(String::as_str), Some("DP-2"));
    }

    #[test]
    fn refresh_replaces_monitor_set() {
        let mut surface = anchored();
        surface.select_monitor(1);
        surface
            .platform_mut()
            .set_monitors(vec![monitor("eDP-1", 0, 0, 40, 40)]);

        surface.refresh_monitors();
        assert_eq!(surface.monitors().len(), 1);
        assert_eq!(surface.state().selected_monitor, 0);
        assert_eq!(surface.platform().anchored.last().map(String::as_str), Some("eDP-1"));
    }
}
