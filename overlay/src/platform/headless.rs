//! In-memory platform backend
//!
//! Holds a pixel buffer and a fixed monitor list, and records what the
//! controller asked of it. Used to exercise the surface controller and the
//! application dispatcher without a display server.

use super::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError, SurfaceMode};

#[derive(Debug)]
pub struct HeadlessOverlay {
    mode: SurfaceMode,
    width: u32,
    height: u32,
    monitors: Vec<MonitorInfo>,
    pixels: Vec<u8>,
    visible: bool,
    redraw_requested: bool,
    monitors_changed: bool,
    surface_closed: bool,
    /// Monitor ids passed to `anchor_to_monitor`, in order
    pub anchored: Vec<String>,
    /// Number of `apply_click_through` calls
    pub click_through_applied: usize,
    /// Number of frames committed
    pub commits: usize,
}

impl HeadlessOverlay {
    pub fn with_monitors(
        mode: SurfaceMode,
        width: u32,
        height: u32,
        monitors: Vec<MonitorInfo>,
    ) -> Self {
        Self {
            mode,
            width,
            height,
            monitors,
            pixels: vec![0; (width * height * 4) as usize],
            visible: true,
            redraw_requested: false,
            monitors_changed: false,
            surface_closed: false,
            anchored: Vec::new(),
            click_through_applied: 0,
            commits: 0,
        }
    }

    /// Replace the monitor list, as if displays were hotplugged
    pub fn set_monitors(&mut self, monitors: Vec<MonitorInfo>) {
        self.monitors = monitors;
        self.monitors_changed = true;
    }

    /// Simulate the compositor closing the surface (its output was unplugged
    /// or powered off). The surface is gone until the next anchor.
    pub fn close_surface(&mut self) {
        self.surface_closed = true;
        self.monitors_changed = true;
    }

    /// Whether the surface is closed and not re-anchored yet
    pub fn is_surface_closed(&self) -> bool {
        self.surface_closed
    }

    /// Simulate an expose/configure from the display server
    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Convenience constructor for a monitor rectangle
pub fn monitor(id: &str, x: i32, y: i32, width: u32, height: u32) -> MonitorInfo {
    MonitorInfo {
        id: id.to_string(),
        label: id.to_string(),
        x,
        y,
        width,
        height,
        is_primary: x == 0 && y == 0,
    }
}

impl OverlayPlatform for HeadlessOverlay {
    fn new(_config: OverlayConfig) -> Result<Self, PlatformError> {
        Ok(Self::with_monitors(
            SurfaceMode::Fallback,
            1920,
            1080,
            vec![monitor("HEADLESS-1", 0, 0, 1920, 1080)],
        ))
    }

    fn mode(&self) -> SurfaceMode {
        self.mode
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn get_monitors(&self) -> Vec<MonitorInfo> {
        self.monitors.clone()
    }

    fn anchor_to_monitor(&mut self, monitor: &MonitorInfo) {
        self.anchored.push(monitor.id.clone());
        self.surface_closed = false;
        if self.mode == SurfaceMode::Anchored {
            // The compositor sizes an anchored surface to its output
            self.width = monitor.width;
            self.height = monitor.height;
            self.pixels = vec![0; (self.width * self.height * 4) as usize];
            self.redraw_requested = true;
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn apply_click_through(&mut self) {
        self.click_through_applied += 1;
    }

    fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }

    fn take_monitors_changed(&mut self) -> bool {
        std::mem::take(&mut self.monitors_changed)
    }

    fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
        if self.pixels.is_empty() {
            None
        } else {
            Some(&mut self.pixels)
        }
    }

    fn commit(&mut self) {
        self.commits += 1;
    }

    fn poll_events(&mut self) -> bool {
        true
    }
}
