//! Wayland platform implementation using the layer-shell protocol
//!
//! The crosshair lives on a `zwlr_layer_shell_v1` surface in the Overlay
//! layer, anchored to all four edges of one output with no exclusive zone,
//! no keyboard interactivity and an empty input region. The compositor
//! sizes the surface to the output, so no centering math is needed here.

use std::os::fd::AsFd;

use rustix::fs::{MemfdFlags, memfd_create};
use rustix::mm::{MapFlags, ProtFlags, mmap};
use tracing::{debug, info, warn};
use wayland_client::globals::{GlobalListContents, registry_queue_init};
use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_output::{self, WlOutput};
use wayland_client::protocol::wl_region::WlRegion;
use wayland_client::protocol::wl_registry;
use wayland_client::protocol::wl_shm::{Format, WlShm};
use wayland_client::protocol::wl_shm_pool::WlShmPool;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_protocols::xdg::xdg_output::zv1::client::{
    zxdg_output_manager_v1::ZxdgOutputManagerV1,
    zxdg_output_v1::{self, ZxdgOutputV1},
};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::{Layer, ZwlrLayerShellV1},
    zwlr_layer_surface_v1::{self, Anchor, KeyboardInteractivity, ZwlrLayerSurfaceV1},
};

use super::{
    MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError, SurfaceMode, monitor_label,
    rgba_to_bgra,
};

/// Macro to implement empty Dispatch for protocols that don't need event handling
macro_rules! impl_empty_dispatch {
    ($proxy:ty, $data:ty, $state:ty) => {
        impl Dispatch<$proxy, $data> for $state {
            fn event(
                _: &mut Self,
                _: &$proxy,
                _: <$proxy as Proxy>::Event,
                _: &$data,
                _: &Connection,
                _: &QueueHandle<Self>,
            ) {
            }
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Output Tracking
// ─────────────────────────────────────────────────────────────────────────────

/// Partial output info (built up from events before done)
#[derive(Debug, Clone, Default)]
struct OutputInfo {
    /// Global name from the registry
    name: u32,
    /// Connector name (e.g., "HDMI-A-1", "eDP-2")
    connector_name: String,
    /// Human-readable description, usually make and model
    description: String,
    /// Position in global coordinate space (from xdg-output if available, else wl_output)
    x: i32,
    y: i32,
    physical_width: i32,
    physical_height: i32,
    /// Logical dimensions from xdg-output (more accurate than physical/scale)
    xdg_logical_width: i32,
    xdg_logical_height: i32,
    scale: i32,
    wl_done: bool,
    /// Whether xdg_output info is complete (or xdg-output is not in use)
    xdg_done: bool,
}

impl OutputInfo {
    fn new(name: u32) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    fn is_ready(&self) -> bool {
        self.wl_done && self.xdg_done && self.logical_width() > 0 && self.logical_height() > 0
    }

    /// Stable handle used for re-anchoring: the connector name when known
    fn id(&self) -> String {
        if self.connector_name.is_empty() {
            format!("output-{}", self.name)
        } else {
            self.connector_name.clone()
        }
    }

    fn logical_width(&self) -> i32 {
        if self.xdg_logical_width > 0 {
            self.xdg_logical_width
        } else if self.scale > 0 {
            self.physical_width / self.scale
        } else {
            self.physical_width
        }
    }

    fn logical_height(&self) -> i32 {
        if self.xdg_logical_height > 0 {
            self.xdg_logical_height
        } else if self.scale > 0 {
            self.physical_height / self.scale
        } else {
            self.physical_height
        }
    }

    fn to_monitor(&self) -> MonitorInfo {
        MonitorInfo {
            id: self.id(),
            label: monitor_label(&self.description, &self.connector_name),
            x: self.x,
            y: self.y,
            width: self.logical_width() as u32,
            height: self.logical_height() as u32,
            is_primary: self.x == 0 && self.y == 0,
        }
    }

    fn apply_output_event(&mut self, event: wl_output::Event) {
        match event {
            wl_output::Event::Geometry { x, y, .. } => {
                // xdg-output position wins when present
                if self.xdg_logical_width == 0 {
                    self.x = x;
                    self.y = y;
                }
            }
            wl_output::Event::Mode {
                flags,
                width,
                height,
                ..
            } => {
                if let wayland_client::WEnum::Value(mode_flags) = flags
                    && mode_flags.contains(wl_output::Mode::Current)
                {
                    self.physical_width = width;
                    self.physical_height = height;
                }
            }
            wl_output::Event::Scale { factor } => {
                self.scale = factor;
            }
            wl_output::Event::Name { name } => {
                self.connector_name = name;
            }
            wl_output::Event::Description { description } => {
                if self.description.is_empty() {
                    self.description = description;
                }
            }
            wl_output::Event::Done => {
                if self.scale == 0 {
                    self.scale = 1;
                }
                self.wl_done = true;
                // xdg-output v3 folds its done into wl_output.done
                if self.xdg_logical_width > 0 {
                    self.xdg_done = true;
                }
            }
            _ => {}
        }
    }

    fn apply_xdg_event(&mut self, event: zxdg_output_v1::Event) {
        match event {
            zxdg_output_v1::Event::LogicalPosition { x, y } => {
                self.x = x;
                self.y = y;
            }
            zxdg_output_v1::Event::LogicalSize { width, height } => {
                self.xdg_logical_width = width;
                self.xdg_logical_height = height;
            }
            zxdg_output_v1::Event::Name { name } => {
                if !name.is_empty() {
                    self.connector_name = name;
                }
            }
            zxdg_output_v1::Event::Description { description } => {
                self.description = description;
            }
            zxdg_output_v1::Event::Done => {
                self.xdg_done = true;
            }
            _ => {}
        }
    }
}

/// A bound `wl_output` together with its xdg-output and collected info
struct TrackedOutput {
    output: WlOutput,
    xdg_output: Option<ZxdgOutputV1>,
    info: OutputInfo,
}

impl TrackedOutput {
    fn bind<D>(
        registry: &wl_registry::WlRegistry,
        name: u32,
        version: u32,
        xdg_manager: Option<&ZxdgOutputManagerV1>,
        qh: &QueueHandle<D>,
    ) -> Self
    where
        D: Dispatch<WlOutput, u32> + Dispatch<ZxdgOutputV1, u32> + 'static,
    {
        let output: WlOutput = registry.bind(name, version.min(4), qh, name);
        let xdg_output = xdg_manager.map(|manager| manager.get_xdg_output(&output, qh, name));
        let mut info = OutputInfo::new(name);
        // Without xdg-output there is nothing more to wait for
        info.xdg_done = xdg_output.is_none();
        Self {
            output,
            xdg_output,
            info,
        }
    }

    fn release(self) {
        if let Some(xdg_output) = self.xdg_output {
            xdg_output.destroy();
        }
        if self.output.version() >= 3 {
            self.output.release();
        }
    }
}

fn ready_monitors(outputs: &[TrackedOutput]) -> Vec<MonitorInfo> {
    outputs
        .iter()
        .filter(|tracked| tracked.info.is_ready())
        .map(|tracked| tracked.info.to_monitor())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Capability Probe and Standalone Monitor Enumeration
// ─────────────────────────────────────────────────────────────────────────────

struct ProbeState;

impl_empty_dispatch!(wl_registry::WlRegistry, GlobalListContents, ProbeState);

/// Whether a Wayland compositor is reachable and advertises wlr-layer-shell
pub fn layer_shell_available() -> bool {
    let Ok(connection) = Connection::connect_to_env() else {
        return false;
    };
    let Ok((globals, _queue)) = registry_queue_init::<ProbeState>(&connection) else {
        return false;
    };
    globals.contents().with_list(|list| {
        list.iter()
            .any(|global| global.interface == "zwlr_layer_shell_v1")
    })
}

/// Minimal state for standalone monitor enumeration
struct MonitorEnumState {
    outputs: Vec<TrackedOutput>,
}

impl MonitorEnumState {
    fn info_mut(&mut self, name: u32) -> Option<&mut OutputInfo> {
        self.outputs
            .iter_mut()
            .find(|tracked| tracked.info.name == name)
            .map(|tracked| &mut tracked.info)
    }
}

impl_empty_dispatch!(wl_registry::WlRegistry, GlobalListContents, MonitorEnumState);
impl_empty_dispatch!(ZxdgOutputManagerV1, (), MonitorEnumState);

impl Dispatch<WlOutput, u32> for MonitorEnumState {
    fn event(
        state: &mut Self,
        _proxy: &WlOutput,
        event: wl_output::Event,
        name: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let Some(info) = state.info_mut(*name) {
            info.apply_output_event(event);
        }
    }
}

impl Dispatch<ZxdgOutputV1, u32> for MonitorEnumState {
    fn event(
        state: &mut Self,
        _proxy: &ZxdgOutputV1,
        event: zxdg_output_v1::Event,
        name: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let Some(info) = state.info_mut(*name) {
            info.apply_xdg_event(event);
        }
    }
}

/// Get all connected monitors without creating an overlay surface.
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    let Ok(connection) = Connection::connect_to_env() else {
        return Vec::new();
    };
    let Ok((globals, mut event_queue)) = registry_queue_init::<MonitorEnumState>(&connection)
    else {
        return Vec::new();
    };
    let qh = event_queue.handle();

    let xdg_manager = globals
        .bind::<ZxdgOutputManagerV1, _, _>(&qh, 1..=3, ())
        .ok();

    let mut state = MonitorEnumState {
        outputs: Vec::new(),
    };
    for global in globals.contents().clone_list() {
        if global.interface == "wl_output" {
            state.outputs.push(TrackedOutput::bind(
                globals.registry(),
                global.name,
                global.version,
                xdg_manager.as_ref(),
                &qh,
            ));
        }
    }

    // wl_output info, then xdg_output info and done events
    for _ in 0..3 {
        if event_queue.roundtrip(&mut state).is_err() {
            break;
        }
    }

    ready_monitors(&state.outputs)
}

// ─────────────────────────────────────────────────────────────────────────────
// Wayland Overlay Implementation
// ─────────────────────────────────────────────────────────────────────────────

struct ShmBuffer {
    ptr: *mut u8,
    size: usize,
}

impl ShmBuffer {
    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr/size come from a successful mmap that lives as long as self
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        // SAFETY: the mapping is owned by this buffer and unmapped exactly once
        unsafe {
            rustix::mm::munmap(self.ptr.cast(), self.size).ok();
        }
    }
}

/// Internal state for Wayland event handling
struct WaylandState {
    configured: bool,
    /// Compositor sent `closed` for the current layer surface
    surface_closed: bool,
    /// Outputs were added, removed or reconfigured
    monitors_changed: bool,
    width: u32,
    height: u32,
    /// Canvas size changed; shm buffer must be recreated
    buffer_stale: bool,
    redraw_requested: bool,

    compositor: WlCompositor,
    layer_shell: ZwlrLayerShellV1,
    shm: WlShm,
    xdg_output_manager: Option<ZxdgOutputManagerV1>,
    surface: Option<WlSurface>,
    layer_surface: Option<ZwlrLayerSurfaceV1>,
    buffer: Option<WlBuffer>,

    outputs: Vec<TrackedOutput>,

    // RGBA from the renderer, converted to ARGB8888 on commit
    pixel_data: Vec<u8>,
    shm_data: Option<ShmBuffer>,
}

impl WaylandState {
    fn info_mut(&mut self, name: u32) -> Option<&mut OutputInfo> {
        self.outputs
            .iter_mut()
            .find(|tracked| tracked.info.name == name)
            .map(|tracked| &mut tracked.info)
    }

    fn create_shm_buffer(&mut self, qh: &QueueHandle<WaylandState>) -> Result<(), PlatformError> {
        // Clean up old buffer first
        if let Some(old_buffer) = self.buffer.take() {
            old_buffer.destroy();
        }
        self.shm_data = None;
        self.buffer_stale = false;

        self.pixel_data
            .resize((self.width * self.height * 4) as usize, 0);
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }

        let stride = self.width * 4;
        let size = (stride * self.height) as usize;

        let fd = memfd_create(c"crosshair-buffer", MemfdFlags::CLOEXEC)
            .map_err(|e| PlatformError::BufferError(format!("memfd_create failed: {e}")))?;
        rustix::fs::ftruncate(&fd, size as u64)
            .map_err(|e| PlatformError::BufferError(format!("ftruncate failed: {e}")))?;

        // SAFETY: fresh shared mapping of a memfd we just sized
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd.as_fd(),
                0,
            )
            .map_err(|e| PlatformError::BufferError(format!("mmap failed: {e}")))?
        };
        self.shm_data = Some(ShmBuffer {
            ptr: ptr.cast(),
            size,
        });

        let pool = self.shm.create_pool(fd.as_fd(), size as i32, qh, ());
        self.buffer = Some(pool.create_buffer(
            0,
            self.width as i32,
            self.height as i32,
            stride as i32,
            Format::Argb8888,
            qh,
            (),
        ));
        // The buffer keeps the memory alive
        pool.destroy();

        debug!(width = self.width, height = self.height, "shm buffer created");
        Ok(())
    }

    fn copy_pixels_to_shm(&mut self) {
        if let Some(shm) = &mut self.shm_data {
            rgba_to_bgra(&self.pixel_data, shm.as_mut_slice());
        }
    }

    fn commit_frame(&self) {
        if let (Some(surface), Some(buffer)) = (&self.surface, &self.buffer) {
            surface.attach(Some(buffer), 0, 0);
            surface.damage_buffer(0, 0, self.width as i32, self.height as i32);
            surface.commit();
        }
    }

    fn apply_click_through(&self, qh: &QueueHandle<WaylandState>) {
        let Some(surface) = &self.surface else {
            return;
        };
        let region = self.compositor.create_region(qh, ());
        surface.set_input_region(Some(&region));
        region.destroy();
        surface.set_opaque_region(None);
        surface.commit();
    }
}

/// Wayland overlay implementation
pub struct WaylandOverlay {
    config: OverlayConfig,
    connection: Connection,
    event_queue: EventQueue<WaylandState>,
    state: WaylandState,
    qh: QueueHandle<WaylandState>,
    /// Global name of the output the surface is (or will be) anchored to
    bound_output: Option<u32>,
    visible: bool,
}

impl WaylandOverlay {
    fn output_by_name(&self, name: u32) -> Option<WlOutput> {
        self.state
            .outputs
            .iter()
            .find(|tracked| tracked.info.name == name)
            .map(|tracked| tracked.output.clone())
    }

    /// Create the layer surface on the bound output and wait for its first configure
    fn create_layer_surface(&mut self) -> Result<(), PlatformError> {
        let output = self.bound_output.and_then(|name| self.output_by_name(name));

        let surface = self.state.compositor.create_surface(&self.qh, ());
        let layer_surface = self.state.layer_shell.get_layer_surface(
            &surface,
            output.as_ref(),
            Layer::Overlay,
            self.config.namespace.clone(),
            &self.qh,
            (),
        );

        // Pinned to every edge at size 0x0: the compositor fills the output
        layer_surface.set_anchor(Anchor::Top | Anchor::Bottom | Anchor::Left | Anchor::Right);
        layer_surface.set_size(0, 0);
        layer_surface.set_exclusive_zone(0);
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);

        self.state.surface = Some(surface);
        self.state.layer_surface = Some(layer_surface);
        self.state.configured = false;
        self.state.apply_click_through(&self.qh);

        // The layer-shell protocol requires waiting for the initial configure
        self.state.surface_closed = false;
        while !self.state.configured && !self.state.surface_closed {
            self.event_queue
                .blocking_dispatch(&mut self.state)
                .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;
        }
        if self.state.surface_closed {
            // Output is gone or powered off; wait for the next output change
            self.state.surface_closed = false;
            self.destroy_layer_surface();
            return Err(PlatformError::Other(
                "layer surface closed before first configure".to_string(),
            ));
        }

        self.ensure_buffer();
        self.state.redraw_requested = true;
        Ok(())
    }

    fn destroy_layer_surface(&mut self) {
        if let Some(layer_surface) = self.state.layer_surface.take() {
            layer_surface.destroy();
        }
        if let Some(surface) = self.state.surface.take() {
            surface.destroy();
        }
        self.state.configured = false;
        let _ = self.connection.flush();
    }

    /// The compositor closed the surface, usually because its output went
    /// away. Drop it and let the controller re-enumerate and re-anchor.
    fn handle_surface_closed(&mut self) {
        self.state.surface_closed = false;
        info!("layer surface closed by compositor, waiting to re-anchor");
        self.destroy_layer_surface();
        self.bound_output = None;
        self.state.monitors_changed = true;
    }

    fn ensure_buffer(&mut self) {
        if self.state.buffer_stale
            && let Err(e) = self.state.create_shm_buffer(&self.qh)
        {
            warn!(error = %e, "failed to recreate shm buffer");
        }
    }
}

impl OverlayPlatform for WaylandOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let connection = Connection::connect_to_env()
            .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;

        let (globals, mut event_queue) = registry_queue_init::<WaylandState>(&connection)
            .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;
        let qh = event_queue.handle();

        let compositor: WlCompositor = globals
            .bind(&qh, 4..=6, ())
            .map_err(|_| PlatformError::UnsupportedFeature("wl_compositor".to_string()))?;
        let layer_shell: ZwlrLayerShellV1 = globals
            .bind(&qh, 1..=4, ())
            .map_err(|_| PlatformError::UnsupportedFeature("zwlr_layer_shell_v1".to_string()))?;
        let shm: WlShm = globals
            .bind(&qh, 1..=1, ())
            .map_err(|_| PlatformError::UnsupportedFeature("wl_shm".to_string()))?;
        // Optional: accurate logical positions and descriptions
        let xdg_output_manager = globals
            .bind::<ZxdgOutputManagerV1, _, _>(&qh, 1..=3, ())
            .ok();

        let mut state = WaylandState {
            configured: false,
            surface_closed: false,
            monitors_changed: false,
            width: 0,
            height: 0,
            buffer_stale: false,
            redraw_requested: false,
            compositor,
            layer_shell,
            shm,
            xdg_output_manager,
            surface: None,
            layer_surface: None,
            buffer: None,
            outputs: Vec::new(),
            pixel_data: Vec::new(),
            shm_data: None,
        };

        for global in globals.contents().clone_list() {
            if global.interface == "wl_output" {
                let tracked = TrackedOutput::bind(
                    globals.registry(),
                    global.name,
                    global.version,
                    state.xdg_output_manager.as_ref(),
                    &qh,
                );
                state.outputs.push(tracked);
            }
        }

        // wl_output info, then xdg_output info and done events
        for _ in 0..3 {
            event_queue
                .roundtrip(&mut state)
                .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;
        }

        for tracked in &state.outputs {
            debug!(
                id = %tracked.info.id(),
                x = tracked.info.x,
                y = tracked.info.y,
                width = tracked.info.logical_width(),
                height = tracked.info.logical_height(),
                ready = tracked.info.is_ready(),
                "wayland output"
            );
        }

        let bound_output = config.target_monitor_id.as_ref().and_then(|target| {
            let found = state
                .outputs
                .iter()
                .find(|tracked| tracked.info.is_ready() && tracked.info.id() == *target)
                .map(|tracked| tracked.info.name);
            if found.is_none() {
                warn!(monitor = %target, "requested output not found, compositor will choose");
            }
            found
        });

        let mut overlay = Self {
            config,
            connection,
            event_queue,
            state,
            qh,
            bound_output,
            visible: true,
        };
        overlay.create_layer_surface()?;
        // Startup output events are already reflected in the first enumeration
        overlay.state.monitors_changed = false;

        info!(
            width = overlay.state.width,
            height = overlay.state.height,
            "layer surface configured"
        );
        Ok(overlay)
    }

    fn mode(&self) -> SurfaceMode {
        SurfaceMode::Anchored
    }

    fn width(&self) -> u32 {
        self.state.width
    }

    fn height(&self) -> u32 {
        self.state.height
    }

    fn get_monitors(&self) -> Vec<MonitorInfo> {
        ready_monitors(&self.state.outputs)
    }

    fn anchor_to_monitor(&mut self, monitor: &MonitorInfo) {
        let Some(name) = self
            .state
            .outputs
            .iter()
            .find(|tracked| tracked.info.id() == monitor.id)
            .map(|tracked| tracked.info.name)
        else {
            warn!(monitor = %monitor.id, "cannot anchor: output not found");
            return;
        };

        if self.bound_output == Some(name) && self.state.layer_surface.is_some() {
            return;
        }
        self.bound_output = Some(name);

        // A layer surface cannot change output; hidden surfaces pick it up on show
        if self.visible {
            info!(monitor = %monitor.label, "re-anchoring layer surface");
            self.destroy_layer_surface();
            if let Err(e) = self.create_layer_surface() {
                warn!(error = %e, "failed to recreate layer surface");
            }
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        if visible {
            if let Err(e) = self.create_layer_surface() {
                warn!(error = %e, "failed to show layer surface");
            }
        } else {
            self.destroy_layer_surface();
        }
    }

    fn apply_click_through(&mut self) {
        self.state.apply_click_through(&self.qh);
        let _ = self.connection.flush();
    }

    fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.state.redraw_requested)
    }

    fn take_monitors_changed(&mut self) -> bool {
        std::mem::take(&mut self.state.monitors_changed)
    }

    fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
        if self.state.pixel_data.is_empty() {
            None
        } else {
            Some(&mut self.state.pixel_data)
        }
    }

    fn commit(&mut self) {
        if !self.visible || !self.state.configured {
            return;
        }
        self.state.copy_pixels_to_shm();
        self.state.commit_frame();
        let _ = self.connection.flush();
    }

    fn poll_events(&mut self) -> bool {
        // Flush outgoing requests first
        if self.connection.flush().is_err() {
            return false;
        }

        loop {
            if let Some(guard) = self.event_queue.prepare_read() {
                match guard.read() {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(_) => break, // would block
                }
            }

            match self.event_queue.dispatch_pending(&mut self.state) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "wayland dispatch failed");
                    return false;
                }
            }
        }

        if self.state.surface_closed {
            self.handle_surface_closed();
        }
        self.ensure_buffer();
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch implementations
// ─────────────────────────────────────────────────────────────────────────────

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        // Hotplug: keep the output list current so a refresh sees it
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } if interface == "wl_output" => {
                debug!(name, "output added");
                let tracked = TrackedOutput::bind(
                    registry,
                    name,
                    version,
                    state.xdg_output_manager.as_ref(),
                    qh,
                );
                // Reported once its first `done` arrives
                state.outputs.push(tracked);
            }
            wl_registry::Event::GlobalRemove { name } => {
                if let Some(pos) = state
                    .outputs
                    .iter()
                    .position(|tracked| tracked.info.name == name)
                {
                    debug!(name, "output removed");
                    state.outputs.remove(pos).release();
                    state.monitors_changed = true;
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlOutput, u32> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &WlOutput,
        event: wl_output::Event,
        name: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let done = matches!(event, wl_output::Event::Done);
        if let Some(info) = state.info_mut(*name) {
            info.apply_output_event(event);
            if done {
                state.monitors_changed = true;
            }
        }
    }
}

impl Dispatch<ZxdgOutputV1, u32> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &ZxdgOutputV1,
        event: zxdg_output_v1::Event,
        name: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let Some(info) = state.info_mut(*name) {
            info.apply_xdg_event(event);
        }
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        proxy: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure {
                serial,
                width,
                height,
            } => {
                proxy.ack_configure(serial);
                if width > 0 && height > 0 && (width != state.width || height != state.height) {
                    state.width = width;
                    state.height = height;
                    state.buffer_stale = true;
                }
                state.configured = true;
                state.redraw_requested = true;
            }
            zwlr_layer_surface_v1::Event::Closed => {
                debug!("layer surface closed");
                state.surface_closed = true;
            }
            _ => {}
        }
    }
}

impl_empty_dispatch!(WlCompositor, (), WaylandState);
impl_empty_dispatch!(WlSurface, (), WaylandState);
impl_empty_dispatch!(WlRegion, (), WaylandState);
impl_empty_dispatch!(WlShm, (), WaylandState);
impl_empty_dispatch!(WlShmPool, (), WaylandState);
impl_empty_dispatch!(WlBuffer, (), WaylandState);
impl_empty_dispatch!(ZwlrLayerShellV1, (), WaylandState);
impl_empty_dispatch!(ZxdgOutputManagerV1, (), WaylandState);

#[cfg(test)]
mod tests {
    use super::*;

    fn output(connector: &str, description: &str) -> OutputInfo {
        OutputInfo {
            name: 7,
            connector_name: connector.to_string(),
            description: description.to_string(),
            physical_width: 3840,
            physical_height: 2160,
            scale: 2,
            wl_done: true,
            xdg_done: true,
            ..Default::default()
        }
    }

    #[test]
    fn logical_size_prefers_xdg_then_scale() {
        let mut info = output("DP-1", "");
        assert_eq!((info.logical_width(), info.logical_height()), (1920, 1080));

        info.xdg_logical_width = 2560;
        info.xdg_logical_height = 1440;
        assert_eq!((info.logical_width(), info.logical_height()), (2560, 1440));
    }

    #[test]
    fn monitor_uses_connector_as_id_and_combined_label() {
        let monitor = output("HDMI-A-1", "Dell U2720Q").to_monitor();
        assert_eq!(monitor.id, "HDMI-A-1");
        assert_eq!(monitor.label, "Dell U2720Q - HDMI-A-1");

        let anonymous = output("", "").to_monitor();
        assert_eq!(anonymous.id, "output-7");
        assert_eq!(anonymous.label, "Monitor");
    }

    #[test]
    fn output_without_size_is_not_ready() {
        let mut info = output("DP-1", "");
        info.physical_width = 0;
        assert!(!info.is_ready());
    }

    #[test]
    fn done_defaults_scale_and_completes_xdg() {
        let mut info = OutputInfo::new(3);
        info.xdg_logical_width = 1920;
        info.apply_output_event(wl_output::Event::Done);
        assert_eq!(info.scale, 1);
        assert!(info.wl_done);
        assert!(info.xdg_done);
    }
}
