//! X11 platform implementation for the overlay surface
//!
//! Fallback mode: one override-redirect, 32-bit ARGB window covering the
//! whole root screen, with an empty SHAPE input region so every click goes
//! to the window below. Requires a compositing manager for transparency.

use std::fs::File;
use std::os::fd::AsFd;

use rustix::fs::{MemfdFlags, memfd_create};
use rustix::mm::{MapFlags, ProtFlags, mmap};
use tracing::{debug, info, warn};
use x11rb::atom_manager;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::shm::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::{
    MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError, SurfaceMode, monitor_label,
    rgba_to_bgra,
};

// Atoms needed for EWMH hints
atom_manager! {
    pub AtomCollection: AtomCollectionCookie {
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_WM_STATE,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_SKIP_TASKBAR,
        _NET_WM_STATE_SKIP_PAGER,
        _NET_WM_OPAQUE_REGION,
        _NET_WM_NAME,
        UTF8_STRING,
        ATOM,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Monitor Enumeration
// ─────────────────────────────────────────────────────────────────────────────

const EDID_HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
const EDID_BASE_BLOCK: usize = 128;
/// Display descriptor tag carrying the monitor name
const EDID_MONITOR_NAME: u8 = 0xFC;

/// Human-readable monitor description from an EDID base block.
///
/// Prefers the monitor name descriptor ("DELL U2720Q") and falls back to the
/// three-letter PNP manufacturer id ("DEL").
pub fn edid_description(edid: &[u8]) -> Option<String> {
    if edid.len() < EDID_BASE_BLOCK || edid[..8] != EDID_HEADER {
        return None;
    }

    let name = [54, 72, 90, 108].into_iter().find_map(|offset| {
        let descriptor = &edid[offset..offset + 18];
        if descriptor[..3] != [0, 0, 0] || descriptor[3] != EDID_MONITOR_NAME {
            return None;
        }
        let text: String = descriptor[5..]
            .iter()
            .take_while(|&&b| b != b'\n')
            .map(|&b| char::from(b))
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    });
    if name.is_some() {
        return name;
    }

    let id = u16::from_be_bytes([edid[8], edid[9]]);
    [(id >> 10) & 0x1F, (id >> 5) & 0x1F, id & 0x1F]
        .into_iter()
        .map(|code| (1..=26).contains(&code).then(|| char::from(b'A' + code as u8 - 1)))
        .collect()
}

/// EDID of the first output backing a RandR monitor
fn output_description(conn: &RustConnection, edid_atom: Atom, outputs: &[u32]) -> String {
    let Some(&output) = outputs.first() else {
        return String::new();
    };
    conn.randr_get_output_property(
        output,
        edid_atom,
        AtomEnum::ANY,
        0,
        (EDID_BASE_BLOCK / 4) as u32,
        false,
        false,
    )
    .ok()
    .and_then(|cookie| cookie.reply().ok())
    .and_then(|reply| edid_description(&reply.data))
    .unwrap_or_default()
}

fn query_monitors(conn: &RustConnection, root: Window) -> Vec<MonitorInfo> {
    let Ok(cookie) = conn.randr_get_monitors(root, true) else {
        return Vec::new();
    };
    let Ok(reply) = cookie.reply() else {
        return Vec::new();
    };
    let edid_atom = conn
        .intern_atom(true, b"EDID")
        .ok()
        .and_then(|cookie| cookie.reply().ok())
        .map(|reply| reply.atom)
        .unwrap_or(x11rb::NONE);

    reply
        .monitors
        .iter()
        .enumerate()
        .map(|(idx, mon)| {
            // RandR monitor names are the connector ("DP-1", "HDMI-A-0")
            let connector = conn
                .get_atom_name(mon.name)
                .ok()
                .and_then(|cookie| cookie.reply().ok())
                .map(|reply| String::from_utf8_lossy(&reply.name).into_owned())
                .unwrap_or_default();
            let id = if connector.is_empty() {
                format!("monitor-{idx}")
            } else {
                connector.clone()
            };
            let description = if edid_atom == x11rb::NONE {
                String::new()
            } else {
                output_description(conn, edid_atom, &mon.outputs)
            };
            MonitorInfo {
                id,
                label: monitor_label(&description, &connector),
                x: i32::from(mon.x),
                y: i32::from(mon.y),
                width: u32::from(mon.width),
                height: u32::from(mon.height),
                is_primary: mon.primary,
            }
        })
        .collect()
}

/// Get all connected monitors without creating an overlay window.
pub fn get_all_monitors() -> Vec<MonitorInfo> {
    let Ok((conn, screen_num)) = x11rb::connect(None) else {
        return Vec::new();
    };
    let root = conn.setup().roots[screen_num].root;
    query_monitors(&conn, root)
}

// ─────────────────────────────────────────────────────────────────────────────
// X11 Overlay Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// MIT-SHM segment for pixel transfer
struct ShmBuffer {
    seg_id: shm::Seg,
    ptr: *mut u8,
    size: usize,
}

impl ShmBuffer {
    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr/size come from a successful mmap that lives as long as self
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    fn release(self, conn: &RustConnection) {
        let _ = conn.shm_detach(self.seg_id);
        // SAFETY: the mapping is owned by this buffer and unmapped exactly once
        unsafe {
            rustix::mm::munmap(self.ptr.cast(), self.size).ok();
        }
    }
}

pub struct X11Overlay {
    conn: RustConnection,
    root: Window,
    window: Window,
    gc: Gcontext,
    atoms: AtomCollection,
    width: u32,
    height: u32,
    depth: u8,
    // RGBA from the renderer
    pixel_data: Vec<u8>,
    shm_buffer: Option<ShmBuffer>,
    visible: bool,
    redraw_requested: bool,
    /// Root screen was reconfigured since the last `take_monitors_changed`
    monitors_changed: bool,
    running: bool,
}

impl X11Overlay {
    /// Find a 32-bit ARGB visual for transparency
    fn find_argb_visual(screen: &Screen) -> Option<(Visualid, u8)> {
        screen
            .allowed_depths
            .iter()
            .filter(|depth| depth.depth == 32)
            .flat_map(|depth| depth.visuals.iter().map(move |v| (v, depth.depth)))
            .find(|(visual, _)| visual.class == VisualClass::TRUE_COLOR)
            .map(|(visual, depth)| (visual.visual_id, depth))
    }

    fn create_shm_buffer(
        conn: &RustConnection,
        width: u32,
        height: u32,
    ) -> Result<ShmBuffer, PlatformError> {
        let size = (width * height * 4) as usize;

        let fd = memfd_create(c"crosshair-x11-buffer", MemfdFlags::CLOEXEC)
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

        let seg_id = conn
            .generate_id()
            .map_err(|e| PlatformError::BufferError(e.to_string()))?;
        // shm_attach_fd takes ownership of the fd
        conn.shm_attach_fd(seg_id, File::from(fd), false)
            .map_err(|e| PlatformError::BufferError(format!("shm_attach_fd failed: {e}")))?;

        Ok(ShmBuffer {
            seg_id,
            ptr: ptr.cast(),
            size,
        })
    }

    /// Follow a root screen resize (monitor added, removed or rearranged)
    fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        info!(width, height, "root screen resized");
        self.width = width;
        self.height = height;

        if let Some(old) = self.shm_buffer.take() {
            old.release(&self.conn);
        }
        match Self::create_shm_buffer(&self.conn, width, height) {
            Ok(buffer) => self.shm_buffer = Some(buffer),
            Err(e) => warn!(error = %e, "failed to recreate shm buffer"),
        }
        self.pixel_data.resize((width * height * 4) as usize, 0);

        let _ = self.conn.configure_window(
            self.window,
            &ConfigureWindowAux::new().width(width).height(height),
        );
        self.apply_click_through();
        self.redraw_requested = true;
    }

    /// Set EWMH hints for overlay behavior
    fn setup_window_hints(&self, title: &str) -> Result<(), PlatformError> {
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                self.atoms._NET_WM_WINDOW_TYPE,
                self.atoms.ATOM,
                &[self.atoms._NET_WM_WINDOW_TYPE_DOCK],
            )
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                self.atoms._NET_WM_STATE,
                self.atoms.ATOM,
                &[
                    self.atoms._NET_WM_STATE_ABOVE,
                    self.atoms._NET_WM_STATE_SKIP_TASKBAR,
                    self.atoms._NET_WM_STATE_SKIP_PAGER,
                ],
            )
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        self.conn
            .change_property8(
                PropMode::REPLACE,
                self.window,
                self.atoms._NET_WM_NAME,
                self.atoms.UTF8_STRING,
                title.as_bytes(),
            )
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        Ok(())
    }
}

impl OverlayPlatform for X11Overlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;

        let atoms = AtomCollection::new(&conn)
            .map_err(|e| PlatformError::Other(e.to_string()))?
            .reply()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let width = u32::from(screen.width_in_pixels);
        let height = u32::from(screen.height_in_pixels);

        conn.shape_query_version()
            .map_err(|_| PlatformError::UnsupportedFeature("Shape extension".into()))?
            .reply()
            .map_err(|_| PlatformError::UnsupportedFeature("Shape extension".into()))?;
        conn.shm_query_version()
            .map_err(|_| PlatformError::UnsupportedFeature("SHM extension".into()))?
            .reply()
            .map_err(|_| PlatformError::UnsupportedFeature("SHM extension".into()))?;

        let (visual, depth) = Self::find_argb_visual(screen)
            .ok_or_else(|| PlatformError::UnsupportedFeature("32-bit ARGB visual".into()))?;

        let colormap = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, root, visual)
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        // Root resizes arrive as ConfigureNotify on the root window
        conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
        )
        .map_err(|e| PlatformError::Other(e.to_string()))?;

        let window = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        let win_aux = CreateWindowAux::new()
            .background_pixel(0)
            .border_pixel(0)
            .colormap(colormap)
            .event_mask(EventMask::EXPOSURE | EventMask::STRUCTURE_NOTIFY)
            .override_redirect(1);

        conn.create_window(
            depth,
            window,
            root,
            0,
            0,
            width as u16,
            height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &win_aux,
        )
        .map_err(|e| PlatformError::Other(e.to_string()))?;

        let gc = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        conn.create_gc(gc, window, &CreateGCAux::new())
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let shm_buffer = Self::create_shm_buffer(&conn, width, height)?;

        let mut overlay = Self {
            conn,
            root,
            window,
            gc,
            atoms,
            width,
            height,
            depth,
            pixel_data: vec![0u8; (width * height * 4) as usize],
            shm_buffer: Some(shm_buffer),
            visible: true,
            redraw_requested: true,
            monitors_changed: false,
            running: true,
        };

        overlay.setup_window_hints(&config.namespace)?;
        overlay
            .conn
            .map_window(window)
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        overlay.apply_click_through();

        info!(width, height, "x11 overlay window mapped");
        Ok(overlay)
    }

    fn mode(&self) -> SurfaceMode {
        SurfaceMode::Fallback
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn get_monitors(&self) -> Vec<MonitorInfo> {
        query_monitors(&self.conn, self.root)
    }

    fn anchor_to_monitor(&mut self, monitor: &MonitorInfo) {
        // The window spans the root screen; the renderer offsets instead
        debug!(monitor = %monitor.id, "x11 overlay does not re-anchor");
    }

    fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        let result = if visible {
            self.conn.map_window(self.window)
        } else {
            self.conn.unmap_window(self.window)
        };
        if let Err(e) = result {
            warn!(error = %e, visible, "failed to change window visibility");
        }
        let _ = self.conn.flush();
    }

    fn apply_click_through(&mut self) {
        // Empty input region - clicks pass through
        let _ = self.conn.shape_rectangles(
            shape::SO::SET,
            shape::SK::INPUT,
            ClipOrdering::UNSORTED,
            self.window,
            0,
            0,
            &[],
        );
        let _ = self
            .conn
            .delete_property(self.window, self.atoms._NET_WM_OPAQUE_REGION);
        let _ = self.conn.flush();
    }

    fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }

    fn take_monitors_changed(&mut self) -> bool {
        std::mem::take(&mut self.monitors_changed)
    }

    fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
        if self.pixel_data.is_empty() {
            None
        } else {
            Some(&mut self.pixel_data)
        }
    }

    fn commit(&mut self) {
        if !self.visible {
            return;
        }
        let Some(shm) = &mut self.shm_buffer else {
            return;
        };
        rgba_to_bgra(&self.pixel_data, shm.as_mut_slice());

        let _ = self.conn.shm_put_image(
            self.window,
            self.gc,
            self.width as u16,
            self.height as u16,
            0,
            0,
            self.width as u16,
            self.height as u16,
            0,
            0,
            self.depth,
            ImageFormat::Z_PIXMAP.into(),
            false,
            shm.seg_id,
            0,
        );
        let _ = self.conn.flush();
    }

    fn poll_events(&mut self) -> bool {
        loop {
            let event = match self.conn.poll_for_event() {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "x11 connection lost");
                    self.running = false;
                    break;
                }
            };

            match event {
                Event::Expose(e) if e.window == self.window && e.count == 0 => {
                    self.redraw_requested = true;
                }
                Event::MapNotify(e) if e.window == self.window => {
                    self.redraw_requested = true;
                }
                Event::ConfigureNotify(e) if e.window == self.root => {
                    // Monitors may move without the root size changing
                    self.resize(u32::from(e.width), u32::from(e.height));
                    self.monitors_changed = true;
                }
                Event::DestroyNotify(e) if e.window == self.window => {
                    self.running = false;
                }
                _ => {}
            }
        }
        self.running
    }
}

impl Drop for X11Overlay {
    fn drop(&mut self) {
        if let Some(shm) = self.shm_buffer.take() {
            shm.release(&self.conn);
        }
        let _ = self.conn.destroy_window(self.window);
        let _ = self.conn.free_gc(self.gc);
        let _ = self.conn.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edid_with(descriptor: Option<&[u8]>) -> Vec<u8> {
        let mut edid = vec![0u8; EDID_BASE_BLOCK];
        edid[..8].copy_from_slice(&EDID_HEADER);
        // "DEL": D=4, E=5, L=12
        let id: u16 = (4 << 10) | (5 << 5) | 12;
        edid[8..10].copy_from_slice(&id.to_be_bytes());
        if let Some(text) = descriptor {
            edid[72..77].copy_from_slice(&[0, 0, 0, EDID_MONITOR_NAME, 0]);
            let mut field = [b' '; 13];
            field[..text.len()].copy_from_slice(text);
            if text.len() < 13 {
                field[text.len()] = b'\n';
            }
            edid[77..90].copy_from_slice(&field);
        }
        edid
    }

    #[test]
    fn edid_monitor_name_descriptor_wins() {
        let edid = edid_with(Some(b"DELL U2720Q"));
        assert_eq!(edid_description(&edid).as_deref(), Some("DELL U2720Q"));
    }

    #[test]
    fn edid_without_name_uses_manufacturer_id() {
        assert_eq!(edid_description(&edid_with(None)).as_deref(), Some("DEL"));
    }

    #[test]
    fn truncated_or_foreign_data_has_no_description() {
        assert_eq!(edid_description(&[0u8; 16]), None);
        let mut edid = edid_with(Some(b"X"));
        edid[0] = 0x12;
        assert_eq!(edid_description(&edid), None);
    }
}
