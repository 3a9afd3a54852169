//! Application loop
//!
//! Single UI thread. Input threads only send [`Command`]s; everything that
//! touches the config or the surface happens here.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use crosshair_overlay::{OverlayPlatform, OverlaySurface};
use crosshair_types::CrosshairConfig;
use tracing::{debug, info};

use crate::commands::Command;
use crate::config_store::ConfigStore;

pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub struct App<P: OverlayPlatform> {
    config: CrosshairConfig,
    store: ConfigStore,
    surface: OverlaySurface<P>,
    running: bool,
}

impl<P: OverlayPlatform> App<P> {
    pub fn new(config: CrosshairConfig, store: ConfigStore, surface: OverlaySurface<P>) -> Self {
        Self {
            config,
            store,
            surface,
            running: true,
        }
    }

    pub fn config(&self) -> &CrosshairConfig {
        &self.config
    }

    pub fn surface(&self) -> &OverlaySurface<P> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut OverlaySurface<P> {
        &mut self.surface
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Carry out one command
    pub fn dispatch(&mut self, command: Command) {
        debug!(?command, "dispatching");
        match command {
            Command::SelectMonitor(index) => {
                self.surface.select_monitor(index);
            }
            Command::RefreshMonitors => self.surface.refresh_monitors(),
            Command::ToggleVisibility => {
                self.surface.toggle_visibility();
            }
            Command::Quit => {
                self.store.save(&self.config);
                self.running = false;
            }
            _ => {
                let effects = command.apply(&mut self.config);
                if effects.persist {
                    self.store.save(&self.config);
                }
                if effects.redraw {
                    self.surface.request_redraw();
                }
            }
        }
    }

    /// One frame: pump events, drain commands, render if needed.
    /// Returns false when the loop should stop.
    pub fn tick(&mut self, commands: &Receiver<Command>) -> bool {
        if !self.surface.poll_events() {
            info!("display server connection lost");
            self.store.save(&self.config);
            self.running = false;
            return false;
        }

        while self.running {
            match commands.try_recv() {
                Ok(command) => self.dispatch(command),
                Err(TryRecvError::Empty) => break,
                // Still drawable without input sources
                Err(TryRecvError::Disconnected) => break,
            }
        }

        if !self.running {
            return false;
        }
        self.surface.render_if_needed(&self.config);
        true
    }

    /// Run until `Quit` or until the display server connection is lost
    pub fn run(mut self, commands: Receiver<Command>) {
        info!("overlay running");
        while self.tick(&commands) {
            std::thread::sleep(FRAME_INTERVAL);
        }
        info!("overlay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosshair_overlay::SurfaceMode;
    use crosshair_overlay::platform::headless::{HeadlessOverlay, monitor};
    use crosshair_types::CrosshairStyle;
    use std::sync::mpsc;

    fn app(dir: &tempfile::TempDir) -> App<HeadlessOverlay> {
        let platform = HeadlessOverlay::with_monitors(
            SurfaceMode::Fallback,
            200,
            100,
            vec![monitor("DP-1", 0, 0, 100, 100), monitor("DP-2", 100, 0, 100, 100)],
        );
        let store = ConfigStore::new(dir.path().join("crosshair.toml"));
        App::new(store.load(), store, OverlaySurface::new(platform, 0))
    }

    #[test]
    fn config_command_persists_then_redraws() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        let (tx, rx) = mpsc::channel();
        assert!(app.tick(&rx));
        let commits = app.surface().platform().commits;

        tx.send(Command::SetThickness(4.0)).unwrap();
        assert!(app.tick(&rx));

        assert_eq!(app.config().thickness, 4.0);
        assert_eq!(app.surface().platform().commits, commits + 1);
        let reloaded = ConfigStore::new(dir.path().join("crosshair.toml")).load();
        assert_eq!(reloaded.thickness, 4.0);
    }

    #[test]
    fn several_commands_in_one_tick_render_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        let (tx, rx) = mpsc::channel();
        app.tick(&rx);
        let commits = app.surface().platform().commits;

        tx.send(Command::SetStyle(1)).unwrap();
        tx.send(Command::SetSize(20.0)).unwrap();
        tx.send(Command::SetGap(2.0)).unwrap();
        app.tick(&rx);

        assert_eq!(app.surface().platform().commits, commits + 1);
        assert_eq!(app.config().style, CrosshairStyle::X);
    }

    #[test]
    fn quit_persists_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        let (tx, rx) = mpsc::channel();

        tx.send(Command::SetOffset { x: 5.0, y: -5.0 }).unwrap();
        tx.send(Command::Quit).unwrap();
        tx.send(Command::SetGap(30.0)).unwrap();
        assert!(!app.tick(&rx));
        assert!(!app.is_running());

        let saved = ConfigStore::new(dir.path().join("crosshair.toml")).load();
        assert_eq!((saved.offset.x, saved.offset.y), (5.0, -5.0));
        assert_eq!(saved.gap, CrosshairConfig::default().gap);
    }

    #[test]
    fn surface_commands_route_to_surface() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);

        app.dispatch(Command::SelectMonitor(1));
        assert_eq!(app.surface().state().selected_monitor, 1);
        assert_eq!(app.surface().centering_offset(), (50.0, 0.0));

        app.dispatch(Command::ToggleVisibility);
        assert!(!app.surface().state().visible);
        assert!(!dir.path().join("crosshair.toml").exists());
    }

    #[test]
    fn unplugged_output_reanchors_and_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let platform = HeadlessOverlay::with_monitors(
            SurfaceMode::Anchored,
            0,
            0,
            vec![monitor("DP-1", 0, 0, 64, 48), monitor("DP-2", 64, 0, 32, 32)],
        );
        let store = ConfigStore::new(dir.path().join("crosshair.toml"));
        let mut app = App::new(store.load(), store, OverlaySurface::new(platform, 1));
        let (_tx, rx) = mpsc::channel();
        assert!(app.tick(&rx));

        let platform = app.surface_mut().platform_mut();
        platform.close_surface();
        platform.set_monitors(vec![monitor("DP-1", 0, 0, 64, 48)]);

        assert!(app.tick(&rx));
        assert!(app.is_running());
        assert_eq!(app.surface().state().selected_monitor, 0);
        assert!(!app.surface().platform().is_surface_closed());
        assert_eq!(
            app.surface().platform().anchored.last().map(String::as_str),
            Some("DP-1")
        );
        assert_eq!(app.surface().platform().width(), 64);
    }

    #[test]
    fn closed_channel_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        let (tx, rx) = mpsc::channel::<Command>();
        drop(tx);
        assert!(app.tick(&rx));
    }
}
