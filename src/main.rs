use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Sender};

use clap::{Parser, Subcommand, ValueEnum};
use crosshair::app::App;
use crosshair::commands::Command;
use crosshair::config_store::ConfigStore;
use crosshair::control::{self, ControlResponse, ControlServer};
use crosshair::logging;
use crosshair_overlay::renderer::render_to_pixmap;
use crosshair_overlay::{
    NativeOverlay, OverlayConfig, OverlaySurface, get_all_monitors, probe_surface_mode,
};
use crosshair_types::Rgba;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(version, about = "Click-through crosshair overlay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Monitor index to start on (see `crosshair monitors`)
    #[arg(short, long)]
    monitor: Option<usize>,

    /// Configuration file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the overlay (default)
    Run(RunArgs),
    /// List displays with their index
    Monitors,
    /// Render the current configuration into a PNG file
    Preview {
        output: PathBuf,
        #[arg(long, default_value_t = 256)]
        width: u32,
        #[arg(long, default_value_t = 256)]
        height: u32,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Send a command to a running overlay
    Ctl {
        #[command(subcommand)]
        action: CtlAction,
        /// Control socket path
        #[arg(long)]
        socket: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Subcommand)]
enum CtlAction {
    /// Show or hide the overlay (bind to Ctrl+T in the compositor)
    Toggle,
    /// Save and exit (bind to Ctrl+Q in the compositor)
    Quit,
    /// 0 Cross, 1 X, 2 Circle, 3 Dot, 4 Cross + Dot
    Style { index: i64 },
    Thickness { value: f64 },
    Size { value: f64 },
    Gap { value: f64 },
    Opacity { value: f64 },
    /// Channels in 0..1; alpha defaults to 1
    Color {
        r: f64,
        g: f64,
        b: f64,
        a: Option<f64>,
    },
    Outline { state: Switch },
    OutlineColor {
        r: f64,
        g: f64,
        b: f64,
        a: Option<f64>,
    },
    OutlineThickness { value: f64 },
    OutlineOpacity { value: f64 },
    Offset {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    Monitor { index: usize },
    RefreshMonitors,
}

impl From<CtlAction> for Command {
    fn from(action: CtlAction) -> Self {
        match action {
            CtlAction::Toggle => Command::ToggleVisibility,
            CtlAction::Quit => Command::Quit,
            CtlAction::Style { index } => Command::SetStyle(index),
            CtlAction::Thickness { value } => Command::SetThickness(value),
            CtlAction::Size { value } => Command::SetSize(value),
            CtlAction::Gap { value } => Command::SetGap(value),
            CtlAction::Opacity { value } => Command::SetOpacity(value),
            CtlAction::Color { r, g, b, a } => Command::SetColor(Rgba::new(r, g, b, a.unwrap_or(1.0))),
            CtlAction::Outline { state } => Command::SetOutlineEnabled(matches!(state, Switch::On)),
            CtlAction::OutlineColor { r, g, b, a } => {
                Command::SetOutlineColor(Rgba::new(r, g, b, a.unwrap_or(1.0)))
            }
            CtlAction::OutlineThickness { value } => Command::SetOutlineThickness(value),
            CtlAction::OutlineOpacity { value } => Command::SetOutlineOpacity(value),
            CtlAction::Offset { x, y } => Command::SetOffset { x, y },
            CtlAction::Monitor { index } => Command::SelectMonitor(index),
            CtlAction::RefreshMonitors => Command::RefreshMonitors,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        None => run(cli.run),
        Some(Commands::Run(args)) => run(args),
        Some(Commands::Monitors) => {
            logging::init_cli();
            list_monitors()
        }
        Some(Commands::Preview {
            output,
            width,
            height,
            config,
        }) => {
            logging::init_cli();
            preview(output, width, height, config)
        }
        Some(Commands::Ctl { action, socket }) => {
            logging::init_cli();
            ctl(action.into(), socket)
        }
    }
}

fn open_store(path: Option<PathBuf>) -> Option<ConfigStore> {
    match path {
        Some(path) => Some(ConfigStore::new(path)),
        None => match ConfigStore::default_path() {
            Ok(path) => Some(ConfigStore::new(path)),
            Err(e) => {
                error!(error = %e, "no configuration location");
                None
            }
        },
    }
}

fn run(args: RunArgs) -> ExitCode {
    let _log_guard = logging::init();

    let Some(store) = open_store(args.config) else {
        return ExitCode::FAILURE;
    };
    let config = store.load();

    let mode = probe_surface_mode();
    let monitors = get_all_monitors();
    let initial = args.monitor.unwrap_or(0);
    let overlay_config = OverlayConfig {
        target_monitor_id: monitors.get(initial).map(|m| m.id.clone()),
        ..OverlayConfig::default()
    };

    let platform = match NativeOverlay::with_mode(mode, overlay_config) {
        Ok(platform) => platform,
        Err(e) => {
            error!(error = %e, %mode, "failed to create overlay surface");
            return ExitCode::FAILURE;
        }
    };
    let surface = OverlaySurface::new(platform, initial);

    let (tx, rx) = mpsc::channel();
    let _control = start_control_server(tx.clone());
    spawn_signal_handler(tx);

    App::new(config, store, surface).run(rx);
    info!("exiting");
    ExitCode::SUCCESS
}

/// The returned server must stay alive for the socket file to stay around
fn start_control_server(tx: Sender<Command>) -> Option<ControlServer> {
    let server = control::default_socket_path()
        .and_then(ControlServer::bind_to)
        .and_then(|server| server.spawn(tx).map(|_| server));
    match server {
        Ok(server) => Some(server),
        Err(e) => {
            warn!(error = %e, "control socket unavailable");
            None
        }
    }
}

fn spawn_signal_handler(tx: Sender<Command>) {
    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!(error = %e, "failed to install signal handlers");
            return;
        }
    };
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "termination signal received");
            let _ = tx.send(Command::Quit);
        }
    });
}

fn list_monitors() -> ExitCode {
    let monitors = get_all_monitors();
    if monitors.is_empty() {
        eprintln!("no monitors found");
        return ExitCode::FAILURE;
    }
    for (index, m) in monitors.iter().enumerate() {
        let primary = if m.is_primary { " [primary]" } else { "" };
        println!(
            "{index}: {} ({}x{}+{}+{}){primary}",
            m.label, m.width, m.height, m.x, m.y
        );
    }
    ExitCode::SUCCESS
}

fn preview(output: PathBuf, width: u32, height: u32, config: Option<PathBuf>) -> ExitCode {
    let Some(store) = open_store(config) else {
        return ExitCode::FAILURE;
    };
    let config = store.load();

    let Some(pixmap) = render_to_pixmap(&config, width, height) else {
        eprintln!("invalid preview size {width}x{height}");
        return ExitCode::FAILURE;
    };
    match pixmap.save_png(&output) {
        Ok(()) => {
            println!("{}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to write {}: {e}", output.display());
            ExitCode::FAILURE
        }
    }
}

fn ctl(command: Command, socket: Option<PathBuf>) -> ExitCode {
    let path = match socket.map_or_else(control::default_socket_path, Ok) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match control::send_command(&path, &command) {
        Ok(ControlResponse::Ack) => ExitCode::SUCCESS,
        Ok(ControlResponse::Error(message)) => {
            eprintln!("overlay rejected command: {message}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("cannot reach overlay at {}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctl_command(args: &[&str]) -> Command {
        let cli = Cli::try_parse_from(["crosshair", "ctl"].iter().chain(args)).unwrap();
        match cli.command {
            Some(Commands::Ctl { action, .. }) => action.into(),
            _ => panic!("expected ctl subcommand"),
        }
    }

    #[test]
    fn bare_invocation_runs_overlay() {
        let cli = Cli::try_parse_from(["crosshair", "--monitor", "1"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.monitor, Some(1));
    }

    #[test]
    fn ctl_maps_to_commands() {
        assert_eq!(ctl_command(&["toggle"]), Command::ToggleVisibility);
        assert_eq!(ctl_command(&["quit"]), Command::Quit);
        assert_eq!(ctl_command(&["style", "3"]), Command::SetStyle(3));
        assert_eq!(ctl_command(&["outline", "off"]), Command::SetOutlineEnabled(false));
        assert_eq!(
            ctl_command(&["color", "1", "0", "0"]),
            Command::SetColor(Rgba::new(1.0, 0.0, 0.0, 1.0))
        );
        assert_eq!(
            ctl_command(&["offset", "-12", "4.5"]),
            Command::SetOffset { x: -12.0, y: 4.5 }
        );
    }
}
