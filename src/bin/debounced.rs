// Debounced Daemon
// Privileged service: control socket, signal handling and the event loop

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use debounced_core::settings::default_settings_content;
use debounced_core::{
    control_channel, ControlSender, ControlServer, Daemon, EvdevBackend, Settings, StatusHandle,
};

const UINPUT_PATH: &str = "/dev/uinput";

/// Exit status when the kernel offers no uinput device
const EXIT_NO_UINPUT: u8 = 2;

/// Keyboard chatter filter and FlashTap daemon
#[derive(Parser, Debug)]
#[command(name = "debounced")]
#[command(version)]
#[command(about = "Keyboard chatter filter and FlashTap daemon", long_about = None)]
struct Args {
    /// Settings file (default: /etc/debounced/settings.toml when present)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Control socket path, overriding the settings file
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print a default settings file and exit
    #[arg(long)]
    print_default_settings: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

/// Turn SIGINT/SIGTERM into a shutdown message for the engine thread
fn spawn_signal_thread(control: ControlSender) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;

    std::thread::Builder::new()
        .name("debounced-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                log::info!("Received signal {}, shutting down gracefully", signal);
                if let Err(e) = control.shutdown() {
                    log::error!("Failed to request shutdown: {}", e);
                }
            }
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(socket) = args.socket {
        settings = settings.with_socket_path(socket);
    }
    if let Some(path) = settings.source_path() {
        log::info!("Loaded settings from {}", path.display());
    }

    let (sender, receiver) = control_channel().context("Failed to create control queue")?;
    let status = StatusHandle::new();

    spawn_signal_thread(sender.clone())?;

    let server = ControlServer::bind(
        settings.socket_path(),
        settings.socket_mode(),
        sender,
        status.clone(),
    )?;
    // Removes the socket file once the daemon loop returns.
    let _socket = server.spawn().context("Failed to spawn control listener")?;

    let mut daemon = Daemon::new(EvdevBackend, &settings, receiver, status);
    daemon.run()?;

    log::info!("Daemon stopped");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_default_settings {
        print!("{}", default_settings_content());
        return ExitCode::SUCCESS;
    }

    init_logging(args.verbose);

    if !Path::new(UINPUT_PATH).exists() {
        log::error!("You need uinput support for this program to function.");
        return ExitCode::from(EXIT_NO_UINPUT);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
