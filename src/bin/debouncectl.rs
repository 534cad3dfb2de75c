// Debounced Control CLI
// start / stop / status / show against the running daemon

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use debounced_core::settings::{DEFAULT_SOCKET_PATH, DEFAULT_VIRTUAL_DEVICE_NAME};
use debounced_core::{
    list_keyboards, Command, ControlClient, Mode, PairSelection, Response, StartRequest,
    REPLY_OK,
};

/// Control the debounced daemon
#[derive(Parser, Debug)]
#[command(name = "debouncectl")]
#[command(version)]
#[command(about = "Control the debounced keyboard daemon", long_about = None)]
struct Cli {
    /// Control socket of the daemon
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: CtlCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum CtlCommand {
    /// Grab a keyboard and start filtering it
    Start {
        /// Keyboard event node, e.g. /dev/input/event3
        device: PathBuf,

        /// Length of time in ms to debounce each input for
        #[arg(default_value_t = 50, allow_negative_numbers = true)]
        timeout: i64,

        /// b (both), d (debounce only), f (FlashTap only)
        #[arg(default_value = "d", value_parser = parse_mode)]
        mode: Mode,

        /// ad, arrows, both, none [default: none for d, ad for f/b]
        #[arg(value_parser = parse_pairs)]
        pair: Option<PairSelection>,
    },

    /// Stop all debounce and FlashTap activity until the next start
    Stop,

    /// Show the current status of the daemon
    Status,

    /// List potential keyboard device nodes
    Show,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::from_flag(s).ok_or_else(|| format!("mode must be one of b, d, f (got '{}')", s))
}

fn parse_pairs(s: &str) -> Result<PairSelection, String> {
    s.parse().map_err(|e: debounced_core::ConfigError| e.to_string())
}

/// Pair selection used when `start` omits it
fn default_pairs(mode: Mode) -> PairSelection {
    if mode.flashtap_enabled() {
        PairSelection::Ad
    } else {
        PairSelection::None
    }
}

fn show_keyboards() -> ExitCode {
    let keyboards = list_keyboards(DEFAULT_VIRTUAL_DEVICE_NAME);
    if keyboards.is_empty() {
        println!("No keyboards found.");
        return ExitCode::SUCCESS;
    }
    for (i, kb) in keyboards.iter().enumerate() {
        println!(
            "{}: {:<20} {} [{:04x}:{:04x}:{:04x}]{}",
            i + 1,
            kb.path.display(),
            kb.name,
            kb.bus,
            kb.vendor,
            kb.product,
            kb.unique
                .as_deref()
                .filter(|serial| !serial.is_empty())
                .map(|serial| format!(" serial={}", serial))
                .unwrap_or_default()
        );
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<ExitCode> {
    let command = match cli.command {
        CtlCommand::Show => return Ok(show_keyboards()),
        CtlCommand::Status => Command::Status,
        CtlCommand::Stop => Command::Stop,
        CtlCommand::Start {
            device,
            timeout,
            mode,
            pair,
        } => Command::Start(StartRequest {
            device,
            timeout_ms: timeout,
            mode,
            pairs: pair.unwrap_or_else(|| default_pairs(mode)),
        }),
    };

    let client = ControlClient::new(cli.socket);
    let response = client
        .send(&command)
        .with_context(|| format!("'{}' failed", command))?;

    match response {
        Response::Status(report) => {
            println!("{}", report);
            Ok(ExitCode::SUCCESS)
        }
        Response::Code(code) => {
            if code != REPLY_OK {
                match command {
                    Command::Stop => {
                        eprintln!("Daemon is already idle; stop command was ignored.")
                    }
                    _ => eprintln!(
                        "Daemon rejected the start command (already running, or invalid arguments; see daemon log)."
                    ),
                }
            }
            Ok(ExitCode::from(code))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_defaults() {
        let cli = Cli::parse_from(["debouncectl", "start", "/dev/input/event3"]);

        assert_eq!(cli.socket, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(
            cli.command,
            CtlCommand::Start {
                device: PathBuf::from("/dev/input/event3"),
                timeout: 50,
                mode: Mode::DebounceOnly,
                pair: None,
            }
        );
        assert_eq!(default_pairs(Mode::DebounceOnly), PairSelection::None);
    }

    #[test]
    fn test_start_with_all_arguments() {
        let cli = Cli::parse_from(["debouncectl", "start", "/dev/input/event5", "30", "b", "both"]);

        assert_eq!(
            cli.command,
            CtlCommand::Start {
                device: PathBuf::from("/dev/input/event5"),
                timeout: 30,
                mode: Mode::Both,
                pair: Some(PairSelection::Both),
            }
        );
    }

    #[test]
    fn test_flashtap_mode_defaults_to_ad() {
        let cli = Cli::parse_from(["debouncectl", "start", "/dev/input/event5", "20", "f"]);
        match cli.command {
            CtlCommand::Start { mode, pair, .. } => {
                assert_eq!(mode, Mode::FlashTapOnly);
                assert_eq!(pair.unwrap_or_else(|| default_pairs(mode)), PairSelection::Ad);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_mode_and_extra_arguments() {
        assert!(Cli::try_parse_from(["debouncectl", "start", "/dev/input/event5", "20", "x"]).is_err());
        assert!(Cli::try_parse_from(["debouncectl", "stop", "now"]).is_err());
        assert!(Cli::try_parse_from(["debouncectl", "start"]).is_err());
    }

    #[test]
    fn test_socket_override() {
        let cli = Cli::parse_from(["debouncectl", "--socket", "/tmp/db.sock", "status"]);
        assert_eq!(cli.socket, PathBuf::from("/tmp/db.sock"));
        assert_eq!(cli.command, CtlCommand::Status);
    }
}
