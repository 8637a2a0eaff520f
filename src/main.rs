use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sysinfo::System;

use studiowav::audio_system::{AudioBackend, FileAssetSource, MemoryBackend, RodioBackend};
use studiowav::catalog;
use studiowav::download_gate::{DownloadGate, HttpFormClient};
use studiowav::error::AppResult;
use studiowav::messaging::{AudioRuntime, Command, SessionHandle};
use studiowav::AudioConfig;

const LOG_TARGET_STARTUP: &str = "studiowav::startup";

#[derive(Parser)]
#[command(name = "studiowav", version, about = "StudioWav audio session console")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run an interactive audio session driven by stdin.
    Session {
        /// Use the silent backend instead of the output device.
        #[arg(long)]
        silent: bool,
        /// Configuration file (defaults to config/config.json next to the binary).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the pack catalog as JSON.
    Packs,
    /// Unlock a pack download with an email address.
    Download {
        /// Pack id, e.g. "analog-hits".
        pack: String,
        email: String,
        /// Open the downloaded file once unlocked.
        #[arg(long)]
        open: bool,
        /// Configuration file (defaults to config/config.json next to the binary).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Initialize tracing with file rotation
///
/// Logs are written to `<config dir>/StudioWav/logs/` with daily rotation.
/// Debug builds also log to stderr.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("StudioWav").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "studiowav.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    // stdout carries command output, so the console layer goes to stderr
    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting StudioWav v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
}

fn load_config(path: Option<PathBuf>) -> AppResult<AudioConfig> {
    let config = match path {
        Some(path) => AudioConfig::load_from(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AudioConfig::load().context("Failed to load config")?,
    };
    Ok(config)
}

fn make_backend(config: &AudioConfig, silent: bool) -> Box<dyn AudioBackend> {
    let assets = Arc::new(FileAssetSource::new(&config.asset_root));
    if silent {
        return Box::new(MemoryBackend::new(assets));
    }

    match RodioBackend::try_new(assets.clone()) {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            tracing::warn!("No audio output, continuing silently: {}", e);
            Box::new(MemoryBackend::new(assets))
        }
    }
}

fn run_session(silent: bool, config: Option<PathBuf>) -> AppResult<()> {
    let config = load_config(config)?;
    let runtime = AudioRuntime::spawn(config, move |config| make_backend(config, silent))
        .context("Failed to start audio runtime")?;
    let handle = runtime.handle();

    println!("StudioWav session. Type `help` for commands.");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(Input::Quit) => break,
            Ok(Input::Help) => print_help(),
            Ok(Input::Status) => print_status(&handle)?,
            Ok(Input::Command(command)) => {
                if !handle.send(command) {
                    bail!("Audio runtime stopped unexpectedly");
                }
            }
            Err(message) => println!("{}", message),
        }
    }

    runtime.shutdown();
    Ok(())
}

enum Input {
    Command(Command),
    Status,
    Help,
    Quit,
}

fn parse_line(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let input = match (verb, args.as_slice()) {
        ("enter", []) => Input::Command(Command::Enter),
        ("start", []) => Input::Command(Command::StartMusic),
        ("click", []) => Input::Command(Command::PlayClick),
        ("transition", []) => Input::Command(Command::PlayTransition),
        ("mute", []) => Input::Command(Command::SetMuted(true)),
        ("unmute", []) => Input::Command(Command::SetMuted(false)),
        ("toggle", []) => Input::Command(Command::ToggleMute),
        ("volume", [value]) => {
            let volume = value
                .parse::<f32>()
                .map_err(|_| format!("Not a volume: {}", value))?;
            Input::Command(Command::SetVolume(volume))
        }
        ("stop", []) => Input::Command(Command::StopMusic { immediate: false }),
        ("stop", ["now"]) => Input::Command(Command::StopMusic { immediate: true }),
        ("open", [pack]) => {
            if catalog::find_pack(pack).is_none() {
                return Err(format!("Unknown pack: {}", pack));
            }
            Input::Command(Command::OpenPackModal)
        }
        ("close", []) => Input::Command(Command::ClosePackModal),
        ("preview", [sample_id, locator]) => Input::Command(Command::TogglePreview {
            sample_id: sample_id.to_string(),
            locator: locator.to_string(),
        }),
        ("status", []) => Input::Status,
        ("help", []) => Input::Help,
        ("quit", []) | ("exit", []) => Input::Quit,
        _ => return Err(format!("Unknown command: {} (try `help`)", line)),
    };
    Ok(input)
}

fn print_help() {
    println!("  enter                 transition cue, then music");
    println!("  start | stop [now]    background music");
    println!("  click | transition    cues");
    println!("  mute | unmute | toggle | volume <0-1>");
    println!("  open <pack> | close   pack modal (ducks music)");
    println!("  preview <id> <path>   toggle a sample preview");
    println!("  status | quit");
}

fn print_status(handle: &SessionHandle) -> AppResult<()> {
    let snapshot = handle.snapshot();
    let json = serde_json::to_string_pretty(&snapshot).context("Failed to encode status")?;
    println!("{}", json);
    io::stdout().flush().context("Failed to flush stdout")?;
    Ok(())
}

fn run_download(pack: &str, email: &str, open_file: bool, config: Option<PathBuf>) -> AppResult<()> {
    let config = load_config(config)?;
    let gate = DownloadGate::new(HttpFormClient::new(config.form_endpoint.clone()));

    let ticket = match gate.unlock(email, pack) {
        Ok(ticket) => ticket,
        Err(e) => {
            tracing::warn!("Download gate refused {}: {}", pack, e);
            bail!("{}", e.user_message());
        }
    };

    let path = FileAssetSource::new(&config.asset_root).resolve(&ticket.download_url);
    println!("Unlocked {}: {}", ticket.pack.title, path.display());

    if open_file {
        open::that(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    }
    Ok(())
}

fn main() -> AppResult<()> {
    initialize_tracing();
    log_runtime_environment();

    let cli = Cli::parse();
    match cli.command {
        CliCommand::Session { silent, config } => run_session(silent, config),
        CliCommand::Packs => {
            let json = serde_json::to_string_pretty(catalog::packs()).context("Failed to encode catalog")?;
            println!("{}", json);
            Ok(())
        }
        CliCommand::Download {
            pack,
            email,
            open,
            config,
        } => run_download(&pack, &email, open, config),
    }
}
