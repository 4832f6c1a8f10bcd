//! termfeed - a terminal viewer for remote web terminal sessions
//!
//! termfeed opens a terminal session on a web terminal server and shows its
//! live output. The server streams base64 snapshots of the screen as
//! server-sent events; every snapshot replaces the one before it.
//!
//! # Quick Start
//!
//! ```text
//! termfeed                          # Connect to http://127.0.0.1:8080
//! termfeed -s http://host:8080      # Connect to another server
//! termfeed -i                       # Also forward key presses
//! termfeed --once > screen.txt      # Save one snapshot and exit
//! ```
//!
//! # Protocol
//!
//! | Step | Request | Result |
//! |------|---------|--------|
//! | 1 | `POST /open` | `{"terminal_id": ...}` |
//! | 2 | `GET /read/{terminal_id}` | event stream of base64 frames |
//! | input | `PUT /write/{terminal_id}` | raw bytes to the shell |

mod config;
mod core;
mod ui;

use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use crossterm::event::{self, Event, KeyEventKind};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{ColorScheme, Config as TermfeedConfig};
use crate::core::api::{HttpSessionApi, SessionApi};
use crate::core::session::Session;
use crate::ui::{KeyMapper, PlainTarget, RenderTarget, Renderer, StatusInfo};

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Options {
    /// Server base URL, overrides config.toml
    server: Option<String>,
    /// Forward key presses to the remote terminal
    forward_input: bool,
    /// Print frames to stdout instead of the full-screen viewer
    plain: bool,
    /// Exit after the first frame
    once: bool,
    /// Log filter directive, overrides TERMFEED_LOG
    log_level: Option<String>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long the plain-mode loop waits for output per iteration
const PLAIN_WAIT: Duration = Duration::from_millis(200);

fn print_version() {
    eprintln!("termfeed {}", VERSION);
}

fn print_help() {
    eprintln!("termfeed {} - A viewer for remote web terminal sessions", VERSION);
    eprintln!();
    eprintln!("Usage: termfeed [OPTIONS]");
    eprintln!();
    eprintln!("Connection options:");
    eprintln!("  (default)             From config.toml or {}", config::DEFAULT_SERVER);
    eprintln!("  -s, --server <URL>    Web terminal server base URL");
    eprintln!();
    eprintln!("Display options:");
    eprintln!("  (default)             Full-screen viewer (plain when stdout is not a terminal)");
    eprintln!("  -p, --plain           Print every frame to stdout, separated by form feeds");
    eprintln!("  -1, --once            Print the first frame and exit (implies --plain)");
    eprintln!();
    eprintln!("Input options:");
    eprintln!("  -i, --input           Forward key presses to the remote terminal");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  --log-level <FILTER>  Log filter (default: $TERMFEED_LOG or info)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Viewer keys:");
    eprintln!("  q, Esc, Ctrl+C        Quit (view only)");
    eprintln!("  Ctrl+Q                Quit (always)");
    eprintln!();
    eprintln!("Configuration: ~/.termfeed/config.toml");
    eprintln!("Log file:      ~/.termfeed/termfeed.log");
    eprintln!();
    eprintln!("Color schemes: {}", ColorScheme::list().join(", "));
}

fn parse_args<I>(args: I) -> Result<Options, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-s" | "--server" => {
                let url = args.next().ok_or("Missing server argument")?;
                options.server = Some(url);
            }
            "-i" | "--input" => {
                options.forward_input = true;
            }
            "-p" | "--plain" => {
                options.plain = true;
            }
            "-1" | "--once" => {
                options.once = true;
                options.plain = true;
            }
            "--log-level" => {
                let level = args.next().ok_or("Missing log level argument")?;
                options.log_level = Some(level);
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
    }

    Ok(options)
}

/// Log to ~/.termfeed/termfeed.log; the viewer owns the screen
fn init_logging(level: Option<&str>) {
    let log_path = TermfeedConfig::dir()
        .map(|dir| dir.join("termfeed.log"))
        .unwrap_or_else(|| PathBuf::from("termfeed.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    let filter = match level {
        Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_env("TERMFEED_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args(env::args().skip(1)) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging(options.log_level.as_deref());
    info!("termfeed {} starting...", VERSION);

    let result = run(options);
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn run(options: Options) -> anyhow::Result<()> {
    // Command line overrides config file
    let mut config = TermfeedConfig::load();
    if let Some(server) = options.server {
        config.server = server;
    }
    if options.forward_input {
        config.input.forward = true;
    }

    let base = config.server_url().context("Invalid server address")?;
    info!("Server: {}", base);

    let api = HttpSessionApi::new(base.clone(), config.connect_timeout());
    let session = Session::new(api);

    if options.plain || !io::stdout().is_terminal() {
        if config.input.forward {
            info!("Input forwarding is not available in plain mode");
        }
        run_plain(session, options.once)
    } else {
        run_viewer(session, &config, base.to_string())
    }
}

/// Print frames to stdout until the stream ends
fn run_plain<A: SessionApi>(session: Session<A>, once: bool) -> anyhow::Result<()> {
    let stdout = io::stdout();
    stream_plain(session, stdout.lock(), once)
}

/// Write frames to `out`; errors after a stream error, or when `once`
/// finds no frame before the stream ends
fn stream_plain<A: SessionApi, W: Write>(
    mut session: Session<A>,
    out: W,
    once: bool,
) -> anyhow::Result<()> {
    let mut target = PlainTarget::new(out);

    let id = session.start().context("Failed to open terminal session")?;
    info!("Plain mode: terminal {} (once: {})", id, once);

    while session.is_streaming() {
        if once {
            // One item at a time so that queued frames are not printed
            session.wait_and_apply(&mut target, PLAIN_WAIT)?;
            if session.frames() > 0 {
                return Ok(());
            }
        } else {
            session.wait_and_pump(&mut target, PLAIN_WAIT)?;
        }
    }

    info!("Session finished: {:?}", session.state());
    if let Some(e) = session.close_error() {
        bail!("Output stream of terminal {} failed: {}", id, e);
    }
    if once {
        bail!("Output stream of terminal {} closed before the first frame", id);
    }
    Ok(())
}

/// Run the full-screen viewer
fn run_viewer<A: SessionApi>(
    mut session: Session<A>,
    config: &TermfeedConfig,
    server: String,
) -> anyhow::Result<()> {
    let forwarding = config.input.forward;
    let hint = if forwarding { "Ctrl+Q: quit" } else { "q: quit" };

    let mut renderer = Renderer::new(config.get_color_scheme(), config.status_bar.visible);
    renderer.init()?;
    renderer.set_status(StatusInfo {
        server: server.clone(),
        terminal: None,
        state: "connecting",
        hint,
        alert: false,
    })?;

    // Renderer is restored by Drop if this fails
    let id = session.start().context("Failed to open terminal session")?;
    renderer.set_status(StatusInfo {
        server: server.clone(),
        terminal: Some(id.to_string()),
        state: if forwarding { "streaming, input on" } else { "streaming" },
        hint,
        alert: false,
    })?;

    let result = run_main_loop(&mut session, &mut renderer, config, server);

    let _ = renderer.cleanup();
    info!("Session finished: {:?} after {} frames", session.state(), session.frames());
    result
}

/// Main event loop
fn run_main_loop<A: SessionApi>(
    session: &mut Session<A>,
    renderer: &mut Renderer,
    config: &TermfeedConfig,
    server: String,
) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);
    let forwarding = config.input.forward;
    let modes = config.input_modes();
    let mut ended = false;

    loop {
        // Render any output received since the last iteration
        session.pump(renderer)?;

        if !ended && !session.is_streaming() {
            ended = true;
            renderer.set_status(StatusInfo {
                server: server.clone(),
                terminal: session.terminal_id().map(|id| id.to_string()),
                state: "ended",
                hint: "q: quit",
                alert: true,
            })?;
        }

        if !event::poll(poll_timeout)? {
            continue;
        }

        match event::read()? {
            Event::Key(key_event) => {
                // Only process key press events
                if key_event.kind != KeyEventKind::Press {
                    continue;
                }

                // Once the stream is gone there is nothing to type into
                if KeyMapper::is_quit(&key_event, forwarding && !ended) {
                    info!("Quit requested");
                    break;
                }

                if forwarding && !ended {
                    if let Some(bytes) = KeyMapper::map(&key_event, &modes) {
                        if let Err(e) = session.send_input(&bytes) {
                            error!("Failed to write to terminal: {}", e);
                            renderer.notify(&format!("write failed: {}", e))?;
                        }
                    }
                }
            }
            Event::Resize(cols, rows) => {
                info!("Resize: {}x{}", cols, rows);
                renderer.resize(cols, rows)?;
            }
            _ => {}
        }
    }

    Ok(())
}
