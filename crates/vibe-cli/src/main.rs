//! Vibe Wallpaper CLI
//!
//! Serves a wallpaper session over HTTP and WebSocket.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use vibe_orchestrator::{create_router, AppState, Config, Orchestrator, Outcome};

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Delay before retrying the startup generation when the session is busy.
const INITIAL_LOAD_RETRY: Duration = Duration::from_millis(500);

/// Vibe Wallpaper - AI wallpaper generator
///
/// Turns a short idea into a detailed prompt and the prompt into a
/// wallpaper image, serving the session to a local front end.
#[derive(Parser, Debug)]
#[command(name = "vibe")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: vibe.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Prompt to seed the session with instead of the configured default
    #[arg(long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Skip the startup generation
    #[arg(long)]
    no_initial_load: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Vibe Wallpaper starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads config, starts the server and runs until Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref prompt) = args.prompt {
        config.default_prompt.clone_from(prompt);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let orchestrator = Orchestrator::from_config(&config)?;

    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind {addr}: {e}\n\nSuggestion: Choose another port with --port"
        )
    })?;
    let router = create_router(AppState::new(orchestrator.clone()));

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    println!();
    println!("Vibe Wallpaper running on http://{addr}");
    println!("  State:  GET  http://{addr}/api/state");
    println!("  Events: WS   ws://{addr}/ws");
    println!("Press Ctrl+C to stop");

    if args.no_initial_load {
        tracing::info!("Skipping initial generation");
    } else {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            while let Some(outcome) = orchestrator.initial_load().await {
                if outcome != Outcome::Busy {
                    print_outcome(&outcome);
                    break;
                }
                tracing::debug!("Session busy, retrying initial generation");
                tokio::time::sleep(INITIAL_LOAD_RETRY).await;
            }
        });
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            println!();
            println!("Shutting down...");
        }
        result = server_handle => {
            if let Err(e) = result {
                anyhow::bail!("HTTP server task failed: {e}");
            }
        }
    }

    tracing::info!("Vibe Wallpaper stopped");
    Ok(())
}

/// Loads configuration from file or defaults.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints configuration summary.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Image model: {}", config.image.model);
    println!("  Text model: {}", config.text.model);
    println!("  API key env: {}", config.api_key_env);
    println!("  Image policy: {}", config.image_policy);
    match config.request_timeout_secs {
        Some(secs) => println!("  Request timeout: {secs}s"),
        None => println!("  Request timeout: none"),
    }
}

/// Prints the result of the initial generation.
fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Succeeded => println!("Initial wallpaper generated"),
        Outcome::Failed { error } => println!("Initial generation failed: {}", error.message),
        Outcome::Busy => {}
    }
}
