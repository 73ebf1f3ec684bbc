//! OpenMemory Server
//!
//! Self-hosted cognitive memory service for AI agents:
//!
//! - Hierarchical semantic graph over five cognitive sectors
//! - Salience decay, reinforcement, and waypoint edges
//! - Autonomous validators, self-correction, and proactive analysis
//! - Enforcement gate with per-task locks in front of every write
//!
//! Configuration comes from `OPENMEMORY_*` environment variables; see
//! `openmemory_core::Config`.

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use openmemory_core::{spawn_maintenance, Config};
use openmemory_server::{build_router, AppState};

/// Parse command-line arguments; only `--data-dir` is accepted beyond the
/// standard help/version flags
fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("OpenMemory Server v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Cognitive memory engine for AI agents over HTTP.");
                println!();
                println!("USAGE:");
                println!("    openmemory-server [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --data-dir <PATH>       Custom data directory");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                Log level filter (e.g. debug, info, warn)");
                println!("    OPENMEMORY_PORT         Listen port (default 8080)");
                println!("    OPENMEMORY_DB_PATH      Database file location");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("openmemory-server {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(&args[i]));
            }
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'openmemory-server --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    data_dir
}

#[tokio::main]
async fn main() {
    let data_dir = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("OpenMemory Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env();
    if let Some(dir) = data_dir {
        config.db_path = Some(dir.join("openmemory.db"));
    }
    let port = config.port;

    let state = match AppState::from_config(config) {
        Ok(state) => {
            info!("Storage initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize storage: {e}");
            std::process::exit(1);
        }
    };

    // Decay on boot and every interval thereafter; waypoint prune weekly
    let _maintenance = spawn_maintenance(state.engine.clone());

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!("Listening on http://{addr}/ai-agents");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
        std::process::exit(1);
    }

    info!("OpenMemory Server shutting down");
}

/// Graceful shutdown on ctrl-c or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
