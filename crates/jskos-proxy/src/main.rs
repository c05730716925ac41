//! jskos-proxy: look up concept schemes and concepts across JSKOS
//! registries from the command line.
//!
//! Configuration comes from the environment (see
//! `BackendConfig::from_env`), optionally preloaded from `.env` and from
//! `config.env` in the directory named by `CONFIG`.

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jskos_backend::{Backend, BackendConfig, RefreshEvent};

#[derive(Parser)]
#[command(name = "jskos-proxy")]
#[command(author, version, about = "Resolve JSKOS concept schemes and concepts across registries")]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding config.env
    #[arg(long, env = "CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all schemes
    Schemes,

    /// Show a scheme by URI or identifier
    Scheme {
        /// Scheme URI or alias
        uri: String,
    },

    /// Fetch a concept from the registry of its scheme
    Concept {
        /// Concept URI
        uri: String,
    },

    /// List the top concepts of a scheme
    Top {
        /// Scheme URI or alias
        scheme: String,
    },

    /// List the direct narrower concepts of a concept
    Narrower {
        /// Concept URI
        uri: String,
    },

    /// List the ancestors of a concept, nearest first
    Ancestors {
        /// Concept URI
        uri: String,
    },

    /// Resolve a path below the namespace, like the HTTP proxy would
    Lookup {
        /// Scheme segment
        voc: Option<String>,

        /// Concept segment
        id: Option<String>,

        /// Explicit URI, wins over the path
        #[arg(long)]
        uri: Option<String>,

        /// Output format (json, jskos, jsonld, debug, ...)
        #[arg(short, long)]
        format: Option<String>,

        /// Accept header used when no format is given
        #[arg(long)]
        accept: Option<String>,
    },

    /// Keep refreshing the scheme index and log every cycle until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Some(dir) = cli.config.as_deref() {
        load_config_dir(dir);
    }

    let _file_guard = init_tracing();

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(commands::exit_code_for(&e))
        }
    }
}

/// Preload `config.env` from the config directory. Variables already set
/// in the environment win.
fn load_config_dir(dir: &Path) {
    let path = dir.join("config.env");
    if path.is_file() {
        if let Err(e) = dotenvy::from_path(&path) {
            eprintln!("Ignoring {}: {}", path.display(), e);
        }
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "jskos_proxy=info,jskos_backend=info")
///
/// Console output goes to stderr so command output on stdout stays clean.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jskos_proxy=info,jskos_backend=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let file_guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("jskos-proxy.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false)); // no ANSI in files by default
            registry.with(layer).init();
        }
        Some(guard)
    } else if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
        None
    } else {
        let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        if let Some(ansi) = log_ansi {
            layer = layer.with_ansi(ansi);
        }
        registry.with(layer).init();
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    file_guard
}

async fn run(command: Commands) -> anyhow::Result<u8> {
    // Reject unknown or unavailable formats before any registry is contacted
    let lookup_format = match &command {
        Commands::Lookup { format, accept, .. } => Some(commands::output_format(
            format.as_deref(),
            accept.as_deref(),
        )?),
        _ => None,
    };

    let config = BackendConfig::from_env()?;
    let backend = Backend::from_config(config)?;
    let mut events = backend.start().await?;

    // A one-shot command gives up if the first refresh publishes nothing
    let ready = match command {
        Commands::Watch => Ok(()),
        _ => backend.ready(&mut events).await.map(drop),
    };
    let outcome = match ready {
        Ok(()) => dispatch(&backend, command, lookup_format, events).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = backend.stop().await {
        warn!(error = %e, "Backend did not stop cleanly");
    }
    outcome
}

async fn dispatch(
    backend: &Backend,
    command: Commands,
    lookup_format: Option<jskos_core::Format>,
    events: broadcast::Receiver<RefreshEvent>,
) -> anyhow::Result<u8> {
    match command {
        Commands::Watch => commands::watch(events).await.map(|_| commands::EXIT_OK),
        Commands::Lookup { voc, id, uri, .. } => {
            let request =
                jskos_backend::LookupRequest::new(voc.as_deref(), id.as_deref(), uri.as_deref());
            let format = lookup_format.unwrap_or(jskos_core::Format::Jsonld);
            commands::lookup(backend, &request, format).await
        }
        Commands::Schemes => commands::schemes(backend).await,
        Commands::Scheme { uri } => commands::scheme(backend, &uri).await,
        Commands::Concept { uri } => commands::concept(backend, &uri).await,
        Commands::Top { scheme } => commands::top(backend, &scheme).await,
        Commands::Narrower { uri } => commands::narrower(backend, &uri).await,
        Commands::Ancestors { uri } => commands::ancestors(backend, &uri).await,
    }
}
