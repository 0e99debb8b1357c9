use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use server::{AppState, Config, build_router};
use services::{Clock, ConsistencyService, SyncService};
use storage::repository::Storage;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidPort { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPort { raw } => write!(f, "invalid --port value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz-sync [--db <sqlite_url>] [--port <port>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {}", server::config::DEFAULT_DB_URL);
    eprintln!("  --port {}", server::config::DEFAULT_PORT);
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_SYNC_DB_URL, QUIZ_SYNC_PORT, QUIZ_SYNC_BIND, QUIZ_SYNC_ALLOWED_ORIGINS, RUST_LOG");
}

/// Command-line flags override the environment.
fn apply_args(
    config: &mut Config,
    args: &mut impl Iterator<Item = String>,
) -> Result<bool, ArgsError> {
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                config.db_url = value;
            }
            "--port" => {
                let value = require_value(args, "--port")?;
                config.port = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidPort { raw: value.clone() })?;
            }
            "--help" | "-h" => return Ok(false),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(true)
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut config = Config::load()?;
    let mut argv = std::env::args().skip(1);
    let proceed = apply_args(&mut config, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    if !proceed {
        print_usage();
        return Ok(());
    }
    config.db_url = normalize_sqlite_url(config.db_url);

    // Open + migrate SQLite before accepting requests.
    prepare_sqlite_file(&config.db_url)?;
    let storage = Storage::sqlite(&config.db_url).await?;
    info!(db = %config.db_url, "storage ready");

    let sync = SyncService::new(Clock::default_clock(), Arc::clone(&storage.sync_states));
    let consistency = ConsistencyService::new(Arc::clone(&storage.consistency_statuses));
    let address = SocketAddr::new(config.bind, config.port);
    let app = build_router(AppState::new(sync, consistency, config));

    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        let proceed = apply_args(&mut config, &mut args(&["--port", "9000", "--db", "sqlite::memory:"]))
            .unwrap();
        assert!(proceed);
        assert_eq!(config.port, 9000);
        assert_eq!(config.db_url, "sqlite::memory:");
    }

    #[test]
    fn bad_flags_are_reported() {
        let mut config = Config::default();
        assert!(matches!(
            apply_args(&mut config, &mut args(&["--port"])),
            Err(ArgsError::MissingValue { flag: "--port" })
        ));
        assert!(matches!(
            apply_args(&mut config, &mut args(&["--port", "high"])),
            Err(ArgsError::InvalidPort { .. })
        ));
        assert!(matches!(
            apply_args(&mut config, &mut args(&["--verbose"])),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(!apply_args(&mut config, &mut args(&["--help"])).unwrap());
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/quiz.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/quiz.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
