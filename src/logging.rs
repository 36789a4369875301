//! Tracing setup for the portal server.
//!
//! Events go to stdout in compact form and are mirrored, without ANSI colours, to a log file
//! through a non-blocking writer. `PORTAL_LOG_FILE` names the file; without it the server writes
//! `logs/course-portal.log`. Filtering follows `RUST_LOG` and defaults to `info`.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "PORTAL_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "course-portal.log";

/// Keeps the file writer's worker thread alive until the process exits.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where the file layer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// Explicit file, appended to.
    File(PathBuf),
    /// Default file inside a directory created on demand.
    Directory { dir: PathBuf, name: &'static str },
}

impl LogTarget {
    fn resolve(explicit: Option<String>) -> Self {
        match explicit.filter(|path| !path.trim().is_empty()) {
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::Directory {
                dir: PathBuf::from(DEFAULT_LOG_DIR),
                name: DEFAULT_LOG_NAME,
            },
        }
    }

    fn open(&self) -> std::io::Result<NonBlocking> {
        let (writer, guard) = match self {
            Self::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                tracing_appender::non_blocking(file)
            }
            Self::Directory { dir, name } => {
                std::fs::create_dir_all(dir)?;
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, *name))
            }
        };
        let _ = FILE_GUARD.set(guard);
        Ok(writer)
    }

    fn path(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::Directory { dir, name } => dir.join(name),
        }
    }
}

/// Install the global subscriber. Call once, after configuration is loaded.
///
/// A log file that cannot be opened is reported on stderr and stdout logging continues alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false).compact();

    let target = LogTarget::resolve(std::env::var(LOG_FILE_ENV).ok());
    let file = match target.open() {
        Ok(writer) => Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .compact(),
        ),
        Err(err) => {
            eprintln!("Log file {} unavailable: {err}", target.path().display());
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .init();
}
