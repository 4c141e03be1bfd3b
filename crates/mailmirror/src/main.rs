//! `mailmirror` - replays a recorded mail session through the sync engine.
//!
//! ```text
//! mailmirror [--config <PATH>] <SESSION>
//! ```
//!
//! The final window, the visible entities and a per-step report are printed
//! to stdout as JSON. Logs go to stderr and honour `RUST_LOG`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod replay;
mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mailmirror_core::{SyncConfig, SyncEngine};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session::Session;

/// Replays a recorded mail session through the sync engine.
#[derive(Debug, PartialEq, Eq, Parser)]
#[command(name = "mailmirror", version, about)]
struct Args {
    /// Config file; defaults to `mailmirror/config.json` in the user config
    /// directory.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Session file to replay.
    #[arg(value_name = "SESSION")]
    session: PathBuf,
}

fn load_config(explicit: Option<PathBuf>) -> Result<SyncConfig> {
    if let Some(path) = explicit {
        return SyncConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    let Some(dir) = dirs::config_dir() else {
        return Ok(SyncConfig::default());
    };
    let path = dir.join("mailmirror").join("config.json");
    SyncConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the report, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailmirror=info,mailmirror_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = load_config(args.config)?;
    let session = Session::load(&args.session)?;
    let (transport, tags, steps) = session.into_parts();

    info!(session = %args.session.display(), steps = steps.len(), "Starting replay");
    let engine = SyncEngine::new(transport, config);
    engine.set_tags(tags);
    let summary = replay::run(&engine, &steps).await;

    let remaining = engine.transport().remaining();
    if remaining > 0 {
        warn!(remaining, "Recorded responses left unused");
    }
    for request in engine.transport().requests() {
        debug!(%request, "Replayed request");
    }

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &summary).context("Failed to write report")?;
    std::io::Write::write_all(&mut stdout, b"\n").context("Failed to write report")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("mailmirror").chain(list.iter().copied()))
    }

    #[test]
    fn test_args_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(
            args(&["session.json"]).unwrap(),
            Args {
                config: None,
                session: PathBuf::from("session.json"),
            }
        );
        assert_eq!(
            args(&["--config", "cfg.json", "session.json"]).unwrap(),
            Args {
                config: Some(PathBuf::from("cfg.json")),
                session: PathBuf::from("session.json"),
            }
        );
        assert_eq!(
            args(&["-c", "cfg.json", "session.json"]).unwrap().config,
            Some(PathBuf::from("cfg.json"))
        );
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--verbose", "session.json"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let path = std::env::temp_dir().join("mailmirror-missing-config.json");
        let _ = std::fs::remove_file(&path);
        assert!(load_config(Some(path)).is_err());
    }
}
