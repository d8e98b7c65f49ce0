//! ghul-ls - language server for ghul, speaking LSP on stdio.
//!
//! ```text
//! editor ──LSP──▶ Backend ──▶ Bridge actor ──stdin──▶ ghul compiler
//!    ▲                              │  ◀──stdout──────────┘
//!    └──── diagnostics / log ◀── events::forward
//! ```
//!
//! stdout carries the LSP stream, so logs go to stderr or a log file.

mod backend;
mod convert;
mod events;
mod uri;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use ghul_config::GhulConfig;
use tower_lsp::{LspService, Server};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::backend::Backend;

fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file, warning) = match log_file.map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(format!("{e:#}; logging to stderr"))),
        None => (None, None),
    };

    if let Some(file) = file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    }

    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // The editor starts the server in the workspace, so the workspace config
    // can name the log file before initialize arrives.
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = GhulConfig::load(&cwd);
    init_tracing(config.log.file.as_deref());
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ghul-ls starting");

    let (service, socket) = LspService::new(Backend::new);
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;

    tracing::info!("ghul-ls stopped");
    Ok(())
}
