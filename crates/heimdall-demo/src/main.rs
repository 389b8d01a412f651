//! # heimdall-demo
//!
//! Playground server: registers the sample actions, seeds the note store,
//! runs the clock publisher and serves a page that drives all of it.

#![deny(unsafe_code)]

mod clock;
mod home;
mod notes;
mod page;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use clap::Parser;
use heimdall_core::logging::{LogFormat, init_subscriber};
use heimdall_server::metrics::install_recorder;
use heimdall_server::{ActionRegistry, HeimdallServer};
use heimdall_settings::{HeimdallSettings, load_settings_from_path, settings_path};
use tracing::{info, warn};

use crate::home::{Counter, Uptime};
use crate::notes::NoteService;

/// Heimdall playground server.
#[derive(Parser, Debug)]
#[command(name = "heimdall-demo", about = "Heimdall playground server")]
struct Cli {
    /// Settings file (defaults to `$HEIMDALL_SETTINGS` or `./heimdall.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter directive (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs.
    #[arg(long)]
    json_logs: bool,

    /// Dummy notes to seed at startup.
    #[arg(long, default_value = "1000")]
    seed_notes: usize,

    /// Seconds between clock ticks.
    #[arg(long, default_value = "1")]
    clock_secs: u64,
}

impl Cli {
    fn apply(&self, settings: &mut HeimdallSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
    }
}

fn registry() -> Result<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    home::register(&mut registry).context("failed to register home actions")?;
    notes::register(&mut registry).context("failed to register notes actions")?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    init_subscriber(&settings.logging.level, settings.logging.format);

    let base_path = settings.server.base_path.clone();
    let metrics_enabled = settings.server.metrics_enabled;
    let notes = Arc::new(NoteService::new());

    let index = Router::new().route(
        "/",
        get(move || {
            let base_path = base_path.clone();
            async move { page::index(&base_path) }
        }),
    );

    let mut builder = HeimdallServer::builder(settings)
        .actions(registry()?)
        .service(Counter::default())
        .service(Uptime(Instant::now()))
        .service_arc(Arc::clone(&notes))
        .routes(index);
    if metrics_enabled {
        match install_recorder() {
            Ok(handle) => builder = builder.metrics(handle),
            Err(e) => warn!(error = %e, "metrics disabled"),
        }
    }
    let server = builder.build().context("failed to build server")?;

    let shutdown = Arc::clone(server.shutdown());
    shutdown.track(notes::spawn_loader(notes, cli.seed_notes, shutdown.token()));
    shutdown.track(clock::spawn_clock(
        server.bifrost().clone(),
        Duration::from_secs(cli.clock_secs.max(1)),
        shutdown.token(),
    ));

    let listener = server.bind().await.context("failed to bind listener")?;
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            shutdown.shutdown();
        }
    });

    server.serve(listener).await.context("server error")?;
    Ok(())
}
