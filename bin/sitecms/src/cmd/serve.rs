//! Serve command - run the site, optionally reloading on file changes

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use color_eyre::eyre::{Result, WrapErr};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind};
use sitecms_core::{Config, ManagerLifetime};
use tokio::{net::TcpListener, sync::mpsc};

use crate::server::{AppState, create_router};

/// Debounce interval for file changes.
const DEBOUNCE_MS: u64 = 200;

/// Run the serve command.
pub async fn run(
    config_path: &Path,
    port: Option<u16>,
    address: Option<String>,
    watch: bool,
    open_browser: bool,
) -> Result<()> {
    tracing::info!(?config_path, ?port, ?address, watch, "Starting server");

    let mut config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(address) = address {
        config.server.address = address;
    }

    let state = AppState::new(Arc::new(config)).wrap_err("Failed to initialize content")?;

    // Keep watcher alive for the lifetime of the server
    let _watcher = if watch {
        Some(spawn_reloader(&state)?)
    } else {
        None
    };

    let addr = state.config.server.bind_addr();
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

    println!();
    println!("  Site running at http://{addr}");
    println!("  Press Ctrl+C to stop");
    println!();

    if open_browser {
        let _ = open::that(format!("http://{addr}"));
    }

    axum::serve(listener, app).await.wrap_err("Server error")?;

    Ok(())
}

/// Watch the content root and templates directory, reloading caches on change.
fn spawn_reloader(state: &AppState) -> Result<RecommendedWatcher> {
    let (tx, mut rx) = mpsc::channel::<()>(16);

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    EventKind::Modify(ModifyKind::Data(_))
                        | EventKind::Modify(ModifyKind::Name(_))
                        | EventKind::Create(_)
                        | EventKind::Remove(_)
                ) {
                    let _ = tx.blocking_send(());
                }
            }
        },
        notify::Config::default(),
    )
    .wrap_err("Failed to create file watcher")?;

    let content_root = &state.config.content.root;
    let templates_dir = &state.config.server.templates_dir;

    if content_root.exists() {
        watcher
            .watch(content_root, RecursiveMode::Recursive)
            .wrap_err("Failed to watch content directory")?;
        tracing::debug!(dir = %content_root.display(), "Watching content directory");
    }
    if templates_dir.exists() {
        watcher
            .watch(templates_dir, RecursiveMode::Recursive)
            .wrap_err("Failed to watch templates directory")?;
        tracing::debug!(dir = %templates_dir.display(), "Watching templates directory");
    }

    if state.service.lifetime() == ManagerLifetime::Request {
        tracing::debug!("per-request content managers always read fresh content");
    }

    let state = state.clone();
    tokio::spawn(async move {
        let mut last_reload = Instant::now();

        while rx.recv().await.is_some() {
            if last_reload.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
                continue;
            }

            // Let the burst settle, then drain it
            tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
            while rx.try_recv().is_ok() {}

            state.renderer.reload();

            let service = state.service.clone();
            match tokio::task::spawn_blocking(move || service.reload()).await {
                Ok(Ok(())) => println!("  ✓ Reloaded content and templates"),
                Ok(Err(e)) => {
                    tracing::error!("Reload failed: {e}");
                    eprintln!("  ✗ Reload failed: {e}");
                }
                Err(e) => tracing::error!("Reload task failed: {e}"),
            }

            last_reload = Instant::now();
        }
    });

    Ok(watcher)
}
