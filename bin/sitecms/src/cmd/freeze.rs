//! Freeze command - render every known route to static HTML

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use axum::{
    body::{Body, to_bytes},
    http::Request,
};
use color_eyre::eyre::{Result, WrapErr};
use sitecms_core::{Config, ContentType};
use tower::ServiceExt;
use walkdir::WalkDir;

use crate::server::{AppState, create_router};

/// Outcome of a freeze run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FreezeStats {
    /// Routes written as HTML.
    pub pages: usize,
    /// Routes that did not render.
    pub failed: usize,
    /// Static files copied.
    pub assets: usize,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

/// Run the freeze command.
pub async fn run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    tracing::info!(?config_path, ?output, "Starting freeze");

    let config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;
    let output = output.unwrap_or_else(|| config.freeze.output_dir.clone());

    let state = AppState::new(Arc::new(config)).wrap_err("Failed to initialize content")?;
    let routes = collect_routes(&state)?;
    let stats = freeze(&state, &routes, &output).await?;

    print_freeze_stats(&stats, &output);
    Ok(())
}

/// Every route to freeze: home, citations, each stored page and the
/// configured extra routes.
pub fn collect_routes(state: &AppState) -> Result<Vec<String>> {
    let manager = state.service.acquire()?;

    let mut routes = vec!["/".to_string(), "/citations".to_string()];
    for name in manager.get_items(ContentType::Page)?.keys() {
        if name != "home" {
            routes.push(page_route(name));
        }
    }
    routes.extend(state.config.freeze.routes.iter().cloned());

    routes.sort();
    routes.dedup();
    Ok(routes)
}

/// URL of a stored page: `topic_name` lives under `/pages/topic/name`.
pub fn page_route(name: &str) -> String {
    match name.split_once('_') {
        Some((topic, rest)) if !topic.is_empty() && !rest.is_empty() => {
            format!("/pages/{topic}/{rest}")
        }
        _ => format!("/pages/{name}"),
    }
}

/// Render `routes` through the router and write them below `output`.
pub async fn freeze(state: &AppState, routes: &[String], output: &Path) -> Result<FreezeStats> {
    let start = Instant::now();
    let app = create_router(state.clone());
    let mut stats = FreezeStats::default();

    fs::create_dir_all(output).wrap_err("Failed to create output directory")?;

    for route in routes {
        let request = match Request::builder().uri(route.as_str()).body(Body::empty()) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(route, error = %e, "Skipping invalid route");
                stats.failed += 1;
                continue;
            }
        };

        let response = app.clone().oneshot(request).await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(route, %status, "Route did not render");
            stats.failed += 1;
            continue;
        }

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .wrap_err_with(|| format!("Failed to read response of {route}"))?;

        let target = route_file(output, route);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &body).wrap_err_with(|| format!("Failed to write {}", target.display()))?;
        tracing::debug!(route, target = %target.display(), "Froze route");
        stats.pages += 1;
    }

    stats.assets = copy_static(&state.config.server.static_dir, &output.join("static"))?;
    stats.duration_ms = start.elapsed().as_millis() as u64;

    Ok(stats)
}

/// `index.html` below `output` mirroring the segments of `route`.
fn route_file(output: &Path, route: &str) -> PathBuf {
    let path = route.split('?').next().unwrap_or_default();
    let mut target = output.to_path_buf();
    for segment in path
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
    {
        target.push(segment);
    }
    target.join("index.html")
}

/// Copy the static directory into the output; returns the number of files.
fn copy_static(src: &Path, dest: &Path) -> Result<usize> {
    if !src.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in WalkDir::new(src).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        count += 1;
    }

    Ok(count)
}

/// Print freeze statistics in a user-friendly format.
fn print_freeze_stats(stats: &FreezeStats, output: &Path) {
    println!();
    println!("  Freeze Statistics:");
    println!("  ─────────────────────────────────");
    println!("  Pages:        {:>6}", stats.pages);
    println!("  Failed:       {:>6}", stats.failed);
    println!("  Assets:       {:>6}", stats.assets);
    println!("  ─────────────────────────────────");
    println!("  Output:       {}", output.display());
    println!("  Duration:     {:>6}ms", stats.duration_ms);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_route() {
        assert_eq!(page_route("about"), "/pages/about");
        assert_eq!(page_route("tutorials_webrtc"), "/pages/tutorials/webrtc");
        assert_eq!(page_route("a_b_c"), "/pages/a/b_c");
        assert_eq!(page_route("_hidden"), "/pages/_hidden");
        assert_eq!(page_route("trailing_"), "/pages/trailing_");
    }

    #[test]
    fn test_route_file() {
        let out = Path::new("build");
        assert_eq!(route_file(out, "/"), PathBuf::from("build/index.html"));
        assert_eq!(
            route_file(out, "/pages/about"),
            PathBuf::from("build/pages/about/index.html")
        );
        assert_eq!(
            route_file(out, "/pages/../../etc?theme=dark"),
            PathBuf::from("build/pages/etc/index.html")
        );
    }

    #[test]
    fn test_copy_static() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("themes")).unwrap();
        fs::write(src.path().join("themes/default.css"), "body{}").unwrap();
        fs::write(src.path().join("app.js"), "").unwrap();

        let copied = copy_static(src.path(), dest.path()).unwrap();
        assert_eq!(copied, 2);
        assert!(dest.path().join("themes/default.css").exists());
        assert_eq!(copy_static(&src.path().join("nope"), dest.path()).unwrap(), 0);
    }
}
