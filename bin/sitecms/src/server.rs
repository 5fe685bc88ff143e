//! HTTP surface: routes, theme cookie handling and page rendering.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use sitecms_content::{ContentService, StoreError, ThemeSession};
use sitecms_core::{Config, Role};
use sitecms_render::{RenderError, Renderer, RequestScope, inject, template_context};
use thiserror::Error;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Cookie carrying the session theme.
pub const THEME_COOKIE: &str = "theme";

/// Cookie set once the visitor accepted cookies.
pub const CONSENT_COOKIE: &str = "cookie_consent";

/// Shared state of the router.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Hands out content managers per request.
    pub service: ContentService,

    /// Template environment.
    pub renderer: Arc<Renderer>,

    /// Loaded configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the content service and renderer for `config`.
    pub fn new(config: Arc<Config>) -> Result<Self, StoreError> {
        let service = ContentService::new(config.clone())?;
        let renderer = Arc::new(Renderer::new(config.server.templates_dir.clone()));
        Ok(Self {
            service,
            renderer,
            config,
        })
    }
}

/// Failure while handling a request.
#[derive(Debug, Error)]
pub enum AppError {
    /// Content could not be loaded.
    #[error(transparent)]
    Content(#[from] StoreError),

    /// Page could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The blocking render task did not complete.
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

/// Optional `?theme=` override.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ThemeQuery {
    theme: Option<String>,
}

/// Create the site router.
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    Router::new()
        .route("/", get(home))
        .route("/pages/{topic}", get(topic_page))
        .route("/pages/{topic}/{name}", get(nested_page))
        .route("/citations", get(citations))
        .route("/ajax/citations", get(ajax_citations))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home(
    State(state): State<AppState>,
    Query(query): Query<ThemeQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    render_blocking(state, query, headers, "home".to_string(), "home.html", None).await
}

async fn topic_page(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(query): Query<ThemeQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    render_blocking(state, query, headers, topic, "page.html", None).await
}

async fn nested_page(
    State(state): State<AppState>,
    Path((topic, name)): Path<(String, String)>,
    Query(query): Query<ThemeQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let page = format!("{topic}_{name}");
    let path = format!("/pages/{topic}/{name}");
    render_blocking(state, query, headers, page, "page.html", Some(path)).await
}

async fn citations(
    State(state): State<AppState>,
    Query(query): Query<ThemeQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    render_blocking(
        state,
        query,
        headers,
        "citations".to_string(),
        "citations.html",
        Some("/citations".to_string()),
    )
    .await
}

async fn ajax_citations() -> Json<serde_json::Value> {
    Json(json!({}))
}

/// Run [`render_page`] on the blocking pool.
///
/// Cold cache slots and misses read from disk under the cache write lock.
async fn render_blocking(
    state: AppState,
    query: ThemeQuery,
    headers: HeaderMap,
    page: String,
    default_template: &'static str,
    path: Option<String>,
) -> Result<Response, AppError> {
    tokio::task::spawn_blocking(move || {
        render_page(&state, &query, &headers, &page, default_template, path)
    })
    .await?
}

/// Resolve `page`, apply the visitor's theme and render it.
fn render_page(
    state: &AppState,
    query: &ThemeQuery,
    headers: &HeaderMap,
    page: &str,
    default_template: &str,
    path: Option<String>,
) -> Result<Response, AppError> {
    let manager = state.service.acquire()?;

    let mut session = ThemeSession::restore(cookie(headers, THEME_COOKIE), manager.themes());
    if let Some(theme) = query.theme.as_deref() {
        manager.set_theme(&mut session, theme);
    }

    let scope = RequestScope {
        theme: manager.get_theme(&session),
        role: Role::for_user(None),
        cookie_consent: cookie(headers, CONSENT_COOKIE) == Some("true"),
    };

    let (mut context, template) = manager.get_content(page, default_template)?;
    if let Some(path) = path {
        context.set_path(path);
    }

    let html = state
        .renderer
        .render(&template, template_context(&context, inject(&manager, &scope)))?;
    let mut response = Html(html).into_response();

    if let Some(theme) = session.theme().filter(|_| session.changed()) {
        let value = format!(
            "{THEME_COOKIE}={theme}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            state.config.server.session_timeout_secs()
        );
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(theme, error = %e, "theme cannot be stored in a cookie"),
        }
    }

    Ok(response)
}

/// Value of cookie `name` from the request headers.
fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
