//! Template environment for page rendering.
//!
//! Templates are Jinja-style and resolve from the configured templates
//! directory first, falling back to the defaults compiled into the binary.

use std::{
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime};
use minijinja::{Environment, ErrorKind, Value};
use parking_lot::RwLock;
use pulldown_cmark::{Options, Parser, html};
use thiserror::Error;
use tracing::debug;

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template not found on disk or among the defaults.
    #[error("template not found: {0}")]
    NotFound(String),

    /// Template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Default base layout.
pub const DEFAULT_BASE_TEMPLATE: &str = include_str!("../templates/base.html");

/// Default home page.
pub const DEFAULT_HOME_TEMPLATE: &str = include_str!("../templates/home.html");

/// Default generic page.
pub const DEFAULT_PAGE_TEMPLATE: &str = include_str!("../templates/page.html");

/// Default citations page.
pub const DEFAULT_CITATIONS_TEMPLATE: &str = include_str!("../templates/citations.html");

/// Built-in templates by name.
pub const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", DEFAULT_BASE_TEMPLATE),
    ("home.html", DEFAULT_HOME_TEMPLATE),
    ("page.html", DEFAULT_PAGE_TEMPLATE),
    ("citations.html", DEFAULT_CITATIONS_TEMPLATE),
];

/// Output format of the `dt` filter when none is given.
const DEFAULT_DATE_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Renders named templates with a context.
pub struct Renderer {
    env: RwLock<Environment<'static>>,
    templates_dir: PathBuf,
}

impl Renderer {
    /// Create a renderer reading overrides from `templates_dir`.
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        let templates_dir = templates_dir.into();

        let mut env = Environment::new();
        let dir = templates_dir.clone();
        env.set_loader(move |name: &str| load_template(&dir, name));
        env.add_filter("md", markdown_filter);
        env.add_filter("dt", datetime_filter);

        Self {
            env: RwLock::new(env),
            templates_dir,
        }
    }

    /// Directory searched before the built-in templates.
    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Render template `name` with `context`.
    pub fn render(&self, name: &str, context: Value) -> Result<String> {
        let env = self.env.read();
        let template = env.get_template(name).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => RenderError::NotFound(name.to_string()),
            _ => RenderError::Template(e),
        })?;
        Ok(template.render(context)?)
    }

    /// Drop every compiled template so the next render reads from disk again.
    pub fn reload(&self) {
        debug!(dir = %self.templates_dir.display(), "clearing template cache");
        self.env.write().clear_templates();
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("templates_dir", &self.templates_dir)
            .finish()
    }
}

/// Resolve a template: on-disk override first, then the built-in default.
fn load_template(dir: &Path, name: &str) -> std::result::Result<Option<String>, minijinja::Error> {
    if !is_safe_name(name) {
        return Ok(None);
    }

    match fs::read_to_string(dir.join(name)) {
        Ok(source) => {
            debug!(name, "loaded template override");
            return Ok(Some(source));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template {name}"),
            )
            .with_source(e));
        }
    }

    Ok(DEFAULT_TEMPLATES
        .iter()
        .find(|(default_name, _)| *default_name == name)
        .map(|(_, source)| (*source).to_string()))
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.contains('\\')
        && name.split('/').all(|segment| segment != ".." && !segment.is_empty())
}

/// `md` filter: Markdown to HTML. Missing values render as nothing.
fn markdown_filter(text: Option<String>) -> Value {
    let Some(text) = text else {
        return Value::from_safe_string(String::new());
    };

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(&text, options);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    Value::from_safe_string(out)
}

/// `dt` filter: reformat an ISO-8601 timestamp, `%Y/%m/%d %H:%M` by default.
///
/// Values that are not timestamps are passed through unchanged.
fn datetime_filter(value: String, format: Option<String>) -> std::result::Result<String, minijinja::Error> {
    let parsed = DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%.f"));
    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(value = %value, error = %e, "not a datetime, leaving as is");
            return Ok(value);
        }
    };

    let format = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
    let mut out = String::new();
    write!(out, "{}", parsed.format(format)).map_err(|_| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid date format '{format}'"),
        )
    })?;
    Ok(out)
}
