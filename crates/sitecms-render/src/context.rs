//! Request context adapter.
//!
//! Binds a content manager and the per-request scope into the `cms_*`
//! functions templates call, and merges them with the page context.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use minijinja::{ErrorKind, Value};
use serde::Serialize;
use sitecms_content::{ContentManager, PageContext, StoreError};
use sitecms_core::Role;

/// Per-request values the accessors depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    /// Active theme of the visitor session.
    pub theme: String,

    /// Role used to pick role-specific menus.
    pub role: Role,

    /// Whether the visitor already accepted cookies.
    pub cookie_consent: bool,
}

impl RequestScope {
    /// Anonymous visitor using `theme`.
    pub fn guest(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            role: Role::Guest,
            cookie_consent: false,
        }
    }
}

/// Convert a manager lookup into a template value.
fn lookup<T: Serialize>(result: sitecms_content::store::Result<T>) -> Result<Value, minijinja::Error> {
    result
        .map(|value| Value::from_serialize(&value))
        .map_err(template_error)
}

fn template_error(err: StoreError) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, "content lookup failed").with_source(err)
}

/// Build the accessor set exposed to templates for one request.
pub fn inject(manager: &Arc<ContentManager>, scope: &RequestScope) -> BTreeMap<String, Value> {
    let mut injections = BTreeMap::new();

    let theme = scope.theme.clone();
    injections.insert(
        "cms_theme".to_string(),
        Value::from_function(move || theme.clone()),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_site".to_string(),
        Value::from_function(move || lookup(cm.site())),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_site_styles".to_string(),
        Value::from_function(move || lookup(cm.site_styles())),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_site_scripts".to_string(),
        Value::from_function(move || lookup(cm.site_scripts())),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_site_seo".to_string(),
        Value::from_function(move || lookup(cm.site_seo())),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_site_brand".to_string(),
        Value::from_function(move || lookup(cm.site_brand())),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_site_menu".to_string(),
        Value::from_function(move |name: String| lookup(cm.menu(&name))),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_meta".to_string(),
        Value::from_function(move |name: String| lookup(cm.meta_data(&name))),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_link".to_string(),
        Value::from_function(move |name: String| lookup(cm.link(&name))),
    );

    let cm = manager.clone();
    let role = scope.role;
    injections.insert(
        "cms_menu".to_string(),
        Value::from_function(move |name: String| lookup(cm.get_user_menu(&name, role))),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_node".to_string(),
        Value::from_function(move |name: String| lookup(cm.node(&name))),
    );

    let cm = manager.clone();
    injections.insert(
        "cms_page".to_string(),
        Value::from_function(move |name: String| lookup(cm.page(&name))),
    );

    let consent = scope.cookie_consent;
    injections.insert(
        "cookies_check".to_string(),
        Value::from_function(move || consent),
    );

    injections.insert(
        "current_time".to_string(),
        Value::from(Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()),
    );

    injections
}

/// Merge the page context and the injected accessors into one render context.
pub fn template_context(page: &PageContext, injections: BTreeMap<String, Value>) -> Value {
    let mut context = injections;
    context.insert("page".to_string(), Value::from_serialize(&page.page));
    context.insert("template".to_string(), Value::from(page.template.as_str()));
    Value::from(context)
}
