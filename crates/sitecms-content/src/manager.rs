//! Content manager: the cached, typed front door to stored content.
//!
//! Each content type has one cache slot. A slot is populated from disk the
//! first time anything touches that type and then lives as long as the
//! manager; only [`ContentManager::reload`] repopulates it. Item lookups that
//! miss the slot fall through to a single-file read, and the outcome is
//! recorded either way so a missing document costs one disk read.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, hash_map::Entry},
    sync::Arc,
};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use sitecms_core::{
    Config, ContentType, Document, Role, SchemaRegistry, config::ThemeConfig,
    content::document_name,
};
use tracing::{debug, info, warn};

use crate::{
    store::{FileStore, Result},
    theme::ThemeSession,
};

/// Page name served at `/`.
const HOME_PAGE: &str = "home";

/// Render-ready context produced by [`ContentManager::get_content`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageContext {
    /// Page document with its derived `path`.
    pub page: Document,

    /// Template chosen for the page.
    pub template: String,
}

impl PageContext {
    /// Override the derived `path` of the page.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.page
            .insert("path".to_string(), Value::String(path.into()));
    }

    /// Derived `path` of the page.
    pub fn path(&self) -> Option<&str> {
        self.page.get("path").and_then(Value::as_str)
    }
}

/// Cache slot of one content type.
#[derive(Debug, Default)]
struct Slot {
    items: BTreeMap<String, Document>,
    misses: BTreeSet<String>,
}

/// Cached, schema-validated CRUD over a [`FileStore`].
#[derive(Debug)]
pub struct ContentManager {
    store: FileStore,
    schemas: Arc<SchemaRegistry>,
    themes: ThemeConfig,
    host: String,
    cache: RwLock<HashMap<ContentType, Slot>>,
}

impl ContentManager {
    /// Create a manager with an empty cache.
    pub fn new(
        store: FileStore,
        schemas: Arc<SchemaRegistry>,
        themes: ThemeConfig,
        host: impl Into<String>,
    ) -> Self {
        Self {
            store,
            schemas,
            themes,
            host: host.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a manager from configuration, sharing compiled schemas.
    pub fn from_config(config: &Config, schemas: Arc<SchemaRegistry>) -> Result<Self> {
        let store = FileStore::new(&config.content.root)?;
        Ok(Self::new(
            store,
            schemas,
            config.themes.clone(),
            config.site.host.clone(),
        ))
    }

    /// Underlying file store.
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Host whose `site` document applies.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the slot of `content_type` has been populated.
    pub fn is_loaded(&self, content_type: ContentType) -> bool {
        self.cache.read().contains_key(&content_type)
    }

    /// Discard every slot and repopulate all content types from disk.
    ///
    /// Holds the write lock for the whole load so no write lands between
    /// reading the folders and swapping the slots. On error the previous
    /// cache stays in place.
    pub fn reload(&self) -> Result<()> {
        info!(root = %self.store.root().display(), "reloading content cache");
        let mut cache = self.cache.write();

        let mut fresh = HashMap::with_capacity(ContentType::ALL.len());
        for ty in ContentType::ALL {
            fresh.insert(ty, self.load_slot(ty)?);
        }

        let counts: Vec<_> = fresh
            .iter()
            .map(|(ty, slot)| format!("{}={}", ty.folder(), slot.items.len()))
            .collect();
        *cache = fresh;
        drop(cache);

        info!(cached = %counts.join(" "), "content cache reloaded");
        Ok(())
    }

    /// Every document of `content_type`, keyed by name.
    pub fn get_items(&self, content_type: ContentType) -> Result<BTreeMap<String, Document>> {
        if let Some(slot) = self.cache.read().get(&content_type) {
            return Ok(slot.items.clone());
        }
        self.with_slot(content_type, |slot| Ok(slot.items.clone()))
    }

    /// Look up one document, reading it from disk on a cache miss.
    ///
    /// Returns `None` when no valid document named `content_id` exists.
    pub fn find_item(&self, content_type: ContentType, content_id: &str) -> Result<Option<Document>> {
        if let Some(slot) = self.cache.read().get(&content_type) {
            if let Some(doc) = slot.items.get(content_id) {
                return Ok(Some(doc.clone()));
            }
            if slot.misses.contains(content_id) {
                return Ok(None);
            }
        }

        self.with_slot(content_type, |slot| {
            if let Some(doc) = slot.items.get(content_id) {
                return Ok(Some(doc.clone()));
            }
            if slot.misses.contains(content_id) {
                return Ok(None);
            }

            debug!(%content_type, content_id, "loading item");
            match self.store.read(&self.schemas, content_type, content_id)? {
                Some(doc) => {
                    slot.items.insert(content_id.to_string(), doc.clone());
                    Ok(Some(doc))
                }
                None => {
                    slot.misses.insert(content_id.to_string());
                    Ok(None)
                }
            }
        })
    }

    /// Look up one document, falling back to the type's default document.
    pub fn get_item(&self, content_type: ContentType, content_id: &str) -> Result<Document> {
        Ok(self
            .find_item(content_type, content_id)?
            .unwrap_or_else(|| content_type.default_document(content_id)))
    }

    /// Validate, persist and cache one document.
    ///
    /// Returns `false` when the document was not written (schema violation,
    /// missing folder or invalid id); cache and disk are then unchanged.
    pub fn set_item(
        &self,
        content_type: ContentType,
        content_id: &str,
        document: Document,
    ) -> Result<bool> {
        self.with_slot(content_type, |slot| {
            let written = self
                .store
                .write(&self.schemas, content_type, content_id, &document)?;
            if written {
                slot.misses.remove(content_id);
                slot.items.insert(content_id.to_string(), document);
            }
            Ok(written)
        })
    }

    /// Delete one document from disk and cache. Missing ids are a no-op.
    pub fn delete_item(&self, content_type: ContentType, content_id: &str) -> Result<()> {
        self.with_slot(content_type, |slot| {
            debug!(%content_type, content_id, "deleting item");
            self.store.delete(content_type, content_id)?;
            slot.items.remove(content_id);
            slot.misses.remove(content_id);
            Ok(())
        })
    }

    /// Menu for `role`: `{name}@{role}` if present, else the plain `{name}` menu.
    ///
    /// A role-specific hit is returned under the plain name.
    pub fn get_user_menu(&self, name: &str, role: Role) -> Result<Document> {
        let scoped = format!("{name}@{role}");
        if let Some(mut menu) = self.find_item(ContentType::Menu, &scoped)? {
            menu.insert("name".to_string(), Value::from(name));
            return Ok(menu);
        }
        self.get_item(ContentType::Menu, name)
    }

    /// Compose the render context of `page`.
    ///
    /// The page gets a derived `path` (`/` for the home page, `/pages/{page}`
    /// otherwise); its `template` field wins over `default_template`.
    pub fn get_content(&self, page: &str, default_template: &str) -> Result<(PageContext, String)> {
        let mut document = self.get_item(ContentType::Page, page)?;

        let path = if page == HOME_PAGE {
            "/".to_string()
        } else {
            format!("/pages/{page}")
        };
        document.insert("path".to_string(), Value::String(path));

        let template = document
            .get("template")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(default_template)
            .to_string();

        let context = PageContext {
            page: document,
            template: template.clone(),
        };
        Ok((context, template))
    }

    /// Store `theme` in the session if it is allowed. Returns whether it was accepted.
    pub fn set_theme(&self, session: &mut ThemeSession, theme: &str) -> bool {
        let accepted = session.select(theme, &self.themes);
        if !accepted {
            debug!(theme, "ignoring theme outside the allow-list");
        }
        accepted
    }

    /// Theme of the session, or the configured default.
    pub fn get_theme(&self, session: &ThemeSession) -> String {
        session
            .theme()
            .unwrap_or(self.themes.default.as_str())
            .to_string()
    }

    /// Allowed theme names.
    pub fn themes(&self) -> &ThemeConfig {
        &self.themes
    }

    /// Site document of the configured host.
    pub fn site(&self) -> Result<Document> {
        self.get_item(ContentType::Site, &self.host)
    }

    /// Stylesheets of the site.
    pub fn site_styles(&self) -> Result<Value> {
        Ok(self.site_field("styles")?.unwrap_or_else(|| Value::Array(Vec::new())))
    }

    /// Scripts of the site.
    pub fn site_scripts(&self) -> Result<Value> {
        Ok(self.site_field("scripts")?.unwrap_or_else(|| Value::Array(Vec::new())))
    }

    /// SEO metadata of the site.
    pub fn site_seo(&self) -> Result<Value> {
        Ok(self.site_field("seo")?.unwrap_or_else(|| Value::Object(Document::new())))
    }

    /// Branding of the site.
    pub fn site_brand(&self) -> Result<Value> {
        Ok(self.site_field("brand")?.unwrap_or_else(|| Value::Object(Document::new())))
    }

    /// Data payload of meta `name`, or the name itself when absent.
    pub fn meta_data(&self, name: &str) -> Result<Value> {
        Ok(self
            .find_item(ContentType::Meta, name)?
            .and_then(|mut meta| meta.remove("data"))
            .unwrap_or_else(|| Value::from(name)))
    }

    /// Link `name` or the default link.
    pub fn link(&self, name: &str) -> Result<Document> {
        self.get_item(ContentType::Link, name)
    }

    /// Menu `name` without role scoping.
    pub fn menu(&self, name: &str) -> Result<Document> {
        self.get_item(ContentType::Menu, name)
    }

    /// Node `name`.
    pub fn node(&self, name: &str) -> Result<Document> {
        self.get_item(ContentType::Node, name)
    }

    /// Page `name`, without derived path.
    pub fn page(&self, name: &str) -> Result<Document> {
        self.get_item(ContentType::Page, name)
    }

    fn site_field(&self, field: &str) -> Result<Option<Value>> {
        Ok(self.site()?.remove(field))
    }

    /// Run `f` on the slot of `content_type` under the write lock,
    /// populating the slot first if needed.
    fn with_slot<R>(
        &self,
        content_type: ContentType,
        f: impl FnOnce(&mut Slot) -> Result<R>,
    ) -> Result<R> {
        let mut cache = self.cache.write();
        let slot = match cache.entry(content_type) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.load_slot(content_type)?),
        };
        f(slot)
    }

    fn load_slot(&self, content_type: ContentType) -> Result<Slot> {
        let mut slot = Slot::default();
        for doc in self.store.load_all(&self.schemas, content_type)? {
            match document_name(&doc).map(str::to_string) {
                Some(name) => {
                    debug!(%content_type, name = %name, "adding item");
                    slot.items.insert(name, doc);
                }
                None => warn!(%content_type, "skipping document without name"),
            }
        }
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;

    fn setup() -> (tempfile::TempDir, ContentManager) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = FileStore::new(dir.path()).expect("open store");
        for ty in ContentType::ALL {
            fs::create_dir_all(store.folder_path(ty)).expect("create folder");
        }
        let themes = ThemeConfig {
            allowed: vec!["default".to_string(), "dark".to_string()],
            default: "default".to_string(),
        };
        let schemas = Arc::new(SchemaRegistry::new().expect("schemas"));
        (dir, ContentManager::new(store, schemas, themes, "localhost"))
    }

    fn put(manager: &ContentManager, ty: ContentType, id: &str, value: Value) {
        let path = manager.store().content_path(ty, id).unwrap();
        fs::write(path, value.to_string()).unwrap();
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_slot_starts_unloaded() {
        let (_dir, manager) = setup();
        assert!(!manager.is_loaded(ContentType::Page));
        manager.get_items(ContentType::Page).unwrap();
        assert!(manager.is_loaded(ContentType::Page));
        assert!(!manager.is_loaded(ContentType::Menu));
    }

    #[test]
    fn test_get_items_keys_by_name() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Node, "intro", json!({"name": "intro", "body": "hi"}));
        put(&manager, ContentType::Node, "file-name", json!({"name": "other"}));

        let items = manager.get_items(ContentType::Node).unwrap();
        let keys: Vec<_> = items.keys().cloned().collect();
        assert_eq!(keys, vec!["intro", "other"]);
    }

    #[test]
    fn test_get_items_reads_disk_once() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Link, "a", json!({"name": "a"}));
        let first = manager.get_items(ContentType::Link).unwrap();

        put(&manager, ContentType::Link, "b", json!({"name": "b"}));
        let second = manager.get_items(ContentType::Link).unwrap();
        assert_eq!(first, second);
        assert!(!second.contains_key("b"));
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let (_dir, manager) = setup();
        manager.get_items(ContentType::Link).unwrap();
        put(&manager, ContentType::Link, "b", json!({"name": "b"}));

        manager.reload().unwrap();
        assert!(manager.get_items(ContentType::Link).unwrap().contains_key("b"));
        for ty in ContentType::ALL {
            assert!(manager.is_loaded(ty));
        }
    }

    #[test]
    fn test_writes_racing_reload_stay_cached() {
        let (_dir, manager) = setup();
        manager.reload().unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..20 {
                    manager.reload().unwrap();
                }
            });
            scope.spawn(|| {
                for i in 0..50 {
                    let id = format!("n{i}");
                    let node = doc(json!({"name": id.clone()}));
                    assert!(manager.set_item(ContentType::Node, &id, node).unwrap());
                }
            });
        });

        let items = manager.get_items(ContentType::Node).unwrap();
        for i in 0..50 {
            assert!(items.contains_key(&format!("n{i}")), "n{i} dropped from cache");
        }
    }

    #[test]
    fn test_unreadable_files_do_not_break_the_slot() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Page, "about", json!({"name": "about"}));
        let folder = manager.store().folder_path(ContentType::Page);
        fs::write(folder.join("about.bak"), [0xff, 0xfe]).unwrap();
        fs::create_dir(folder.join("drafts")).unwrap();

        let items = manager.get_items(ContentType::Page).unwrap();
        assert_eq!(items.keys().collect::<Vec<_>>(), vec!["about"]);

        let (context, _) = manager.get_content("drafts", "page.html").unwrap();
        assert_eq!(context.page["name"], "drafts");
        assert_eq!(context.path(), Some("/pages/drafts"));
    }

    #[test]
    fn test_missing_item_defaults_and_is_cached() {
        let (_dir, manager) = setup();
        let first = manager.get_item(ContentType::Link, "docs").unwrap();
        assert_eq!(
            Value::Object(first.clone()),
            json!({"name": "docs", "icon": "fa fa-file", "text": "docs", "link": "#"})
        );

        // appears on disk after the miss was recorded
        put(&manager, ContentType::Link, "docs", json!({"name": "docs", "link": "/docs"}));
        let second = manager.get_item(ContentType::Link, "docs").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_item_read_on_miss_is_cached() {
        let (_dir, manager) = setup();
        manager.get_items(ContentType::Node).unwrap();

        // written after population, found by the per-item fall-through
        put(&manager, ContentType::Node, "late", json!({"name": "late"}));
        let found = manager.find_item(ContentType::Node, "late").unwrap();
        assert_eq!(found, Some(doc(json!({"name": "late"}))));

        fs::remove_file(manager.store().content_path(ContentType::Node, "late").unwrap()).unwrap();
        assert!(manager.find_item(ContentType::Node, "late").unwrap().is_some());
    }

    #[test]
    fn test_default_shapes() {
        let (_dir, manager) = setup();
        assert_eq!(
            Value::Object(manager.get_item(ContentType::Meta, "tagline").unwrap()),
            json!({"name": "tagline", "data": ""})
        );
        assert_eq!(
            Value::Object(manager.get_item(ContentType::Node, "x").unwrap()),
            json!({"name": "x"})
        );
    }

    #[test]
    fn test_set_item_round_trip() {
        let (_dir, manager) = setup();
        let page = doc(json!({"name": "about", "title": "About", "template": "page.html"}));

        assert!(manager.set_item(ContentType::Page, "about", page.clone()).unwrap());
        assert_eq!(manager.get_item(ContentType::Page, "about").unwrap(), page);

        let on_disk = manager
            .store()
            .read(&SchemaRegistry::new().unwrap(), ContentType::Page, "about")
            .unwrap();
        assert_eq!(on_disk, Some(page));
    }

    #[test]
    fn test_set_item_initializes_slot() {
        let (_dir, manager) = setup();
        assert!(!manager.is_loaded(ContentType::Node));
        assert!(manager.set_item(ContentType::Node, "n", doc(json!({"name": "n"}))).unwrap());
        assert!(manager.is_loaded(ContentType::Node));
    }

    #[test]
    fn test_set_item_clears_recorded_miss() {
        let (_dir, manager) = setup();
        assert!(manager.find_item(ContentType::Node, "n").unwrap().is_none());
        manager.set_item(ContentType::Node, "n", doc(json!({"name": "n"}))).unwrap();
        assert!(manager.find_item(ContentType::Node, "n").unwrap().is_some());
    }

    #[test]
    fn test_set_invalid_item_changes_nothing() {
        let (_dir, manager) = setup();
        let original = json!({"name": "about", "title": "About"});
        put(&manager, ContentType::Page, "about", original.clone());
        let path = manager.store().content_path(ContentType::Page, "about").unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let invalid = doc(json!({"name": "about", "title": ["not", "a", "string"]}));
        assert!(!manager.set_item(ContentType::Page, "about", invalid).unwrap());

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(
            Value::Object(manager.get_item(ContentType::Page, "about").unwrap()),
            original
        );
    }

    #[test]
    fn test_delete_item() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Node, "n", json!({"name": "n", "body": "b"}));
        assert!(manager.find_item(ContentType::Node, "n").unwrap().is_some());

        manager.delete_item(ContentType::Node, "n").unwrap();
        assert!(!manager.store().content_path(ContentType::Node, "n").unwrap().exists());
        assert!(manager.find_item(ContentType::Node, "n").unwrap().is_none());
        assert!(!manager.get_items(ContentType::Node).unwrap().contains_key("n"));
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let (_dir, manager) = setup();
        assert!(manager.delete_item(ContentType::Node, "ghost").is_ok());
        assert!(manager.delete_item(ContentType::Node, "../escape").is_ok());
    }

    #[test]
    fn test_user_menu_role_variant() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Menu, "main", json!({"name": "main", "children": ["home"]}));
        put(
            &manager,
            ContentType::Menu,
            "main@admin",
            json!({"name": "main@admin", "children": ["home", "admin"]}),
        );

        let admin = manager.get_user_menu("main", Role::Admin).unwrap();
        assert_eq!(admin["children"], json!(["home", "admin"]));
        assert_eq!(admin["name"], json!("main"));

        // the cached role variant keeps its own name
        let cached = manager.get_item(ContentType::Menu, "main@admin").unwrap();
        assert_eq!(cached["name"], json!("main@admin"));
    }

    #[test]
    fn test_user_menu_falls_back_unmodified() {
        let (_dir, manager) = setup();
        let main = json!({"name": "main", "children": ["home"]});
        put(&manager, ContentType::Menu, "main", main.clone());

        let guest = manager.get_user_menu("main", Role::Guest).unwrap();
        assert_eq!(Value::Object(guest), main);
    }

    #[test]
    fn test_user_menu_missing_everywhere() {
        let (_dir, manager) = setup();
        let menu = manager.get_user_menu("side", Role::Users).unwrap();
        assert_eq!(Value::Object(menu), json!({"name": "side"}));
    }

    #[test]
    fn test_get_content_home() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Page, "home", json!({"name": "home"}));

        let (context, template) = manager.get_content("home", "home.html").unwrap();
        assert_eq!(template, "home.html");
        assert_eq!(context.path(), Some("/"));
        assert_eq!(context.page["name"], json!("home"));
    }

    #[test]
    fn test_get_content_missing_page() {
        let (_dir, manager) = setup();
        let (context, template) = manager.get_content("about", "page.html").unwrap();
        assert_eq!(template, "page.html");
        assert_eq!(
            Value::Object(context.page),
            json!({"name": "about", "path": "/pages/about"})
        );
    }

    #[test]
    fn test_get_content_document_template_wins() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Page, "faq", json!({"name": "faq", "template": "faq.html"}));

        let (context, template) = manager.get_content("faq", "page.html").unwrap();
        assert_eq!(template, "faq.html");
        assert_eq!(context.template, "faq.html");
    }

    #[test]
    fn test_get_content_does_not_touch_cache() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Page, "about", json!({"name": "about"}));
        manager.get_content("about", "page.html").unwrap();

        let cached = manager.get_item(ContentType::Page, "about").unwrap();
        assert!(!cached.contains_key("path"));
    }

    #[test]
    fn test_page_context_set_path() {
        let (_dir, manager) = setup();
        let (mut context, _) = manager.get_content("tutorials_webrtc", "page.html").unwrap();
        assert_eq!(context.path(), Some("/pages/tutorials_webrtc"));
        context.set_path("/pages/tutorials/webrtc");
        assert_eq!(context.path(), Some("/pages/tutorials/webrtc"));
    }

    #[test]
    fn test_themes() {
        let (_dir, manager) = setup();
        let mut session = ThemeSession::new();
        assert_eq!(manager.get_theme(&session), "default");

        assert!(manager.set_theme(&mut session, "dark"));
        assert_eq!(manager.get_theme(&session), "dark");

        assert!(!manager.set_theme(&mut session, "neon"));
        assert_eq!(manager.get_theme(&session), "dark");
    }

    #[test]
    fn test_site_getters() {
        let (_dir, manager) = setup();
        put(
            &manager,
            ContentType::Site,
            "localhost",
            json!({
                "name": "localhost",
                "brand": {"name": "Acme"},
                "styles": ["main.css"]
            }),
        );

        assert_eq!(manager.site().unwrap()["brand"], json!({"name": "Acme"}));
        assert_eq!(manager.site_styles().unwrap(), json!(["main.css"]));
        assert_eq!(manager.site_scripts().unwrap(), json!([]));
        assert_eq!(manager.site_seo().unwrap(), json!({}));
        assert_eq!(manager.site_brand().unwrap(), json!({"name": "Acme"}));
    }

    #[test]
    fn test_meta_data() {
        let (_dir, manager) = setup();
        put(&manager, ContentType::Meta, "author", json!({"name": "author", "data": {"nick": "jd"}}));
        put(&manager, ContentType::Meta, "empty", json!({"name": "empty"}));

        assert_eq!(manager.meta_data("author").unwrap(), json!({"nick": "jd"}));
        assert_eq!(manager.meta_data("empty").unwrap(), json!("empty"));
        assert_eq!(manager.meta_data("missing").unwrap(), json!("missing"));
    }
}
