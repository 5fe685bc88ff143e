//! Construction point for content managers.
//!
//! The hosting layer asks the service for a manager per request; whether that
//! is one shared manager or a fresh one is decided by configuration.

use std::sync::Arc;

use sitecms_core::{Config, ManagerLifetime, SchemaRegistry};
use tracing::{debug, info};

use crate::{manager::ContentManager, store::Result};

/// Hands out content managers according to the configured lifetime.
#[derive(Debug, Clone)]
pub struct ContentService {
    config: Arc<Config>,
    schemas: Arc<SchemaRegistry>,
    shared: Option<Arc<ContentManager>>,
}

impl ContentService {
    /// Build the service, compiling schemas once.
    ///
    /// With process lifetime the shared manager is created here and, when
    /// `content.preload` is set, populated for every content type.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let schemas = Arc::new(SchemaRegistry::new()?);

        let shared = match config.content.lifetime {
            ManagerLifetime::Process => {
                let manager = ContentManager::from_config(&config, schemas.clone())?;
                if config.content.preload {
                    manager.reload()?;
                }
                Some(Arc::new(manager))
            }
            ManagerLifetime::Request => None,
        };

        info!(
            lifetime = ?config.content.lifetime,
            root = %config.content.root.display(),
            "content service ready"
        );

        Ok(Self {
            config,
            schemas,
            shared,
        })
    }

    /// Configured lifetime.
    pub fn lifetime(&self) -> ManagerLifetime {
        self.config.content.lifetime
    }

    /// Manager to use for one request.
    pub fn acquire(&self) -> Result<Arc<ContentManager>> {
        match &self.shared {
            Some(manager) => Ok(manager.clone()),
            None => {
                debug!("creating request-scoped content manager");
                let manager = ContentManager::from_config(&self.config, self.schemas.clone())?;
                Ok(Arc::new(manager))
            }
        }
    }

    /// Repopulate the shared manager. Per-request managers always start fresh.
    pub fn reload(&self) -> Result<()> {
        match &self.shared {
            Some(manager) => manager.reload(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use sitecms_core::ContentType;

    use super::*;

    fn config(root: &std::path::Path, lifetime: ManagerLifetime, preload: bool) -> Arc<Config> {
        let mut config = Config::default();
        config.content.root = root.to_path_buf();
        config.content.lifetime = lifetime;
        config.content.preload = preload;
        Arc::new(config)
    }

    fn write_page(root: &std::path::Path, name: &str) {
        let folder = root.join("pages");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(name), format!(r#"{{"name": "{name}"}}"#)).unwrap();
    }

    #[test]
    fn test_process_lifetime_shares_manager() {
        let dir = tempfile::tempdir().unwrap();
        let service = ContentService::new(config(dir.path(), ManagerLifetime::Process, false)).unwrap();

        let a = service.acquire().unwrap();
        let b = service.acquire().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(service.lifetime(), ManagerLifetime::Process);
    }

    #[test]
    fn test_preload_populates_every_type() {
        let dir = tempfile::tempdir().unwrap();
        let service = ContentService::new(config(dir.path(), ManagerLifetime::Process, true)).unwrap();
        let manager = service.acquire().unwrap();
        for ty in ContentType::ALL {
            assert!(manager.is_loaded(ty));
        }
    }

    #[test]
    fn test_request_lifetime_builds_fresh_managers() {
        let dir = tempfile::tempdir().unwrap();
        let service = ContentService::new(config(dir.path(), ManagerLifetime::Request, true)).unwrap();

        let first = service.acquire().unwrap();
        assert!(!first.is_loaded(ContentType::Page));
        assert!(first.find_item(ContentType::Page, "about").unwrap().is_none());

        write_page(dir.path(), "about");
        let second = service.acquire().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.find_item(ContentType::Page, "about").unwrap().is_some());
    }

    #[test]
    fn test_reload_refreshes_shared_manager() {
        let dir = tempfile::tempdir().unwrap();
        let service = ContentService::new(config(dir.path(), ManagerLifetime::Process, true)).unwrap();
        let manager = service.acquire().unwrap();
        assert!(manager.get_items(ContentType::Page).unwrap().is_empty());

        write_page(dir.path(), "about");
        service.reload().unwrap();
        assert!(manager.get_items(ContentType::Page).unwrap().contains_key("about"));
    }
}
