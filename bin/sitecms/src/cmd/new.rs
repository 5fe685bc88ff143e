//! New command - create a content document with default fields

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use sitecms_content::ContentManager;
use sitecms_core::{Config, ContentType, SchemaRegistry};

/// Run the new command.
pub fn run(config_path: &Path, content_type: &str, name: &str) -> Result<()> {
    tracing::info!(?config_path, content_type, name, "Creating new content");

    let config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;
    let content_type: ContentType = content_type.parse()?;

    let path = create(&config, content_type, name)?;

    tracing::info!(path = %path.display(), "Created new content document");
    println!("Created: {}", path.display());

    Ok(())
}

/// Write the default document of `content_type` named `name`.
///
/// Refuses to overwrite an existing file.
pub fn create(config: &Config, content_type: ContentType, name: &str) -> Result<PathBuf> {
    let schemas = Arc::new(SchemaRegistry::new()?);
    let manager = ContentManager::from_config(config, schemas)?;

    let path = manager
        .store()
        .content_path(content_type, name)
        .ok_or_else(|| eyre!("Invalid document name: '{name}'"))?;
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    fs::create_dir_all(manager.store().folder_path(content_type))
        .wrap_err("Failed to create content folder")?;

    let document = content_type.default_document(name);
    if !manager.set_item(content_type, name, document)? {
        bail!("Failed to write {}", path.display());
    }

    Ok(path)
}
