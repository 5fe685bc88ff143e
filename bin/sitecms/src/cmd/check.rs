//! Check command - validate configuration and content

use std::{fs, path::Path};

use color_eyre::eyre::{Result, bail};
use serde_json::Value;
use sitecms_core::{Config, ContentType, SchemaRegistry};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
    documents: usize,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Whether any error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether any warning was recorded.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Recorded errors.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Recorded warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Run the check command.
///
/// Validates configuration and every stored document.
pub fn run(config_path: &Path, strict: bool) -> Result<()> {
    tracing::info!(?config_path, strict, "Checking configuration and content");

    let mut result = ValidationResult::default();

    println!("Checking configuration...");
    let config = match Config::load_with_env(config_path) {
        Ok(c) => {
            println!("  ✓ Configuration valid");
            Some(c)
        }
        Err(e) => {
            result.add_error(format!("Configuration error: {e}"));
            println!("  ✗ Configuration invalid: {e}");
            None
        }
    };

    if let Some(ref cfg) = config {
        println!("\nChecking content documents...");
        let schemas = SchemaRegistry::new()?;
        validate_content(&cfg.content.root, &schemas, &mut result)?;
        println!("  {} document(s) checked", result.documents);

        println!("\nChecking directories...");
        check_directories(cfg, &mut result);
    }

    println!();
    println!("Summary:");
    println!("  Errors:   {}", result.errors.len());
    println!("  Warnings: {}", result.warnings.len());

    if result.has_errors() {
        println!();
        println!("Errors:");
        for err in &result.errors {
            println!("  ✗ {err}");
        }
    }

    if result.has_warnings() {
        println!();
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  ⚠ {warn}");
        }
    }

    if result.has_errors() {
        bail!("Validation failed with {} error(s)", result.errors.len());
    }

    if strict && result.has_warnings() {
        bail!(
            "Validation failed with {} warning(s) (strict mode)",
            result.warnings.len()
        );
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

/// Validate every file of every type folder under `root` against its schema.
pub fn validate_content(
    root: &Path,
    schemas: &SchemaRegistry,
    result: &mut ValidationResult,
) -> Result<()> {
    if !root.exists() {
        result.add_warning(format!("Content root {} does not exist", root.display()));
        return Ok(());
    }

    for ty in ContentType::ALL {
        let folder = root.join(ty.folder());
        if !folder.is_dir() {
            result.add_warning(format!("Missing {ty} folder: {}", folder.display()));
            continue;
        }

        let mut entries: Vec<_> = fs::read_dir(&folder)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        for path in entries {
            let name = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            if name.starts_with('.') {
                continue;
            }
            result.documents += 1;
            validate_document(ty, &name, &path, schemas, result);
        }
    }

    Ok(())
}

fn validate_document(
    ty: ContentType,
    name: &str,
    path: &Path,
    schemas: &SchemaRegistry,
    result: &mut ValidationResult,
) {
    let label = format!("{}/{name}", ty.folder());

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            result.add_error(format!("{label}: {e}"));
            return;
        }
    };

    let value: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            result.add_error(format!("{label}: invalid JSON: {e}"));
            return;
        }
    };

    if let Err(violation) = schemas.validate(ty, &value) {
        result.add_error(format!("{label}: {violation}"));
        return;
    }

    let doc_name = value.get("name").and_then(Value::as_str);
    if let Some(doc_name) = doc_name.filter(|n| *n != name) {
        result.add_warning(format!(
            "{label}: document name '{doc_name}' differs from file name"
        ));
    }
}

/// Check that the directories the server reads from exist.
fn check_directories(config: &Config, result: &mut ValidationResult) {
    let static_dir = &config.server.static_dir;
    if !static_dir.exists() {
        result.add_warning(format!(
            "Static directory {} does not exist",
            static_dir.display()
        ));
    }

    let templates_dir = &config.server.templates_dir;
    if !templates_dir.exists() {
        tracing::debug!(dir = %templates_dir.display(), "No template overrides, using built-in templates");
    }
}
