//! File store for content documents.
//!
//! Every document lives at `{root}/{folder}/{id}`, where `folder` is the plural
//! of the content type tag and `id` is the document name.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::Value;
use sitecms_core::{ContentType, CoreError, Document, SchemaRegistry};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Content store errors.
///
/// Schema violations and malformed files are not errors here: they are logged
/// and reported as absent documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for store and manager operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// One file found in a content type folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// File name, which is the content id.
    pub name: String,

    /// Full path of the file.
    pub path: PathBuf,
}

/// JSON file persistence under a content root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
            debug!(root = %root.display(), "created content root");
        }
        Ok(Self { root })
    }

    /// Content root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder holding every document of `content_type`.
    pub fn folder_path(&self, content_type: ContentType) -> PathBuf {
        self.root.join(content_type.folder())
    }

    /// Path of one document, or `None` if `content_id` is not a plain file name.
    pub fn content_path(&self, content_type: ContentType, content_id: &str) -> Option<PathBuf> {
        is_valid_id(content_id).then(|| self.folder_path(content_type).join(content_id))
    }

    /// List every file in the folder of `content_type`, sorted by name.
    ///
    /// A missing folder lists as empty.
    pub fn list(&self, content_type: ContentType) -> Result<Vec<StoreEntry>> {
        let folder = self.folder_path(content_type);
        let dir = match fs::read_dir(&folder) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(folder = %folder.display(), "content folder missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            entries.push(StoreEntry {
                name,
                path: entry.path(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Read and validate one document.
    ///
    /// Returns `None` when the file is missing or not a regular file, is not
    /// UTF-8 JSON, is not a JSON object, or violates the schema of
    /// `content_type`. Only genuine I/O failures are errors.
    pub fn read(
        &self,
        schemas: &SchemaRegistry,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<Option<Document>> {
        let Some(path) = self.content_path(content_type, content_id) else {
            debug!(%content_type, content_id, "rejected content id");
            return Ok(None);
        };

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                warn!(path = %path.display(), "content path is not a file");
                return Ok(None);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        debug!(path = %path.display(), "loading content");
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let value: Value = match serde_json::from_slice(&raw) {
            Ok(value) => value,
            Err(e) => {
                error!(%content_type, content_id, error = %e, "malformed content file");
                return Ok(None);
            }
        };

        if let Err(violation) = schemas.validate(content_type, &value) {
            error!(%content_type, content_id, error = %violation, "invalid content");
            return Ok(None);
        }

        match value {
            Value::Object(doc) => Ok(Some(doc)),
            _ => Ok(None),
        }
    }

    /// Read every valid document of `content_type`.
    pub fn load_all(
        &self,
        schemas: &SchemaRegistry,
        content_type: ContentType,
    ) -> Result<Vec<Document>> {
        debug!(%content_type, "loading items");
        let mut documents = Vec::new();
        for entry in self.list(content_type)? {
            if let Some(doc) = self.read(schemas, content_type, &entry.name)? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    /// Validate and persist one document.
    ///
    /// Returns `false` without touching disk when the document violates the
    /// schema or the folder of `content_type` does not exist.
    pub fn write(
        &self,
        schemas: &SchemaRegistry,
        content_type: ContentType,
        content_id: &str,
        document: &Document,
    ) -> Result<bool> {
        let Some(path) = self.content_path(content_type, content_id) else {
            warn!(%content_type, content_id, "refusing to write invalid content id");
            return Ok(false);
        };

        let value = Value::Object(document.clone());
        if let Err(violation) = schemas.validate(content_type, &value) {
            error!(%content_type, content_id, error = %violation, "not saving invalid content");
            return Ok(false);
        }

        if !self.folder_path(content_type).is_dir() {
            debug!(%content_type, content_id, "content folder missing, skipping write");
            return Ok(false);
        }

        let json = serde_json::to_string_pretty(&value)?;
        fs::write(&path, json)?;
        debug!(path = %path.display(), "saved content");
        Ok(true)
    }

    /// Remove one document. Returns whether a file was removed.
    pub fn delete(&self, content_type: ContentType, content_id: &str) -> Result<bool> {
        let Some(path) = self.content_path(content_type, content_id) else {
            return Ok(false);
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "deleted content");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// A content id must be a single, non-hidden path component.
fn is_valid_id(content_id: &str) -> bool {
    !content_id.is_empty()
        && !content_id.starts_with('.')
        && !content_id.contains(['/', '\\'])
}
