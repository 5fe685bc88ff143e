//! sitecms Core Library
//!
//! Core types, content schemas, configuration, and error handling for the
//! sitecms content-backed website.

pub mod config;
pub mod content;
pub mod error;
pub mod schema;

pub use config::{Config, ManagerLifetime};
pub use content::{ContentType, Document, Role};
pub use error::{CoreError, Result};
pub use schema::{SchemaRegistry, SchemaViolation};
