//! sitecms Content Library
//!
//! The typed, cached front door to the JSON documents stored under the
//! content root.
//!
//! # Modules
//!
//! - [`store`] - Path resolution and file I/O per content type
//! - [`manager`] - Cache-and-CRUD layer with typed getters
//! - [`theme`] - Session-scoped theme selection
//! - [`service`] - Construction point deciding the manager lifetime

pub mod manager;
pub mod service;
pub mod store;
pub mod theme;

pub use manager::{ContentManager, PageContext};
pub use service::ContentService;
pub use store::{FileStore, StoreEntry, StoreError};
pub use theme::ThemeSession;
