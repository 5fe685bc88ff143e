//! sitecms Render Library
//!
//! Turns page contexts into HTML.
//!
//! # Modules
//!
//! - [`template`] - Template environment with on-disk overrides and embedded defaults
//! - [`context`] - Per-request accessors exposed to templates

pub mod context;
pub mod template;

pub use context::{RequestScope, inject, template_context};
pub use template::{RenderError, Renderer};
