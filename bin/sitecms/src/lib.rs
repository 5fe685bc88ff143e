//! sitecms CLI Library
//!
//! HTTP surface and command implementations of the sitecms binary.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (serve, freeze, check, new)
//! - [`server`] - Router, route handlers and per-request theme handling
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sitecms::{
//!     Config,
//!     server::{AppState, create_router},
//! };
//!
//! let state = AppState::new(Arc::new(Config::default())).unwrap();
//! let app = create_router(state);
//! ```

pub mod cmd;
pub mod server;

pub use sitecms_content::{ContentManager, ContentService};
pub use sitecms_core::Config;
pub use sitecms_render::Renderer;

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
