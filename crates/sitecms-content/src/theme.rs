//! Session-scoped theme selection.

use sitecms_core::config::ThemeConfig;

/// Theme chosen by one visitor session.
///
/// Lives in the request/session scope, never in the content cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeSession {
    theme: Option<String>,
    changed: bool,
}

impl ThemeSession {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a session from a previously stored theme, keeping it only if
    /// it is still allowed.
    #[must_use]
    pub fn restore(stored: Option<&str>, themes: &ThemeConfig) -> Self {
        let theme = stored
            .filter(|t| themes.is_allowed(t))
            .map(str::to_string);
        Self {
            theme,
            changed: false,
        }
    }

    /// Select `theme` if it is in the allow-list. Returns whether it was accepted.
    pub fn select(&mut self, theme: &str, themes: &ThemeConfig) -> bool {
        if !themes.is_allowed(theme) {
            return false;
        }
        if self.theme.as_deref() != Some(theme) {
            self.theme = Some(theme.to_string());
            self.changed = true;
        }
        true
    }

    /// Theme stored in the session, if any.
    #[must_use]
    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    /// Whether the session theme changed since it was restored.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.changed
    }
}
