//! Localization support for user-facing host text.
//!
//! Builds a Fluent-backed localizer from the embedded en-US catalogue and
//! falls back to [`NoOpLocalizer`] when the catalogue cannot be loaded, so
//! the host never fails because of a translation problem.

use ortho_config::{FluentLocalizer, Localizer, NoOpLocalizer};

/// Embedded en-US Fluent catalogue.
pub(crate) static HEARTHD_EN_US: &str = include_str!("../locales/en-US/messages.ftl");

/// Message definitions: `(fluent_id, english_fallback)`.
///
/// Fallbacks must match `locales/en-US/messages.ftl`; the
/// `fluent_and_fallback_text_match` test guards against drift.
pub mod messages {
    /// Logged when the headless shell takes over the foreground.
    pub const HEADLESS_RUNNING: (&str, &str) = (
        "hearthd-shell-headless-running",
        "Service host running without a user interface.",
    );
    /// Logged when the headless shell returns.
    pub const HEADLESS_STOPPING: (&str, &str) =
        ("hearthd-shell-headless-stopping", "Service host stopping.");
    /// Prefix printed before the version for `-v`.
    pub const VERSION_PREFIX: (&str, &str) = ("hearthd-version-prefix", "hearthd");
}

/// Resolves a message definition through `localizer`.
#[must_use]
pub fn message(localizer: &dyn Localizer, entry: &(&str, &str)) -> String {
    localizer.message(entry.0, None, entry.1)
}

/// Builds the host localizer.
#[must_use]
pub fn build_localizer() -> Box<dyn Localizer> {
    match FluentLocalizer::with_en_us_defaults([HEARTHD_EN_US]) {
        Ok(localizer) => Box::new(localizer),
        Err(_) => Box::new(NoOpLocalizer),
    }
}
