//! Configuration loading seam.

use std::sync::Arc;

use ortho_config::OrthoError;

use hearth_config::{ApplicationPaths, Config};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the host configuration for the resolved paths.
    fn load(&self, paths: &ApplicationPaths) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load_for_paths`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self, paths: &ApplicationPaths) -> Result<Config, Arc<OrthoError>> {
        Config::load_for_paths(paths)
    }
}

/// Loader that always returns the same configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Builds a loader returning `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _paths: &ApplicationPaths) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}
