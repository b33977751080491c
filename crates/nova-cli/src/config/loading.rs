use crate::config::{CONFIG_FILE, NovaConfig};
use crate::error::{ConfigError, Result};
use figment::{
    Figment,
    providers::{Env, Format as _, Json},
};
use std::path::{Path, PathBuf};

impl NovaConfig {
    /// Load configuration for a project.
    ///
    /// `config_path` overrides the default `<root>/nova.config.json`. A missing
    /// file is not an error; the defaults apply. Priority: environment
    /// variables (`NOVA_SERVER__PORT=3000`) > config file > defaults.
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let path = Self::config_file(root, config_path);

        // Defaults come from `#[serde(default)]`. Seeding them as a provider
        // would clash with the `src`/`http` key aliases.
        let mut figment = Figment::new();

        if path.is_file() {
            tracing::debug!("Loading config from {}", path.display());
            figment = figment.merge(Json::file(&path));
        } else if config_path.is_some() {
            return Err(crate::CliError::FileNotFound(path));
        }

        figment = figment.merge(Env::prefixed("NOVA_").split("__"));

        let config: Self = figment.extract().map_err(|e| ConfigError::InvalidFile {
            path: path.clone(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file location against the project root.
    pub fn config_file(root: &Path, config_path: Option<&Path>) -> PathBuf {
        match config_path {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => root.join(p),
            None => root.join(CONFIG_FILE),
        }
    }
}
