//! Configuration loader with multi-source merging

use crate::{Paths, VouchConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "VOUCH".to_string(),
            include_user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "VOUCH")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/vouch/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Configuration files that exist, lowest precedence first.
    pub fn file_layers(&self) -> Vec<PathBuf> {
        let user = self
            .include_user_config
            .then(|| Paths::new().user_config_file().ok())
            .flatten();

        user.into_iter()
            .chain([
                Paths::project_config_file(&self.project_dir),
                Paths::local_config_file(&self.project_dir),
            ])
            .filter(|path| path.is_file())
            .collect()
    }

    /// Merges defaults, the file layers and `<PREFIX>_SECTION__KEY`
    /// environment variables, then validates the result.
    pub fn load(self) -> Result<VouchConfig> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&VouchConfig::default())?);

        for path in self.file_layers() {
            tracing::debug!(path = %path.display(), "loading configuration layer");
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        // VOUCH_ENGINE__MAX_SIMULTANEOUS=2
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut merged: VouchConfig = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .context("Failed to merge configuration layers")?;
        merged.validate().context("Configuration failed validation")?;
        merged.resolve_paths(&self.project_dir);

        Ok(merged)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
