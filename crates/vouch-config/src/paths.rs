//! Where configuration and submission data live on disk.

use crate::{ConfigError, EngineConfig};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Git-tracked project configuration.
pub const PROJECT_CONFIG_FILE: &str = "vouch.toml";

/// Untracked per-checkout overrides.
pub const LOCAL_CONFIG_FILE: &str = "vouch.local.toml";

const USER_CONFIG_FILE: &str = "config.toml";

/// Locations of the configuration layers.
pub struct Paths {
    dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            dirs: ProjectDirs::from("org", "Vouch", "vouch"),
        }
    }

    /// `~/.config/vouch/config.toml` on Linux, the platform equivalent elsewhere.
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        self.dirs
            .as_ref()
            .map(|dirs| dirs.config_dir().join(USER_CONFIG_FILE))
            .ok_or_else(|| ConfigError::XdgError("no home directory for the user config".to_string()))
    }

    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(PROJECT_CONFIG_FILE)
    }

    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join(LOCAL_CONFIG_FILE)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Files of one submission: `<fs_root>/<release>/<project>/`.
    pub fn submission_dir(&self, release: &str, project: &str) -> PathBuf {
        self.fs_root.join(release).join(project)
    }

    /// Output of one validation run: `<report_dir>/<release>/<project>/<run_id>/`.
    pub fn run_dir(&self, release: &str, project: &str, run_id: &str) -> PathBuf {
        self.report_dir.join(release).join(project).join(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_config_file() {
        // Absent on hosts without a home directory
        if let Ok(file) = Paths::new().user_config_file() {
            assert!(file.ends_with(USER_CONFIG_FILE));
            assert!(file.to_string_lossy().contains("vouch"));
        }
    }

    #[test]
    fn test_layer_files() {
        let dir = Path::new("/srv/vouch");
        assert_eq!(Paths::project_config_file(dir), dir.join("vouch.toml"));
        assert_eq!(Paths::local_config_file(dir), dir.join("vouch.local.toml"));
    }

    #[test]
    fn test_storage_layout() {
        let engine = EngineConfig {
            fs_root: PathBuf::from("/data/submissions"),
            report_dir: PathBuf::from("/data/reports"),
            ..EngineConfig::default()
        };

        assert_eq!(
            engine.submission_dir("release1", "PACA-CA"),
            PathBuf::from("/data/submissions/release1/PACA-CA")
        );
        assert_eq!(
            engine.run_dir("release1", "PACA-CA", "run-7"),
            PathBuf::from("/data/reports/release1/PACA-CA/run-7")
        );
    }
}
