//! Runtime configuration loaded from `~/.pixelpal/pixelpal.toml`.
//!
//! A missing file yields defaults. A malformed file is an error so callers
//! can decide whether to fall back (the CLI does, with a warning).
//!
//! ```toml
//! group_id = "group.com.pixelpalfit.app"
//! frame_interval_ms = 800
//!
//! [live]
//! enabled = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::FRAME_INTERVAL;
use crate::error::{PalError, Result};
use crate::storage::{StorageConfig, DEFAULT_GROUP_ID};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PalConfig {
    pub group_id: String,
    pub frame_interval_ms: u64,
    pub live: LiveConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Whether the simulated host allows live sessions at all.
    pub enabled: bool,
}

impl Default for PalConfig {
    fn default() -> Self {
        Self {
            group_id: DEFAULT_GROUP_ID.to_string(),
            frame_interval_ms: FRAME_INTERVAL.as_millis() as u64,
            live: LiveConfig::default(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl PalConfig {
    /// Animation period, never shorter than 50ms.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(50))
    }

    /// Storage rooted at `root`, scoped to the configured group.
    pub fn storage_at(&self, root: &Path) -> StorageConfig {
        StorageConfig::with_root(root.to_path_buf()).with_group_id(self.group_id.clone())
    }
}

/// Loads configuration from `path`, or from the default location when `None`.
pub fn load_config(path: Option<PathBuf>) -> Result<PalConfig> {
    let config_path = match path {
        Some(path) => path,
        None => match StorageConfig::from_home() {
            Some(storage) => storage.config_file(),
            None => return Ok(PalConfig::default()),
        },
    };

    if !config_path.exists() {
        return Ok(PalConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| PalError::Io {
        context: format!("Failed to read config {}", config_path.display()),
        source,
    })?;
    toml::from_str::<PalConfig>(&content).map_err(|err| PalError::ConfigMalformed {
        path: config_path.clone(),
        details: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("missing.toml");
        let config = load_config(Some(path)).expect("load config");
        assert_eq!(config, PalConfig::default());
        assert_eq!(config.frame_interval(), Duration::from_millis(800));
        assert!(config.live.enabled);
    }

    #[test]
    fn load_config_parses_fields() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("pixelpal.toml");
        fs_err::write(
            &path,
            r#"
group_id = "group.test.pal"
frame_interval_ms = 400

[live]
enabled = false
"#,
        )
        .expect("write config");

        let config = load_config(Some(path)).expect("load config");
        assert_eq!(config.group_id, "group.test.pal");
        assert_eq!(config.frame_interval(), Duration::from_millis(400));
        assert!(!config.live.enabled);
    }

    #[test]
    fn load_config_partial_file_keeps_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("pixelpal.toml");
        fs_err::write(&path, "frame_interval_ms = 1000\n").expect("write config");

        let config = load_config(Some(path)).expect("load config");
        assert_eq!(config.group_id, DEFAULT_GROUP_ID);
        assert!(config.live.enabled);
    }

    #[test]
    fn load_config_rejects_malformed_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("pixelpal.toml");
        fs_err::write(&path, "frame_interval_ms = \"fast\"\n").expect("write config");

        let err = load_config(Some(path)).unwrap_err();
        assert!(matches!(err, PalError::ConfigMalformed { .. }));
    }

    #[test]
    fn frame_interval_has_floor() {
        let config = PalConfig {
            frame_interval_ms: 1,
            ..PalConfig::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(50));
    }
}
