//! Storage configuration and path management for Pixel Pal.
//!
//! `StorageConfig` is the single place that decides where Pixel Pal data
//! lives on disk. Production code uses `StorageConfig::from_home()` (rooted at
//! `~/.pixelpal`); tests inject a temp directory with `with_root`.
//!
//! The shared storage region is a group container named after the app group
//! identifier. Every process of the app (main app, widget, live session
//! extension, CLI) resolves the same container from the same group id.

use std::path::{Path, PathBuf};

use fs2::FileExt;

/// App group shared by the app and its extensions.
pub const DEFAULT_GROUP_ID: &str = "group.com.pixelpalfit.app";

/// Central configuration for all Pixel Pal storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all Pixel Pal data (default: ~/.pixelpal)
    root: PathBuf,
    /// App group identifier naming the shared container
    group_id: String,
}

impl StorageConfig {
    /// Resolves the default root under the home directory.
    /// Returns `None` when no home directory can be determined.
    pub fn from_home() -> Option<Self> {
        dirs::home_dir().map(|home| Self::with_root(home.join(".pixelpal")))
    }

    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            group_id: DEFAULT_GROUP_ID.to_string(),
        }
    }

    /// Returns a copy scoped to a different app group.
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Shared Container
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to the shared group container.
    /// Example: ~/.pixelpal/groups/group.com.pixelpalfit.app/
    pub fn group_dir(&self) -> PathBuf {
        self.root.join("groups").join(&self.group_id)
    }

    /// Path to the shared state record read by every surface.
    pub fn shared_state_file(&self) -> PathBuf {
        self.group_dir().join("shared-state.json")
    }

    /// Path to the simulated host session registry (CLI host).
    pub fn host_sessions_file(&self) -> PathBuf {
        self.group_dir().join("live-sessions.json")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // App Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to pixelpal.toml (app preferences).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("pixelpal.toml")
    }

    /// Path to logs/ directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directory Creation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Ensures the shared container exists.
    pub fn ensure_group_dir(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(self.group_dir())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cross-process locking
// ═══════════════════════════════════════════════════════════════════════════════

/// Exclusive advisory lock guarding read-modify-write of one data file.
///
/// The lock lives in a sidecar (`shared-state.json` → `shared-state.lock`)
/// so the data file itself can still be replaced by atomic rename. Every
/// process and thread opens its own handle, so they exclude each other.
/// Released on drop.
pub struct RegionLock {
    file: fs_err::File,
}

impl RegionLock {
    /// Blocks until the lock for `data_path` is held.
    pub fn acquire(data_path: &Path) -> std::io::Result<Self> {
        let file = fs_err::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path_for(data_path))?;
        file.file().lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file.file());
    }
}

/// Sidecar lock path for a data file.
pub fn lock_path_for(data_path: &Path) -> PathBuf {
    data_path.with_extension("lock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_with_root_uses_default_group() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/pal"));
        assert_eq!(config.group_id(), DEFAULT_GROUP_ID);
        assert_eq!(
            config.group_dir(),
            PathBuf::from("/tmp/pal/groups/group.com.pixelpalfit.app")
        );
    }

    #[test]
    fn test_shared_state_file_lives_in_group_dir() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/pal"));
        assert!(config.shared_state_file().starts_with(config.group_dir()));
        assert!(config.host_sessions_file().starts_with(config.group_dir()));
    }

    #[test]
    fn test_with_group_id_changes_container() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/pal")).with_group_id("group.test");
        assert_eq!(config.group_dir(), PathBuf::from("/tmp/pal/groups/group.test"));
    }

    #[test]
    fn test_app_files_live_under_root() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/pal"));
        assert_eq!(config.config_file(), PathBuf::from("/tmp/pal/pixelpal.toml"));
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/pal/logs"));
    }

    #[test]
    fn test_ensure_group_dir_creates_container() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().join("pal"));
        config.ensure_group_dir().unwrap();
        assert!(config.group_dir().is_dir());
    }

    #[test]
    fn test_lock_path_is_sidecar() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/pal"));
        assert_eq!(
            lock_path_for(&config.shared_state_file()),
            config.group_dir().join("shared-state.lock")
        );
    }

    #[test]
    fn test_region_lock_excludes_second_holder() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        let temp = TempDir::new().unwrap();
        let data = temp.path().join("shared-state.json");
        let held = RegionLock::acquire(&data).unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let data = data.clone();
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _lock = RegionLock::acquire(&data).unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(held);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
