//! File-backed host session registry.
//!
//! Stands in for the OS live session registry when driving the core from a
//! terminal. Sessions live in `live-sessions.json` inside the group container,
//! so they survive across `pixelpal` invocations the way OS sessions survive
//! app restarts.
//!
//! ```json
//! {
//!   "sessions": {
//!     "01J...": { "content": {...}, "created_at": "...", "updated_at": "..." }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use pal_core::{ContentPayload, Dismissal, HostError, RegionLock, SessionHandle, SessionHost};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedSession {
    pub content: ContentPayload,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    sessions: BTreeMap<String, HostedSession>,
}

pub struct FileSessionHost {
    path: PathBuf,
    enabled: bool,
}

impl FileSessionHost {
    pub fn new(path: PathBuf, enabled: bool) -> Self {
        Self { path, enabled }
    }

    /// Sessions currently registered, ordered by id (creation order for ULIDs).
    pub fn sessions(&self) -> Vec<(SessionHandle, HostedSession)> {
        load_registry(&self.path)
            .sessions
            .into_iter()
            .map(|(id, session)| (SessionHandle::new(id), session))
            .collect()
    }

    fn modify<T>(
        &self,
        apply: impl FnOnce(&mut RegistryFile) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| HostError::Unavailable(err.to_string()))?;
        }
        // Every invocation of the CLI is its own process; serialize them.
        let _lock = RegionLock::acquire(&self.path)
            .map_err(|err| HostError::Unavailable(err.to_string()))?;
        let mut registry = load_registry(&self.path);
        let result = apply(&mut registry)?;
        save_registry(&self.path, &registry)
            .map_err(|err| HostError::Unavailable(err.to_string()))?;
        Ok(result)
    }
}

impl SessionHost for FileSessionHost {
    fn capability_enabled(&self) -> bool {
        self.enabled
    }

    fn list_sessions(&self) -> Vec<SessionHandle> {
        self.sessions().into_iter().map(|(handle, _)| handle).collect()
    }

    fn request_session(&self, content: &ContentPayload) -> Result<SessionHandle, HostError> {
        let id = ulid::Ulid::new().to_string();
        let now = Utc::now().to_rfc3339();
        self.modify(|registry| {
            registry.sessions.insert(
                id.clone(),
                HostedSession {
                    content: *content,
                    created_at: now.clone(),
                    updated_at: now,
                },
            );
            Ok(())
        })?;
        debug!(session = %id, "Registered live session");
        Ok(SessionHandle::new(id))
    }

    fn update_session(
        &self,
        handle: &SessionHandle,
        content: &ContentPayload,
    ) -> Result<(), HostError> {
        self.modify(|registry| match registry.sessions.get_mut(&handle.id) {
            Some(session) => {
                session.content = *content;
                session.updated_at = Utc::now().to_rfc3339();
                Ok(())
            }
            None => Err(HostError::UnknownSession(handle.id.clone())),
        })
    }

    fn end_session(&self, handle: &SessionHandle, dismissal: Dismissal) -> Result<(), HostError> {
        if dismissal == Dismissal::Deferred {
            debug!(session = %handle, "Deferred dismissal treated as immediate");
        }
        self.modify(|registry| match registry.sessions.remove(&handle.id) {
            Some(_) => Ok(()),
            None => Err(HostError::UnknownSession(handle.id.clone())),
        })
    }
}

fn load_registry(path: &Path) -> RegistryFile {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return RegistryFile::default(),
        Err(err) => {
            warn!(error = %err, "Failed to read live session registry");
            return RegistryFile::default();
        }
    };
    if content.trim().is_empty() {
        return RegistryFile::default();
    }
    serde_json::from_str(&content).unwrap_or_else(|err| {
        warn!(error = %err, "Corrupt live session registry; treating as empty");
        RegistryFile::default()
    })
}

fn save_registry(path: &Path, registry: &RegistryFile) -> Result<(), String> {
    let parent = path
        .parent()
        .ok_or_else(|| "Registry path has no parent directory".to_string())?;
    fs_err::create_dir_all(parent).map_err(|e| format!("Failed to create registry dir: {}", e))?;

    let content = serde_json::to_string_pretty(registry)
        .map_err(|e| format!("Failed to serialize registry: {}", e))?;
    let mut temp_file =
        NamedTempFile::new_in(parent).map_err(|e| format!("Temp file error: {}", e))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write registry: {}", e))?;
    temp_file
        .persist(path)
        .map_err(|e| format!("Failed to persist registry: {}", e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pal_core::{AnimationFrame, AvatarState, Gender};
    use tempfile::TempDir;

    fn content(frame: AnimationFrame) -> ContentPayload {
        ContentPayload::new(3_000, AvatarState::Neutral, Gender::Male, frame)
    }

    #[test]
    fn test_request_update_end_cycle() {
        let temp = TempDir::new().unwrap();
        let host = FileSessionHost::new(temp.path().join("live-sessions.json"), true);

        let handle = host.request_session(&content(AnimationFrame::FIRST)).unwrap();
        assert_eq!(host.list_sessions(), vec![handle.clone()]);

        host.update_session(&handle, &content(AnimationFrame::SECOND))
            .unwrap();
        let (_, session) = host.sessions().remove(0);
        assert_eq!(session.content.frame, AnimationFrame::SECOND);

        host.end_session(&handle, Dismissal::Immediate).unwrap();
        assert!(host.list_sessions().is_empty());
    }

    #[test]
    fn test_sessions_survive_new_host_instance() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("live-sessions.json");
        let handle = FileSessionHost::new(path.clone(), true)
            .request_session(&content(AnimationFrame::FIRST))
            .unwrap();

        let reopened = FileSessionHost::new(path, true);
        assert_eq!(reopened.list_sessions(), vec![handle]);
    }

    #[test]
    fn test_unknown_session_is_reported() {
        let temp = TempDir::new().unwrap();
        let host = FileSessionHost::new(temp.path().join("live-sessions.json"), true);
        let ghost = SessionHandle::new("ghost");

        assert_eq!(
            host.update_session(&ghost, &content(AnimationFrame::FIRST)),
            Err(HostError::UnknownSession("ghost".to_string()))
        );
        assert!(host.end_session(&ghost, Dismissal::Immediate).is_err());
    }

    #[test]
    fn test_corrupt_registry_reads_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("live-sessions.json");
        fs_err::write(&path, "[[[").unwrap();

        let host = FileSessionHost::new(path, false);
        assert!(host.list_sessions().is_empty());
        assert!(!host.capability_enabled());
    }

    #[test]
    fn test_concurrent_requests_are_all_registered() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("live-sessions.json");

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    FileSessionHost::new(path, true)
                        .request_session(&content(AnimationFrame::FIRST))
                        .unwrap()
                })
            })
            .collect();
        let mut handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        handles.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(FileSessionHost::new(path, true).list_sessions(), handles);
    }
}
