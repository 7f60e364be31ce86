//! Per-session state shared by hook invocations.
//!
//! Hooks run as separate processes, so the state lives in a small JSON file
//! under the XDG state directory, keyed by the session id from
//! [`SESSION_ID_ENV`]. Without a session id every operation is a no-op.

use std::{
    fs,
    path::{Path, PathBuf},
};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{CairnError, Result};

/// Environment variable carrying the agent session id.
pub const SESSION_ID_ENV: &str = "CAIRN_SESSION_ID";

/// What a session has done so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: String,
    pub started_at: Timestamp,
    pub graph_queries: u32,
    pub docs_searches: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_query: Option<String>,
}

impl SessionState {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            started_at: Timestamp::now(),
            graph_queries: 0,
            docs_searches: 0,
            last_query: None,
        }
    }
}

/// Handle to the state file of the current session.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    session: Option<(String, PathBuf)>,
}

impl SessionTracker {
    /// Tracker for the session named by [`SESSION_ID_ENV`], if set.
    pub fn from_env() -> Result<Self> {
        let session_id = std::env::var(SESSION_ID_ENV)
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        Self::new(session_id)
    }

    /// Tracker storing its file under `$XDG_STATE_HOME/cairn/sessions/`.
    pub fn new(session_id: Option<String>) -> Result<Self> {
        let Some(session_id) = session_id else {
            return Ok(Self::disabled());
        };
        let path = xdg::BaseDirectories::with_prefix("cairn")
            .place_state_file(format!("sessions/{}.json", file_stem(&session_id)))
            .map_err(|e| CairnError::XdgDirectory(e.to_string()))?;
        Ok(Self {
            session: Some((session_id, path)),
        })
    }

    /// Tracker storing its file in `dir`.
    pub fn with_state_dir(session_id: &str, dir: &Path) -> Self {
        let path = dir.join(format!("{}.json", file_stem(session_id)));
        Self {
            session: Some((session_id.to_string(), path)),
        }
    }

    /// A tracker with no session; every hook is a no-op.
    pub fn disabled() -> Self {
        Self { session: None }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|(id, _)| id.as_str())
    }

    /// Starts the session with fresh state, replacing any previous file.
    pub fn init(&self) -> Result<()> {
        let Some((session_id, path)) = &self.session else {
            return Ok(());
        };
        write_state(path, &SessionState::new(session_id))?;
        log::debug!("Initialized session {session_id} at {}", path.display());
        Ok(())
    }

    /// Current state, or `None` without a session or before `init`.
    pub fn state(&self) -> Result<Option<SessionState>> {
        let Some((_, path)) = &self.session else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path).map_err(|source| CairnError::FileSystem {
            path: path.clone(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn record_graph_query(&self, query: &str) -> Result<()> {
        self.update(|state| {
            state.graph_queries += 1;
            state.last_query = Some(query.to_string());
        })
    }

    pub fn record_docs_search(&self, query: &str) -> Result<()> {
        self.update(|state| {
            state.docs_searches += 1;
            state.last_query = Some(query.to_string());
        })
    }

    /// Whether broad searches are allowed: always without a session,
    /// otherwise once the session has consulted the graph or the docs.
    pub fn broad_search_allowed(&self) -> bool {
        if self.session.is_none() {
            return true;
        }
        match self.state() {
            Ok(Some(state)) => state.graph_queries > 0 || state.docs_searches > 0,
            Ok(None) => false,
            Err(e) => {
                log::warn!("Unreadable session state, allowing broad search: {e}");
                true
            }
        }
    }

    /// Removes the state file.
    pub fn clear(&self) -> Result<()> {
        let Some((_, path)) = &self.session else {
            return Ok(());
        };
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CairnError::FileSystem {
                path: path.clone(),
                source,
            }),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut SessionState)) -> Result<()> {
        let Some((session_id, path)) = &self.session else {
            return Ok(());
        };
        let mut state = self
            .state()?
            .unwrap_or_else(|| SessionState::new(session_id));
        apply(&mut state);
        write_state(path, &state)
    }
}

fn write_state(path: &Path, state: &SessionState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CairnError::FileSystem {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(state)?).map_err(|source| CairnError::FileSystem {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| CairnError::FileSystem {
        path: path.to_path_buf(),
        source,
    })
}

/// Session ids come from the environment; keep them to one safe file name.
fn file_stem(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_tracker_is_a_no_op() {
        let tracker = SessionTracker::disabled();
        tracker.init().unwrap();
        tracker.record_graph_query("Store").unwrap();
        assert!(tracker.state().unwrap().is_none());
        assert!(tracker.broad_search_allowed());
        tracker.clear().unwrap();
    }

    #[test]
    fn test_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = SessionTracker::with_state_dir("abc-123", dir.path());

        assert!(!tracker.broad_search_allowed());
        tracker.init().unwrap();
        assert!(!tracker.broad_search_allowed());

        tracker.record_graph_query("what-calls parse").unwrap();
        let state = tracker.state().unwrap().unwrap();
        assert_eq!(state.session_id, "abc-123");
        assert_eq!(state.graph_queries, 1);
        assert_eq!(state.last_query.as_deref(), Some("what-calls parse"));
        assert!(tracker.broad_search_allowed());

        tracker.clear().unwrap();
        assert!(tracker.state().unwrap().is_none());
        tracker.clear().unwrap();
    }

    #[test]
    fn test_session_ids_are_sanitized() {
        assert_eq!(file_stem("../../etc/passwd"), "______etc_passwd");
    }
}
