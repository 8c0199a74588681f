//! Mirror a local resource selection into a server-side workspace.
//!
//! The selection and the workspace id are persisted to a JSON state file so
//! they survive restarts. `sync` is single-flight per instance: a call made
//! while another is in progress returns [`SyncOutcome::Skipped`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ClientResult, DeepDiveClient, WorkspaceView};
use crate::models::unique_ids;
use crate::services::MIN_WORKSPACE_RESOURCES;

/// Persisted sync state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub selection: Vec<String>,
    pub workspace_id: Option<String>,
}

/// Result of one [`WorkspaceSync::sync`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another sync was already running.
    Skipped,
    /// Empty selection; the cached workspace was forgotten.
    Cleared,
    /// Not enough resources selected to create a workspace.
    BelowMinimum,
    Created { workspace_id: String },
    InSync,
    Updated { added: usize, removed: usize },
}

pub struct WorkspaceSync {
    client: DeepDiveClient,
    state_path: PathBuf,
    state: Mutex<SyncState>,
    pending: AtomicBool,
    min_resources: usize,
}

/// Clears the pending flag when dropped, whichever way `sync` returns.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl WorkspaceSync {
    /// Load state from `state_path`. A missing file starts empty.
    pub async fn load(client: DeepDiveClient, state_path: impl Into<PathBuf>) -> ClientResult<Self> {
        let state_path = state_path.into();
        let state = read_state(&state_path).await?;
        Ok(Self {
            client,
            state_path,
            state: Mutex::new(state),
            pending: AtomicBool::new(false),
            min_resources: MIN_WORKSPACE_RESOURCES,
        })
    }

    pub fn with_min_resources(mut self, min_resources: usize) -> Self {
        self.min_resources = min_resources;
        self
    }

    pub async fn state(&self) -> SyncState {
        self.state.lock().await.clone()
    }

    pub async fn selection(&self) -> Vec<String> {
        self.state.lock().await.selection.clone()
    }

    pub async fn workspace_id(&self) -> Option<String> {
        self.state.lock().await.workspace_id.clone()
    }

    /// Replace the selection. An empty selection also forgets the workspace.
    pub async fn set_selection<I, S>(&self, ids: I) -> ClientResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock().await;
        state.selection = unique_ids(ids);
        if state.selection.is_empty() {
            state.workspace_id = None;
        }
        write_state(&self.state_path, &state).await
    }

    /// Bring the server workspace in line with the local selection.
    pub async fn sync(&self) -> ClientResult<SyncOutcome> {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Workspace sync already in progress");
            return Ok(SyncOutcome::Skipped);
        }
        let _guard = PendingGuard(&self.pending);

        let mut state = self.state.lock().await;
        let outcome = match state.workspace_id.clone() {
            None => self.create(&mut state).await?,
            Some(id) => self.reconcile(&mut state, &id).await?,
        };
        write_state(&self.state_path, &state).await?;

        Ok(outcome)
    }

    /// Re-fetch the workspace and adopt its resource list.
    pub async fn refresh(&self) -> ClientResult<Option<WorkspaceView>> {
        let mut state = self.state.lock().await;
        let Some(id) = state.workspace_id.clone() else {
            return Ok(None);
        };
        let workspace = self.client.get_workspace(&id).await?;
        state.selection = workspace.resource_ids();
        write_state(&self.state_path, &state).await?;
        Ok(Some(workspace))
    }

    async fn create(&self, state: &mut SyncState) -> ClientResult<SyncOutcome> {
        if state.selection.is_empty() {
            state.workspace_id = None;
            return Ok(SyncOutcome::Cleared);
        }
        if state.selection.len() < self.min_resources {
            return Ok(SyncOutcome::BelowMinimum);
        }

        let workspace = self.client.create_workspace(&state.selection).await?;
        info!(workspace_id = %workspace.id, resources = workspace.resources.len(), "Workspace created");
        state.selection = workspace.resource_ids();
        state.workspace_id = Some(workspace.id.clone());

        Ok(SyncOutcome::Created {
            workspace_id: workspace.id,
        })
    }

    async fn reconcile(&self, state: &mut SyncState, id: &str) -> ClientResult<SyncOutcome> {
        let workspace = self.client.get_workspace(id).await?;
        let (add, remove) = diff_selection(&state.selection, &workspace.resource_ids());
        if add.is_empty() && remove.is_empty() {
            return Ok(SyncOutcome::InSync);
        }

        let updated = self
            .client
            .update_workspace_resources(id, &add, &remove)
            .await?;
        debug!(workspace_id = %id, added = add.len(), removed = remove.len(), "Workspace updated");
        state.selection = updated.resource_ids();

        Ok(SyncOutcome::Updated {
            added: add.len(),
            removed: remove.len(),
        })
    }
}

/// `(selection - server, server - selection)`, each in its source order.
pub fn diff_selection(selection: &[String], server: &[String]) -> (Vec<String>, Vec<String>) {
    let on_server: HashSet<&str> = server.iter().map(String::as_str).collect();
    let selected: HashSet<&str> = selection.iter().map(String::as_str).collect();

    let add = selection
        .iter()
        .filter(|id| !on_server.contains(id.as_str()))
        .cloned()
        .collect();
    let remove = server
        .iter()
        .filter(|id| !selected.contains(id.as_str()))
        .cloned()
        .collect();

    (add, remove)
}

async fn read_state(path: &Path) -> ClientResult<SyncState> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(SyncState::default()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SyncState::default()),
        Err(e) => Err(e.into()),
    }
}

async fn write_state(path: &Path, state: &SyncState) -> ClientResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, serde_json::to_vec_pretty(state)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_diff_keeps_source_order() {
        let (add, remove) = diff_selection(&ids(&["d", "a", "c"]), &ids(&["b", "a", "e"]));
        assert_eq!(add, ids(&["d", "c"]));
        assert_eq!(remove, ids(&["b", "e"]));
    }

    #[test]
    fn test_diff_of_equal_sets_is_empty() {
        let (add, remove) = diff_selection(&ids(&["a", "b"]), &ids(&["b", "a"]));
        assert!(add.is_empty());
        assert!(remove.is_empty());
    }

    #[test]
    fn test_pending_guard_releases_flag() {
        let flag = AtomicBool::new(true);
        {
            let _guard = PendingGuard(&flag);
        }
        assert!(!flag.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_missing_state_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = read_state(&dir.path().join("none.json")).await.unwrap();
        assert_eq!(state, SyncState::default());
    }
}
