//! Durable state store for `AgentState` (§3, C3).
//!
//! A single JSON file on disk, written atomically: serialize to a `.tmp`
//! sibling, `fsync`, then rename over the real path. A reader never
//! observes a half-written file because `rename` is atomic on the same
//! filesystem — the same pattern the teacher's queue-adjacent code uses
//! for its SQLite WAL checkpoints, generalized here to a single file
//! since the agent's state is a single record, not a table.

use std::path::{Path, PathBuf};

use bigamount::BigAmount;
use tokio::io::AsyncWriteExt;
use types::AgentState;

/// Owns the on-disk location of the agent's state and mediates all reads
/// and writes through it.
pub struct StateStore {
    path: PathBuf,
    history_keep_points: usize,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, history_keep_points: usize) -> Self {
        Self {
            path: path.into(),
            history_keep_points,
        }
    }

    /// Loads the state file, sanitizing it per §3's field-clamp rules.
    ///
    /// A missing file yields a fresh `AgentState::new()` seeded with
    /// `initial_cash_lamports` (first run). A file that exists but fails
    /// to parse is treated as corrupt: the original is moved aside to a
    /// `.corrupt-<ns>` sibling for forensics and a fresh state is
    /// returned, rather than letting the agent crash loop on a bad file
    /// (§7, StateCorrupt: "agent re-initializes conservative state and
    /// logs at error level").
    pub async fn load(&self, initial_cash_lamports: &BigAmount) -> anyhow::Result<AgentState> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no existing state, starting fresh");
                return Ok(AgentState::new(initial_cash_lamports.clone(), chrono::Utc::now()));
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<AgentState>(&bytes) {
            Ok(mut state) => {
                state.sanitize(self.history_keep_points);
                Ok(state)
            }
            Err(err) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %err,
                    "state file corrupt, quarantining and re-initializing"
                );
                self.quarantine().await?;
                Ok(AgentState::new(initial_cash_lamports.clone(), chrono::Utc::now()))
            }
        }
    }

    async fn quarantine(&self) -> anyhow::Result<()> {
        let quarantined = self.path.with_extension(format!("corrupt-{}", ns_suffix()));
        if let Err(err) = tokio::fs::rename(&self.path, &quarantined).await {
            tracing::warn!(error = %err, "failed to quarantine corrupt state file");
        }
        Ok(())
    }

    /// Persists `state`, sanitizing it first so a caller can never
    /// accidentally write clamp-violating values to disk.
    pub async fn save(&self, state: &mut AgentState) -> anyhow::Result<()> {
        state.sanitize(self.history_keep_points);
        let payload = serde_json::to_vec_pretty(state)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = tmp_sibling(&self.path);
        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&payload).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Cheap non-colliding suffix for quarantine filenames without pulling in
/// a UUID dependency just for this.
fn ns_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initial_cash() -> BigAmount {
        BigAmount::from_u64(10_000_000_000)
    }

    #[tokio::test]
    async fn missing_file_yields_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"), 100);
        let state = store.load(&initial_cash()).await.unwrap();
        assert_eq!(state.cash_lamports, initial_cash());
        assert_eq!(state.cycle, 0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"), 100);
        let mut state = AgentState::new(initial_cash(), chrono::Utc::now());
        state.cycle = 42;
        store.save(&mut state).await.unwrap();

        let loaded = store.load(&initial_cash()).await.unwrap();
        assert_eq!(loaded.cycle, 42);
    }

    #[tokio::test]
    async fn corrupt_file_is_quarantined_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = StateStore::new(path.clone(), 100);
        let state = store.load(&initial_cash()).await.unwrap();
        assert_eq!(state.cycle, 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/dir/state.json");
        let store = StateStore::new(nested.clone(), 100);
        let mut state = AgentState::new(initial_cash(), chrono::Utc::now());
        store.save(&mut state).await.unwrap();
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn save_truncates_history_to_keep_points() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"), 3);
        let mut state = AgentState::new(initial_cash(), chrono::Utc::now());
        for i in 0..10 {
            state.push_price(
                "MINT",
                types::PricePoint {
                    ts: chrono::Utc::now(),
                    price_usd: i as f64,
                },
                100,
            );
        }
        store.save(&mut state).await.unwrap();
        assert_eq!(state.market_history["MINT"].len(), 3);
    }
}
