//! Intent Queue (§4.6, C6): a filesystem-backed, at-most-once handoff
//! between the agent process and whatever executes trades, so the two
//! sides never need to share memory or agree on a wire protocol beyond
//! "JSON file on disk."
//!
//! Layout under `root`:
//!   intents/             new intents, producer writes here
//!   intents/_processing/ claimed by a consumer, in flight
//!   intents/_processed/  archived with an outcome suffix
//!   results/             execution results
//!   proposals/           improvement proposals
//!   verdicts/            improvement verdicts
//!
//! Every write goes through `atomic::write_atomic`: write to a `.tmp`
//! sibling, fsync, rename. A claim is itself just a rename from
//! `intents/` into `intents/_processing/` — if two consumers race for
//! the same file, exactly one rename succeeds and the loser sees
//! `NotFound` and moves on (§4.6, Scenario E).

mod atomic;

use std::path::{Path, PathBuf};

use chrono::Utc;
use types::{ExecutionIntent, ExecutionResult, ImprovementProposal, ImprovementVerdict};

/// An intent that has been claimed (moved into `_processing/`) and
/// parsed, ready for validation and execution.
pub struct ClaimedIntent {
    pub intent: ExecutionIntent,
    processing_path: PathBuf,
}

pub struct IntentQueue {
    root: PathBuf,
}

impl IntentQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn intents_dir(&self) -> PathBuf {
        self.root.join("intents")
    }

    fn processing_dir(&self) -> PathBuf {
        self.intents_dir().join("_processing")
    }

    fn processed_dir(&self) -> PathBuf {
        self.intents_dir().join("_processed")
    }

    fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    fn proposals_dir(&self) -> PathBuf {
        self.root.join("proposals")
    }

    fn verdicts_dir(&self) -> PathBuf {
        self.root.join("verdicts")
    }

    /// Creates every subdirectory the queue needs. Idempotent; call once
    /// at startup before publishing or claiming anything.
    pub async fn init_dirs(&self) -> anyhow::Result<()> {
        for dir in [
            self.intents_dir(),
            self.processing_dir(),
            self.processed_dir(),
            self.results_dir(),
            self.proposals_dir(),
            self.verdicts_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Publishes `intent` into `intents/` (atomic write-to-tmp + rename).
    pub async fn publish_intent(&self, intent: &ExecutionIntent) -> anyhow::Result<()> {
        let path = self.intents_dir().join(intent_file_name(intent));
        let bytes = serde_json::to_vec_pretty(intent)?;
        atomic::write_atomic(&path, &bytes).await
    }

    /// Lists `intents/` (excluding the `_processing`/`_processed`
    /// subdirectories), sorts lexicographically for FIFO order, and
    /// claims up to `max` of them by renaming into `_processing/`.
    ///
    /// A rename that fails with `NotFound` means another consumer won
    /// the race for that file; it is skipped and does not count against
    /// `max`. A claimed file that is empty or fails to parse is archived
    /// immediately as `.invalid.json`/`.empty.json` and also does not
    /// count against `max` — it will never become a valid intent no
    /// matter how many times it is retried.
    pub async fn claim_batch(&self, max: usize) -> anyhow::Result<Vec<ClaimedIntent>> {
        let mut names = self.list_new_intent_files().await?;
        names.sort();

        let mut claimed = Vec::new();
        for name in names {
            if claimed.len() >= max {
                break;
            }
            let src = self.intents_dir().join(&name);
            let dst = self.processing_dir().join(&name);
            match tokio::fs::rename(&src, &dst).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            }

            match tokio::fs::read(&dst).await {
                Ok(bytes) if bytes.is_empty() => {
                    tracing::warn!(file = %name, "claimed intent file is empty, archiving");
                    self.archive_path(&dst, "empty").await?;
                }
                Ok(bytes) => match serde_json::from_slice::<ExecutionIntent>(&bytes) {
                    Ok(intent) => claimed.push(ClaimedIntent {
                        intent,
                        processing_path: dst,
                    }),
                    Err(err) => {
                        tracing::warn!(file = %name, error = %err, "claimed intent file is unparseable, archiving");
                        self.archive_path(&dst, "invalid").await?;
                    }
                },
                Err(err) => return Err(err.into()),
            }
        }
        Ok(claimed)
    }

    async fn list_new_intent_files(&self) -> anyhow::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.intents_dir()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Archives a claimed intent into `_processed/`, replacing the
    /// `.intent.json` suffix with `.{status_suffix}.json`.
    pub async fn archive(&self, claimed: &ClaimedIntent, status_suffix: &str) -> anyhow::Result<()> {
        self.archive_path(&claimed.processing_path, status_suffix).await
    }

    async fn archive_path(&self, processing_path: &Path, status_suffix: &str) -> anyhow::Result<()> {
        let file_name = processing_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.intent.json");
        let new_name = file_name
            .strip_suffix(".intent.json")
            .map(|stem| format!("{stem}.{status_suffix}.json"))
            .unwrap_or_else(|| format!("{file_name}.{status_suffix}.json"));
        let dst = self.processed_dir().join(new_name);
        tokio::fs::create_dir_all(self.processed_dir()).await?;
        tokio::fs::rename(processing_path, &dst).await?;
        Ok(())
    }

    /// Publishes an execution result, keyed by `intent_id` so repeated
    /// writes for the same intent overwrite deterministically (§5).
    pub async fn publish_result(&self, result: &ExecutionResult) -> anyhow::Result<()> {
        let path = self.results_dir().join(format!("{}.result.json", result.intent_id));
        let bytes = serde_json::to_vec_pretty(result)?;
        atomic::write_atomic(&path, &bytes).await
    }

    pub async fn publish_proposal(&self, proposal: &ImprovementProposal) -> anyhow::Result<()> {
        let path = self.proposals_dir().join(format!("{}.proposal.json", proposal.id));
        let bytes = serde_json::to_vec_pretty(proposal)?;
        atomic::write_atomic(&path, &bytes).await
    }

    pub async fn publish_verdict(&self, verdict: &ImprovementVerdict) -> anyhow::Result<()> {
        let path = self.verdicts_dir().join(format!("{}.verdict.json", verdict.proposal_id));
        let bytes = serde_json::to_vec_pretty(verdict)?;
        atomic::write_atomic(&path, &bytes).await
    }
}

fn intent_file_name(intent: &ExecutionIntent) -> String {
    let ts_ms = Utc::now().timestamp_millis();
    let pid = std::process::id();
    format!("{ts_ms}.{pid}.{}.intent.json", intent.id)
}
