//! Write-to-temp + atomic rename, the one primitive every queue
//! operation is built from (§4.6). Shared with `state::StateStore`'s
//! save path, which uses the same pattern for the single state file.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

pub async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_sibling(path);
    {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "item".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}
