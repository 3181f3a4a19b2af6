use std::path::Path;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::SaveError;
use super::paths::part_path;

/// Write `bytes` to `path` through a `.part` temp file renamed into place,
/// so an interrupted save never leaves a file that looks complete.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
    let part = part_path(path);
    let result = write_part(&part, bytes).await;
    if let Err(e) = result {
        let _ = fs::remove_file(&part).await;
        return Err(SaveError::disk(&part, e));
    }
    fs::rename(&part, path)
        .await
        .map_err(|e| SaveError::disk(path, e))
}

async fn write_part(part: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(part)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}
