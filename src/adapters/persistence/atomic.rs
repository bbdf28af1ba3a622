//! Atomic file replacement shared by the file-backed adapters.

use crate::domain::DomainError;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Write-replace: write to a temp file, fsync, then rename over the target.
/// A crash mid-write leaves the previous file intact.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let mut temp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut f = fs::File::create(&temp_path).await?;
    f.write_all(bytes).await?;
    f.sync_all().await?;
    drop(f);

    fs::rename(&temp_path, path).await
}

/// Replace `path` only when its bytes differ. Returns true when written.
pub async fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<bool, DomainError> {
    match fs::read(path).await {
        Ok(existing) if existing == bytes => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(DomainError::Store(format!("read {}: {}", path.display(), e)));
        }
    }
    write_atomic(path, bytes)
        .await
        .map_err(|e| DomainError::Store(format!("write {}: {}", path.display(), e)))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_if_changed_skips_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        assert!(write_if_changed(&path, b"x,y\n").await.unwrap());
        assert!(!write_if_changed(&path, b"x,y\n").await.unwrap());
        assert!(write_if_changed(&path, b"x,z\n").await.unwrap());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"x,z\n");
        assert!(!dir.path().join("a.csv.tmp").exists());
    }
}
