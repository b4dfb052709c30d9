//! On-disk blob storage (spec.md §4.3 "Storage layout"): content-addressed,
//! sharded by fingerprint prefix, written via temp-file + fsync + rename so
//! readers never observe a partial blob (spec.md §6 "Persisted state
//! layout": `<data>/cache/<shard>/<hash>`).

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::CacheError;

const SHARD_PREFIX_LEN: usize = 2;

pub fn blob_path(data_dir: &Path, fingerprint: &str) -> PathBuf {
    let shard = &fingerprint[..fingerprint.len().min(SHARD_PREFIX_LEN)];
    data_dir.join("cache").join(shard).join(fingerprint)
}

fn temp_path(data_dir: &Path, fingerprint: &str) -> PathBuf {
    let shard = &fingerprint[..fingerprint.len().min(SHARD_PREFIX_LEN)];
    data_dir
        .join("cache")
        .join(shard)
        .join(format!(".{fingerprint}.{}.tmp", Uuid::new_v4()))
}

/// Writes `body` atomically under the fingerprint's shard directory.
/// Readers either see the old blob (if any) or the complete new one, never a
/// partial write.
pub async fn write_atomic(data_dir: &Path, fingerprint: &str, body: &[u8]) -> Result<(), CacheError> {
    let final_path = blob_path(data_dir, fingerprint);
    let tmp_path = temp_path(data_dir, fingerprint);
    if let Some(parent) = tmp_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp_path, &final_path).await?;
    Ok(())
}

pub async fn read(data_dir: &Path, fingerprint: &str, expected_len: u64) -> Result<Vec<u8>, CacheError> {
    let path = blob_path(data_dir, fingerprint);
    let bytes = fs::read(&path)
        .await
        .map_err(|_| CacheError::BlobMissing(fingerprint.to_string()))?;
    if bytes.len() as u64 != expected_len {
        return Err(CacheError::LengthMismatch {
            expected: expected_len,
            found: bytes.len() as u64,
        });
    }
    Ok(bytes)
}

pub async fn remove(data_dir: &Path, fingerprint: &str) -> Result<(), CacheError> {
    let path = blob_path(data_dir, fingerprint);
    match fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
