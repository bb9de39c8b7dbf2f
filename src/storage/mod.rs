// r2backup/src/storage/mod.rs
pub mod s3;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;

use crate::errors::Result;

/// Transfers at or below this size go out as a single put; larger files use
/// multipart. Part size matches the original deployment's transfer settings.
pub const MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;
pub const PART_SIZE: u64 = 100 * 1024 * 1024;

/// One object in the remote listing.
#[derive(Debug, Clone)]
pub struct RemoteArtifact {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Object-store primitives the backup flow depends on. Implemented for
/// S3-compatible services in [`s3::S3BlobStore`]; tests run against an
/// in-memory store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    async fn multipart_begin(&self, key: &str) -> Result<String>;
    async fn multipart_put_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        bytes: Vec<u8>,
    ) -> Result<String>;
    async fn multipart_complete(
        &self,
        key: &str,
        upload_id: &str,
        part_etags: Vec<String>,
    ) -> Result<()>;
    async fn multipart_abort(&self, key: &str, upload_id: &str) -> Result<()>;

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteArtifact>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Uploads a local file, choosing single-shot vs. multipart by size.
///
/// Returns the number of bytes transferred.
pub async fn upload_file(store: &dyn BlobStore, key: &str, path: &Path) -> Result<u64> {
    upload_file_with_limits(store, key, path, MULTIPART_THRESHOLD, PART_SIZE).await
}

/// Inner policy with explicit limits so the threshold and the abort-on-part
/// failure behavior can be exercised with small files in tests.
pub async fn upload_file_with_limits(
    store: &dyn BlobStore,
    key: &str,
    path: &Path,
    threshold: u64,
    part_size: u64,
) -> Result<u64> {
    let size = tokio::fs::metadata(path).await?.len();

    if size <= threshold {
        let bytes = tokio::fs::read(path).await?;
        store.put(key, bytes).await?;
        return Ok(size);
    }

    println!(
        "  Multipart upload ({:.1} MB, {} MB parts)",
        size as f64 / (1024.0 * 1024.0),
        part_size / (1024 * 1024)
    );

    let upload_id = store.multipart_begin(key).await?;
    match stream_parts(store, key, &upload_id, path, part_size).await {
        Ok(uploaded) => Ok(uploaded),
        Err(e) => {
            // Never leave a dangling multipart upload behind: abort so the
            // store drops the parts and the key stays invisible.
            if let Err(abort_err) = store.multipart_abort(key, &upload_id).await {
                eprintln!(
                    "⚠️ Failed to abort multipart upload {} for {}: {}",
                    upload_id, key, abort_err
                );
            }
            Err(e)
        }
    }
}

async fn stream_parts(
    store: &dyn BlobStore,
    key: &str,
    upload_id: &str,
    path: &Path,
    part_size: u64,
) -> Result<u64> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut etags = Vec::new();
    let mut part_number = 1i32;
    let mut uploaded = 0u64;

    loop {
        let mut buf = vec![0u8; part_size as usize];
        let n = read_up_to(&mut file, &mut buf).await?;
        if n == 0 {
            break;
        }
        buf.truncate(n);

        let etag = store
            .multipart_put_part(key, upload_id, part_number, buf)
            .await?;
        etags.push(etag);
        uploaded += n as u64;
        part_number += 1;

        if n < part_size as usize {
            break;
        }
    }

    store.multipart_complete(key, upload_id, etags).await?;
    Ok(uploaded)
}

/// Fills `buf` from `file` until full or EOF; returns bytes read.
async fn read_up_to(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::errors::AppError;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// In-memory blob store with injectable failures. Completed objects only
    /// become listable on `put` / `multipart_complete`; aborted uploads
    /// vanish entirely.
    #[derive(Default)]
    pub(crate) struct MemoryBlobStore {
        pub(crate) objects: Mutex<HashMap<String, Vec<u8>>>,
        pub(crate) pending: Mutex<HashMap<String, Vec<Vec<u8>>>>,
        pub(crate) next_upload_id: AtomicU32,
        pub(crate) fail_on_part: Option<i32>,
        pub(crate) fail_puts: bool,
        pub(crate) fail_delete_keys: HashSet<String>,
    }

    impl MemoryBlobStore {
        pub(crate) fn object(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(key).cloned()
        }

        pub(crate) fn object_count(&self) -> usize {
            self.objects.lock().unwrap().len()
        }

        pub(crate) fn seed(&self, key: &str, bytes: &[u8]) {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes.to_vec());
        }

        pub(crate) fn pending_count(&self) -> usize {
            self.pending.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
            if self.fail_puts {
                return Err(AppError::Upload("injected put failure".to_string()));
            }
            self.objects.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }

        async fn multipart_begin(&self, key: &str) -> Result<String> {
            let id = format!(
                "{}#{}",
                key,
                self.next_upload_id.fetch_add(1, Ordering::SeqCst)
            );
            self.pending.lock().unwrap().insert(id.clone(), Vec::new());
            Ok(id)
        }

        async fn multipart_put_part(
            &self,
            _key: &str,
            upload_id: &str,
            part_number: i32,
            bytes: Vec<u8>,
        ) -> Result<String> {
            if self.fail_on_part == Some(part_number) {
                return Err(AppError::Upload(format!(
                    "injected failure on part {}",
                    part_number
                )));
            }
            let mut pending = self.pending.lock().unwrap();
            let parts = pending
                .get_mut(upload_id)
                .ok_or_else(|| AppError::Upload("unknown upload id".to_string()))?;
            parts.push(bytes);
            Ok(format!("etag-{}", part_number))
        }

        async fn multipart_complete(
            &self,
            key: &str,
            upload_id: &str,
            part_etags: Vec<String>,
        ) -> Result<()> {
            let parts = self
                .pending
                .lock()
                .unwrap()
                .remove(upload_id)
                .ok_or_else(|| AppError::Upload("unknown upload id".to_string()))?;
            assert_eq!(parts.len(), part_etags.len());
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), parts.concat());
            Ok(())
        }

        async fn multipart_abort(&self, _key: &str, upload_id: &str) -> Result<()> {
            self.pending.lock().unwrap().remove(upload_id);
            Ok(())
        }

        async fn list(&self, prefix: &str) -> Result<Vec<RemoteArtifact>> {
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, bytes)| RemoteArtifact {
                    key: key.clone(),
                    size: bytes.len() as u64,
                    last_modified: None,
                })
                .collect())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            if self.fail_delete_keys.contains(key) {
                return Err(AppError::Storage(format!(
                    "injected delete failure for {}",
                    key
                )));
            }
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
