//! Response Cache (spec.md §4.3): content-addressed on-disk blobs with a
//! fully in-memory index, implementing `pingora::cache::Storage` the way the
//! teacher's `SccMemoryCache` does — generalized from an in-map `Bytes` body
//! to a disk-backed blob (`cache::blob`), with a pin count per entry so a
//! blob mid-stream-to-a-client is skipped by eviction (spec.md §5
//! "Cache blobs: reference-counted; deletion deferred until refcount == 0").
//!
//! Single-flight dedup and LRU eviction are not implemented here: they are
//! supplied to `pingora::cache::HttpCache::enable` alongside this `Storage`,
//! the same composition the teacher's `bucket::CacheBucket` wires up with
//! `pingora::cache::lock::CacheLock` and
//! `pingora::cache::eviction::lru::Manager`.

use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use pingora::cache::key::{CacheHashKey, CacheKey, CompactCacheKey, HashBinary};
use pingora::cache::storage::{HandleHit, HandleMiss, HitHandler, MissHandler};
use pingora::cache::trace::SpanHandle;
use pingora::cache::{CacheMeta, PurgeType, Storage};
use pingora::{Error, Result};

type BinaryMeta = (Bytes, Bytes);

#[derive(Clone)]
struct IndexedEntry {
    meta: BinaryMeta,
    content_length: u64,
    pin_count: Arc<AtomicU64>,
    stored_at_unix: i64,
    last_access_unix: Arc<AtomicI64>,
    hit_count: Arc<AtomicU64>,
}

/// Disk-backed, content-addressed response store (spec.md §4.3 "Storage
/// layout").
#[derive(Clone)]
pub struct DiskCache {
    index: Arc<scc::HashMap<HashBinary, IndexedEntry, ahash::RandomState>>,
    data_dir: PathBuf,
}

impl DiskCache {
    pub fn new(data_dir: PathBuf) -> Self {
        DiskCache {
            index: Arc::new(scc::HashMap::with_hasher(ahash::RandomState::new())),
            data_dir,
        }
    }

    fn fingerprint_hex(hash: &HashBinary) -> String {
        hex::encode(hash)
    }

    /// Admin-facing read-only projection of every cached entry (spec.md §6
    /// "Admin surface": "cache stats/clear"). Derived from the stored
    /// `CacheMeta` headers rather than kept as separate index state, so it
    /// can never drift from what `lookup` actually serves.
    pub async fn entries(&self) -> Vec<crate::cache::entry::CacheEntry> {
        let mut out = Vec::new();
        self.index
            .scan_async(|hash, entry| {
                let Ok(meta) = CacheMeta::deserialize(&entry.meta.0, &entry.meta.1) else {
                    return;
                };
                let header_str = |name: http::HeaderName| {
                    meta.headers()
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string())
                };
                out.push(crate::cache::entry::CacheEntry {
                    fingerprint: Self::fingerprint_hex(hash),
                    content_type: header_str(http::header::CONTENT_TYPE).unwrap_or_default(),
                    content_length: entry.content_length,
                    stored_at_unix: entry.stored_at_unix,
                    last_access_unix: entry.last_access_unix.load(Ordering::Relaxed),
                    hit_count: entry.hit_count.load(Ordering::Relaxed),
                    etag: header_str(http::header::ETAG),
                    last_modified: header_str(http::header::LAST_MODIFIED),
                });
            })
            .await;
        out
    }

    /// Drop every entry, index and blob alike (admin "cache clear").
    /// Returns the number of entries removed.
    pub async fn clear(&self) -> usize {
        let mut hashes = Vec::new();
        self.index.scan_async(|hash, _| hashes.push(*hash)).await;
        for hash in &hashes {
            self.index.remove_async(hash).await;
            let fingerprint = Self::fingerprint_hex(hash);
            let _ = crate::cache::blob::remove(&self.data_dir, &fingerprint).await;
        }
        hashes.len()
    }
}

#[async_trait]
impl Storage for DiskCache {
    async fn lookup(
        &'static self,
        key: &CacheKey,
        _trace: &SpanHandle,
    ) -> Result<Option<(CacheMeta, HitHandler)>> {
        let hash = key.combined_bin();
        let Some(entry) = self.index.get_async(&hash).await else {
            return Ok(None);
        };
        let entry = entry.get().clone();
        let meta = CacheMeta::deserialize(&entry.meta.0, &entry.meta.1)?;
        entry.last_access_unix.store(now_unix(), Ordering::Relaxed);
        entry.pin_count.fetch_add(1, Ordering::SeqCst);
        entry.hit_count.fetch_add(1, Ordering::Relaxed);

        let fingerprint = Self::fingerprint_hex(&hash);
        let body = crate::cache::blob::read(&self.data_dir, &fingerprint, entry.content_length)
            .await
            .map_err(|e| Error::because(pingora::ErrorType::InternalError, "cache blob read", e))?;

        Ok(Some((
            meta,
            Box::new(DiskHitHandler::new(entry, Bytes::from(body))),
        )))
    }

    async fn get_miss_handler(
        &'static self,
        key: &CacheKey,
        meta: &CacheMeta,
        _trace: &SpanHandle,
    ) -> Result<MissHandler> {
        let hash = key.combined_bin();
        let raw_meta = meta.serialize()?;
        let meta = (Bytes::from(raw_meta.0), Bytes::from(raw_meta.1));
        Ok(Box::new(DiskMissHandler {
            body_buf: BytesMut::new(),
            meta,
            key: hash,
            inner: self.clone(),
        }))
    }

    async fn purge(
        &'static self,
        key: &CompactCacheKey,
        _purge_type: PurgeType,
        _trace: &SpanHandle,
    ) -> Result<bool> {
        let hash = key.combined_bin();
        let removed = self.index.remove_async(&hash).await.is_some();
        if removed {
            let fingerprint = Self::fingerprint_hex(&hash);
            let _ = crate::cache::blob::remove(&self.data_dir, &fingerprint).await;
        }
        Ok(removed)
    }

    async fn update_meta(
        &'static self,
        key: &CacheKey,
        meta: &CacheMeta,
        _trace: &SpanHandle,
    ) -> Result<bool> {
        let hash = key.combined_bin();
        let new_meta = meta.serialize()?;
        let new_meta = (Bytes::from(new_meta.0), Bytes::from(new_meta.1));
        let updated = self
            .index
            .update_async(&hash, move |_, value| value.meta = new_meta)
            .await;
        match updated {
            Some(()) => Ok(true),
            None => Err(Error::create(
                pingora::ErrorType::Custom("no meta found for update_meta"),
                pingora::ErrorSource::Internal,
                Some(format!("key = {:?}", key).into()),
                None,
            )),
        }
    }

    fn support_streaming_partial_write(&self) -> bool {
        false
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

fn now_unix() -> i64 {
    // Suspension/allocation-free wall clock read; callers never treat this
    // as monotonic.
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct DiskHitHandler {
    entry: IndexedEntry,
    body: Bytes,
    done: bool,
    range_start: usize,
    range_end: usize,
}

impl DiskHitHandler {
    fn new(entry: IndexedEntry, body: Bytes) -> Self {
        let len = body.len();
        DiskHitHandler {
            entry,
            body,
            done: false,
            range_start: 0,
            range_end: len,
        }
    }
}

#[async_trait]
impl HandleHit for DiskHitHandler {
    async fn read_body(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            Ok(None)
        } else {
            self.done = true;
            Ok(Some(self.body.slice(self.range_start..self.range_end)))
        }
    }

    async fn finish(
        self: Box<Self>,
        _storage: &'static (dyn Storage + Sync),
        _key: &CacheKey,
        _trace: &SpanHandle,
    ) -> Result<()> {
        // Unpin: this client is done reading, eviction may reconsider the
        // entry (spec.md §GLOSSARY "Pin").
        self.entry.pin_count.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, start: usize, end: Option<usize>) -> Result<()> {
        let len = self.body.len();
        if start >= len {
            return Error::e_explain(
                pingora::ErrorType::InternalError,
                format!("seek start out of range {start} >= {len}"),
            );
        }
        self.range_start = start;
        if let Some(end) = end {
            self.range_end = std::cmp::min(len, end);
        }
        self.done = false;
        Ok(())
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

#[derive(Debug)]
struct DiskMissHandler {
    meta: BinaryMeta,
    key: HashBinary,
    body_buf: BytesMut,
    inner: DiskCache,
}

#[async_trait]
impl HandleMiss for DiskMissHandler {
    async fn write_body(&mut self, data: Bytes, _eof: bool) -> Result<()> {
        self.body_buf.extend_from_slice(&data);
        Ok(())
    }

    /// On cancellation (spec.md §5 "Cancellation": "partial cache writes
    /// are rolled back") the caller simply drops this handler without
    /// calling `finish`; nothing has been written to disk or the index yet,
    /// so there is nothing to roll back.
    async fn finish(self: Box<Self>) -> Result<usize> {
        let body = self.body_buf.freeze();
        let fingerprint = DiskCache::fingerprint_hex(&self.key);
        crate::cache::blob::write_atomic(&self.inner.data_dir, &fingerprint, &body)
            .await
            .map_err(|e| Error::because(pingora::ErrorType::InternalError, "cache blob write", e))?;

        let content_length = body.len() as u64;
        let size = content_length as usize + self.meta.0.len() + self.meta.1.len();
        let entry = IndexedEntry {
            meta: self.meta,
            content_length,
            pin_count: Arc::new(AtomicU64::new(0)),
            stored_at_unix: now_unix(),
            last_access_unix: Arc::new(AtomicI64::new(now_unix())),
            hit_count: Arc::new(AtomicU64::new(0)),
        };
        let _ = self.inner.index.insert_async(self.key, entry).await;
        Ok(size)
    }
}
