//! Shared-memory blobs for large series transfers.
//!
//! A [`BlobStore`] creates named segments, tracks them, and unlinks them
//! when the daemon sends BLOB_RELEASE, when the session tears down, or once
//! they outlive the TTL.
//!
//! TTL reclaim is a liveness heuristic against a crashed or buggy peer. A
//! reader that opened the segment before the TTL keeps a valid mapping; a
//! reader that has not opened it by then finds it gone.

mod shm;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, warn};

pub use shm::{create_segment, unlink_segment};

#[cfg(test)]
pub(crate) use shm::read_segment;

/// Size at which series data moves to shared memory (1 MiB).
pub const SHM_THRESHOLD: usize = 1024 * 1024;

/// Age after which an unreleased blob is reclaimed.
pub const BLOB_TTL: Duration = Duration::from_secs(60);

/// One shared-memory segment.
#[derive(Debug)]
pub struct BlobRef {
    name: String,
    size: usize,
    created_at: Instant,
    released: AtomicBool,
}

impl BlobRef {
    /// Segment name, as sent in BLOB_SHM.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes in the segment.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn is_expired_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }

    /// Unlink the segment. Idempotent; later calls do nothing.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = unlink_segment(&self.name) {
            warn!(name = %self.name, error = %e, "failed to unlink blob");
        }
    }
}

impl Drop for BlobRef {
    fn drop(&mut self) {
        self.release();
    }
}

/// Tracks the blobs one session has handed to the daemon.
#[derive(Debug)]
pub struct BlobStore {
    blobs: Mutex<HashMap<String, Arc<BlobRef>>>,
    counter: AtomicU64,
    nonce: u32,
    ttl: Duration,
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore {
    pub fn new() -> Self {
        Self::with_ttl(BLOB_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            nonce: store_nonce(),
            ttl,
        }
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Short enough for the 31-byte limit some platforms put on names.
    fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("/spectra-blob-{}-{:06x}-{}", std::process::id(), self.nonce, n)
    }

    /// Copy `data` into a new segment and track it.
    ///
    /// Returns `None` when shared memory is unavailable; callers fall back
    /// to sending the data inline.
    pub fn create_blob(&self, data: &[u8]) -> Option<Arc<BlobRef>> {
        let name = self.next_name();
        if let Err(e) = create_segment(&name, data) {
            debug!(name = %name, error = %e, "shared memory unavailable");
            return None;
        }
        let blob = Arc::new(BlobRef {
            name: name.clone(),
            size: data.len(),
            created_at: Instant::now(),
            released: AtomicBool::new(false),
        });
        self.blobs.lock().insert(name, Arc::clone(&blob));
        debug!(name = %blob.name, size = blob.size, "blob created");
        Some(blob)
    }

    /// Release a blob by name. Unknown names are ignored.
    pub fn release_blob(&self, name: &str) -> bool {
        let blob = self.blobs.lock().remove(name);
        match blob {
            Some(blob) => {
                blob.release();
                debug!(name, "blob released");
                true
            }
            None => {
                debug!(name, "release for unknown blob");
                false
            }
        }
    }

    /// Release every blob older than the TTL. Returns how many.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    /// As [`cleanup_expired`](Self::cleanup_expired), judging age against `now`.
    pub fn cleanup_expired_at(&self, now: Instant) -> usize {
        let mut expired = Vec::new();
        self.blobs.lock().retain(|_, blob| {
            if blob.is_expired_at(now, self.ttl) {
                expired.push(Arc::clone(blob));
                false
            } else {
                true
            }
        });
        // Unlink outside the lock.
        for blob in &expired {
            warn!(name = %blob.name, "reclaiming unreleased blob after TTL");
            blob.release();
        }
        expired.len()
    }

    /// Release everything. Called at session teardown.
    pub fn cleanup_all(&self) {
        let blobs: Vec<_> = self.blobs.lock().drain().map(|(_, blob)| blob).collect();
        for blob in &blobs {
            blob.release();
        }
        if !blobs.is_empty() {
            debug!(count = blobs.len(), "released all blobs");
        }
    }

    pub fn active_count(&self) -> usize {
        self.blobs.lock().len()
    }
}

impl Drop for BlobStore {
    fn drop(&mut self) {
        self.cleanup_all();
    }
}

/// Per-store name component mixed from time and pid.
fn store_nonce() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let pid = u64::from(std::process::id());
    let mixed = nanos.wrapping_mul(0x517cc1b727220a95) ^ pid;
    ((mixed >> 32) as u32) & 0x00FF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_release() {
        let store = BlobStore::new();
        let Some(blob) = store.create_blob(&[7u8; 64]) else {
            return;
        };
        assert_eq!(blob.size(), 64);
        assert!(blob.name().starts_with("/spectra-blob-"));
        assert_eq!(store.active_count(), 1);
        assert_eq!(shm::read_segment(blob.name(), 64).unwrap(), vec![7u8; 64]);

        assert!(store.release_blob(blob.name()));
        assert!(blob.is_released());
        assert_eq!(store.active_count(), 0);
        assert!(shm::read_segment(blob.name(), 64).is_err());

        // Second release and unknown names are no-ops.
        assert!(!store.release_blob(blob.name()));
        assert!(!store.release_blob("/spectra-blob-unknown"));
        blob.release();
    }

    #[test]
    fn test_names_unique_per_store() {
        let a = BlobStore::new();
        let b = BlobStore::new();
        let names: Vec<String> = (0..3).map(|_| a.next_name()).chain((0..3).map(|_| b.next_name())).collect();
        for (i, x) in names.iter().enumerate() {
            assert!(x.len() <= 31, "{x} too long");
            for y in &names[i + 1..] {
                assert_ne!(x, y);
            }
        }
    }

    #[test]
    fn test_cleanup_expired_removes_only_old_blob() {
        let store = BlobStore::new();
        let Some(old) = store.create_blob(b"old") else {
            return;
        };
        std::thread::sleep(Duration::from_millis(20));
        let Some(young) = store.create_blob(b"young") else {
            return;
        };

        let now = old.created_at() + BLOB_TTL + Duration::from_millis(1);
        assert_eq!(store.cleanup_expired_at(now), 1);
        assert!(old.is_released());
        assert!(!young.is_released());
        assert_eq!(store.active_count(), 1);

        assert_eq!(store.cleanup_expired_at(now + BLOB_TTL), 1);
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_cleanup_expired_fresh_blobs_kept() {
        let store = BlobStore::new();
        let Some(_blob) = store.create_blob(b"data") else {
            return;
        };
        assert_eq!(store.cleanup_expired(), 0);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_cleanup_all() {
        let store = BlobStore::with_ttl(Duration::from_secs(1));
        let blobs: Vec<_> = (0..3).filter_map(|i| store.create_blob(&[i as u8; 8])).collect();
        if blobs.len() < 3 {
            return;
        }
        store.cleanup_all();
        assert_eq!(store.active_count(), 0);
        assert!(blobs.iter().all(|b| b.is_released()));
    }

    #[test]
    fn test_concurrent_create_and_cleanup() {
        let store = Arc::new(BlobStore::with_ttl(Duration::ZERO));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..16 {
                        if let Some(blob) = store.create_blob(b"x") {
                            store.release_blob(blob.name());
                        }
                        store.cleanup_expired();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        store.cleanup_all();
        assert_eq!(store.active_count(), 0);
    }
}
