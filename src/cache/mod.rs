//! Compressed-response cache.
//!
//! Keys are content fingerprints of the pre-compression bytes. Two tiers:
//! a fast codec (gzip) computed synchronously on first miss, and a slow
//! high-ratio codec (zstd, level 19) that is only ever produced by a
//! background worker. A slow-tier miss returns absent immediately and the
//! caller serves the fast tier or identity for that response.
//!
//! Slow-tier results are persisted one file per fingerprint under a cache
//! directory, so restarts (and redeploys of unchanged content) skip the
//! expensive compression. `reset` drops the in-memory maps only; old
//! fingerprints are simply orphaned by the new payload, and the disk store
//! keeps cross-deploy hits warm.

mod hash;
mod worker;

pub use hash::fingerprint;

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use worker::Job;

/// Zstd level for the slow tier. Expensive on purpose; it only ever runs on
/// the background worker.
const SLOW_LEVEL: i32 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// gzip, cheap enough for the serving path.
    Fast,
    /// zstd high-ratio, background-only.
    Slow,
}

#[derive(Default)]
struct CacheMaps {
    fast: HashMap<u64, Arc<Vec<u8>>>,
    slow: HashMap<u64, Arc<Vec<u8>>>,
    pending: HashSet<u64>,
}

pub struct CompressionCache {
    maps: Mutex<CacheMaps>,
    store_dir: PathBuf,
    jobs: mpsc::UnboundedSender<Job>,
}

/// Outcome of [`CompressionCache::encode`]: the body to send plus the
/// content-encoding it carries, if any.
pub struct EncodedBody {
    pub bytes: Arc<Vec<u8>>,
    pub encoding: Option<&'static str>,
}

impl CompressionCache {
    /// Create the cache and spawn its worker task. `store_dir` holds the
    /// persisted slow-tier entries and may be deleted wholesale for a cold
    /// reset.
    pub fn new(store_dir: impl Into<PathBuf>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let cache = Arc::new(Self {
            maps: Mutex::new(CacheMaps::default()),
            store_dir: store_dir.into(),
            jobs: tx,
        });
        worker::spawn(Arc::clone(&cache), rx);
        cache
    }

    pub fn get(&self, hash: u64, codec: Codec) -> Option<Arc<Vec<u8>>> {
        let maps = self.maps.lock().expect("cache lock");
        match codec {
            Codec::Fast => maps.fast.get(&hash).cloned(),
            Codec::Slow => maps.slow.get(&hash).cloned(),
        }
    }

    pub fn put(&self, hash: u64, codec: Codec, bytes: Vec<u8>) {
        let mut maps = self.maps.lock().expect("cache lock");
        let bytes = Arc::new(bytes);
        match codec {
            Codec::Fast => maps.fast.insert(hash, bytes),
            Codec::Slow => maps.slow.insert(hash, bytes),
        };
    }

    /// Queue slow-codec compression of `raw` unless the result is already
    /// cached or the hash is pending. Fire-and-forget; failures surface in
    /// the worker's log only.
    pub fn request_slow(&self, hash: u64, raw: Vec<u8>) {
        {
            let mut maps = self.maps.lock().expect("cache lock");
            if maps.slow.contains_key(&hash) || !maps.pending.insert(hash) {
                return;
            }
        }
        if self.jobs.send(Job { hash, raw }).is_err() {
            // Worker is gone (shutdown); drop the reservation.
            self.maps.lock().expect("cache lock").pending.remove(&hash);
        }
    }

    /// Serving-path helper: pick the best representation of `raw` for an
    /// `Accept-Encoding` header. Compression is strictly an optimization;
    /// any codec failure falls back to the identity body.
    pub fn encode(&self, raw: &[u8], accept_encoding: &str) -> EncodedBody {
        let accept = accept_encoding.to_ascii_lowercase();
        let hash = fingerprint(raw);

        if accept.contains("zstd") {
            if let Some(bytes) = self.get(hash, Codec::Slow) {
                return EncodedBody {
                    bytes,
                    encoding: Some("zstd"),
                };
            }
            self.request_slow(hash, raw.to_vec());
        }

        if accept.contains("gzip") || accept.contains("gz") {
            if let Some(bytes) = self.get(hash, Codec::Fast) {
                return EncodedBody {
                    bytes,
                    encoding: Some("gzip"),
                };
            }
            match compress_fast(raw) {
                Ok(compressed) => {
                    let bytes = Arc::new(compressed);
                    self.maps
                        .lock()
                        .expect("cache lock")
                        .fast
                        .insert(hash, Arc::clone(&bytes));
                    return EncodedBody {
                        bytes,
                        encoding: Some("gzip"),
                    };
                }
                Err(err) => log::warn!("fast codec failed, serving identity: {err}"),
            }
        }

        EncodedBody {
            bytes: Arc::new(raw.to_vec()),
            encoding: None,
        }
    }

    /// Called on every successful deploy swap. Drops the in-memory tiers and
    /// the pending set; the disk store is left alone.
    pub fn reset(&self) {
        let mut maps = self.maps.lock().expect("cache lock");
        maps.fast.clear();
        maps.slow.clear();
        maps.pending.clear();
    }

    fn store_path(&self, hash: u64) -> PathBuf {
        self.store_dir.join(format!("{hash:016x}"))
    }
}

fn compress_fast(raw: &[u8]) -> crate::Result<Vec<u8>> {
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| crate::Error::Codec(format!("gzip: {e}")))
}

fn compress_slow(raw: &[u8]) -> crate::Result<Vec<u8>> {
    zstd::bulk::compress(raw, SLOW_LEVEL).map_err(|e| crate::Error::Codec(format!("zstd: {e}")))
}
