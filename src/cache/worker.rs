//! Background slow-codec worker.
//!
//! One task per cache drains jobs strictly one at a time. A short coalescing
//! window after each wake collapses the burst of requests a single page view
//! produces into one draining pass. For every job the worker consults the
//! disk store before compressing, so a restarted process repopulates from
//! disk instead of burning CPU on content it has already seen.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::{compress_slow, Codec, CompressionCache};

/// Burst window; requests arriving within it join the same pass.
const COALESCE_WINDOW: Duration = Duration::from_millis(50);

pub(super) struct Job {
    pub hash: u64,
    pub raw: Vec<u8>,
}

pub(super) fn spawn(cache: Arc<CompressionCache>, mut rx: mpsc::UnboundedReceiver<Job>) {
    tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            tokio::time::sleep(COALESCE_WINDOW).await;

            process(&cache, first).await;
            while let Ok(job) = rx.try_recv() {
                process(&cache, job).await;
            }
            log::debug!("slow-codec queue drained");
        }
    });
}

async fn process(cache: &CompressionCache, job: Job) {
    let Job { hash, raw } = job;
    let path = cache.store_path(hash);

    // Disk first: unchanged content across deploys and restarts is already
    // compressed.
    if let Ok(bytes) = fs::read(&path) {
        cache.put(hash, Codec::Slow, bytes);
        cache.maps.lock().expect("cache lock").pending.remove(&hash);
        return;
    }

    let compressed = tokio::task::spawn_blocking(move || compress_slow(&raw)).await;
    let result = match compressed {
        Ok(result) => result,
        Err(join_err) => {
            log::warn!("slow-codec task panicked: {join_err}");
            cache.maps.lock().expect("cache lock").pending.remove(&hash);
            return;
        }
    };

    match result {
        Ok(bytes) => {
            if let Err(err) = persist(cache, hash, &bytes) {
                // Not fatal: the entry still serves from memory this run.
                log::warn!("persisting slow-codec entry {hash:016x}: {err}");
            }
            cache.put(hash, Codec::Slow, bytes);
        }
        // Dropped, not retried: a payload the codec rejects would otherwise
        // poison the queue forever.
        Err(err) => log::warn!("slow-codec compression failed for {hash:016x}: {err}"),
    }
    cache.maps.lock().expect("cache lock").pending.remove(&hash);
}

fn persist(cache: &CompressionCache, hash: u64, bytes: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(&cache.store_dir)?;
    let path = cache.store_path(hash);
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}
