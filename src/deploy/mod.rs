//! Deploy orchestration for one site.
//!
//! The coordinator drives a deploy through its phases, publishes the result
//! with a single pointer swap, and guarantees that a failed deploy never
//! unseats the generation that is already serving. Deploys for the same
//! site are serialized behind an async mutex; a request arriving mid-deploy
//! waits its turn instead of racing the timestamp assignment.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde::Serialize;

use crate::cache::CompressionCache;
use crate::index::ContentIndex;
use crate::payload::ContentPayload;
use crate::store::BundleStore;
use crate::{Error, Result};

/// Attempts made to hand freshly written server code to the host before
/// giving up (the listen port may not be bound yet at reload time).
const RELOAD_ATTEMPTS: u32 = 5;
const RELOAD_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Capability for hot-reloading bundled server-side code. Absent when the
/// embedding process cannot execute site code; the coordinator then only
/// writes the files out.
pub trait ServerCodeHost: Send + Sync {
    fn reload(&self, server_dir: &Path, port: u16) -> anyhow::Result<()>;
}

/// One fully built generation of site content. Immutable once published.
pub struct SiteContent {
    pub timestamp: u64,
    pub payload: ContentPayload,
    pub index: ContentIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DeployPhase {
    Idle,
    Fetching,
    Transferring { received: u64, total: u64 },
    Indexing,
    Live,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployStatus {
    pub site_id: String,
    pub phase: DeployPhase,
    pub current: u64,
    pub retained: Vec<u64>,
    pub domains: Vec<String>,
}

pub struct DeployCoordinator {
    store: BundleStore,
    cache: Arc<CompressionCache>,
    live: ArcSwapOption<SiteContent>,
    phase: Mutex<DeployPhase>,
    // Serializes deploy/redeploy per site; see the module docs.
    gate: tokio::sync::Mutex<()>,
    port: u16,
    reload_host: Option<Arc<dyn ServerCodeHost>>,
}

impl DeployCoordinator {
    pub fn new(
        store: BundleStore,
        cache: Arc<CompressionCache>,
        port: u16,
        reload_host: Option<Arc<dyn ServerCodeHost>>,
    ) -> Self {
        Self {
            store,
            cache,
            live: ArcSwapOption::empty(),
            phase: Mutex::new(DeployPhase::Idle),
            gate: tokio::sync::Mutex::new(()),
            port,
            reload_host,
        }
    }

    pub fn store(&self) -> &BundleStore {
        &self.store
    }

    pub fn cache(&self) -> &Arc<CompressionCache> {
        &self.cache
    }

    /// The published generation, if any. Readers get either the previous
    /// complete index or the next one, never anything in between.
    pub fn content(&self) -> Option<Arc<SiteContent>> {
        self.live.load_full()
    }

    pub fn status(&self) -> DeployStatus {
        DeployStatus {
            site_id: self.store.site_id().to_string(),
            phase: self.phase.lock().expect("phase lock").clone(),
            current: self.store.current(),
            retained: self.store.retained(),
            domains: self.store.domains(),
        }
    }

    /// Download a new bundle and make it live.
    pub async fn deploy(&self, source_url: &str) -> Result<DeployStatus> {
        let _serialized = self.gate.lock().await;
        self.set_phase(DeployPhase::Fetching);

        let progress = |received: u64, total: u64| {
            self.set_phase(DeployPhase::Transferring { received, total });
        };
        let ts = match self
            .store
            .create_from_remote(source_url, Some(&progress))
            .await
        {
            Ok(ts) => ts,
            Err(err) => {
                self.settle_phase();
                return Err(err);
            }
        };

        if let Err(err) = self.activate_and_publish(ts).await {
            log::error!(
                "site {}: deploy of {ts} failed after download: {err}",
                self.store.site_id()
            );
            self.settle_phase();
            return Err(err);
        }
        Ok(self.status())
    }

    /// Activate an already-retained timestamp (redeploy / rollback).
    ///
    /// If activation fails the timestamp is treated as corrupt and dropped
    /// from the retained set; the last-known-good generation stays live.
    pub async fn redeploy(&self, ts: u64) -> Result<DeployStatus> {
        let _serialized = self.gate.lock().await;

        if let Err(err) = self.activate_and_publish(ts).await {
            log::error!(
                "site {}: rollback to {ts} failed, pruning it: {err}",
                self.store.site_id()
            );
            self.store.prune(ts)?;
            self.settle_phase();
            return Err(err);
        }
        Ok(self.status())
    }

    /// Re-activate the `current` marker at startup. A cold site (current 0)
    /// is fine; an activation failure leaves the site cold rather than
    /// failing the whole host.
    pub async fn bootstrap(&self) -> Result<()> {
        let current = self.store.current();
        if current == 0 {
            return Ok(());
        }
        let _serialized = self.gate.lock().await;
        self.activate_and_publish(current).await
    }

    pub fn delete_deploy(&self, ts: u64) -> Result<()> {
        self.store.prune(ts)
    }

    async fn activate_and_publish(&self, ts: u64) -> Result<()> {
        self.set_phase(DeployPhase::Indexing);

        // Build everything before touching any published state.
        let payload = self.store.activate(ts)?;
        let index = ContentIndex::build(&payload)?;

        log::info!(
            "site {}: activating deploy {ts} ({} pages, {} components)",
            self.store.site_id(),
            payload.pages.len(),
            payload.components.len()
        );

        let server_code_present = !payload.server_code.is_empty();
        let generation = Arc::new(SiteContent {
            timestamp: ts,
            payload,
            index,
        });

        // All fallible bookkeeping happens before the swap; once the marker
        // names ts, publication is a single infallible pointer store. A
        // failure here leaves the previous generation serving untouched.
        self.store.set_current(ts)?;
        self.live.store(Some(Arc::clone(&generation)));
        self.cache.reset();
        self.set_phase(DeployPhase::Live);

        if server_code_present {
            self.reload_server_code(&generation).await;
        }
        Ok(())
    }

    /// Write bundled server code to the site's well-known location and hand
    /// it to the embedding host. Never fatal: serving static content does
    /// not depend on site server code.
    async fn reload_server_code(&self, generation: &SiteContent) {
        let server_dir = self.store.site_dir().join("server");
        if let Err(err) = write_server_code(&server_dir, generation) {
            log::warn!(
                "site {}: writing server code failed: {err}",
                self.store.site_id()
            );
            return;
        }

        let Some(host) = &self.reload_host else {
            return;
        };
        for attempt in 1..=RELOAD_ATTEMPTS {
            match host.reload(&server_dir, self.port) {
                Ok(()) => return,
                Err(err) if attempt < RELOAD_ATTEMPTS => {
                    log::debug!(
                        "site {}: server code reload attempt {attempt} failed: {err}",
                        self.store.site_id()
                    );
                    tokio::time::sleep(RELOAD_RETRY_DELAY).await;
                }
                Err(err) => {
                    log::warn!(
                        "site {}: server code reload gave up: {err}",
                        self.store.site_id()
                    );
                }
            }
        }
    }

    fn set_phase(&self, phase: DeployPhase) {
        *self.phase.lock().expect("phase lock") = phase;
    }

    /// After a failure, fall back to the phase that reflects reality: Live
    /// when a generation is published, Idle otherwise.
    fn settle_phase(&self) {
        let phase = if self.live.load().is_some() {
            DeployPhase::Live
        } else {
            DeployPhase::Idle
        };
        self.set_phase(phase);
    }
}

fn write_server_code(server_dir: &Path, generation: &SiteContent) -> Result<()> {
    if server_dir.exists() {
        std::fs::remove_dir_all(server_dir).map_err(Error::Io)?;
    }
    std::fs::create_dir_all(server_dir)?;
    for (rel, content) in &generation.payload.server_code {
        let dest = server_dir.join(rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, content.as_bytes())?;
    }
    Ok(())
}
