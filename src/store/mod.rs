//! Versioned bundle store.
//!
//! One directory per site holds every retained bundle keyed by its
//! timestamp, a `current` marker naming the live one, and the site's bound
//! domains. Bundles are immutable once written; deploys add new timestamps
//! and move the marker, retention pruning deletes old ones.
//!
//! On-disk layout:
//!
//! ```text
//! <root>/<site_id>/current            ASCII integer timestamp
//! <root>/<site_id>/deploys/<ts>.zip   canonical bundle
//! <root>/<site_id>/deploys/<ts>.gz    legacy bundle (import only)
//! <root>/<site_id>/deploys/<ts>.info  JSON marker for the bundle
//! <root>/<site_id>/domains.json       bound hostnames
//! ```

pub mod legacy;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::payload::ContentPayload;
use crate::{Error, Result};

const CURRENT_FILE: &str = "current";
const DEPLOYS_DIR: &str = "deploys";
const DOMAINS_FILE: &str = "domains.json";

/// Progress callback for streamed downloads: (received, total) bytes.
/// Total is 0 when the source sent no content length.
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

#[derive(Debug, Serialize)]
struct BundleInfo {
    format: &'static str,
    timestamp: u64,
    site_id: String,
}

// `retained` stays sorted ascending; `current` is 0 when nothing is live.
// Every mutation of the pair happens under one lock so a concurrent
// list-then-prune cannot lose an update.
struct StoreState {
    current: u64,
    retained: Vec<u64>,
}

pub struct BundleStore {
    site_id: String,
    site_dir: PathBuf,
    state: Mutex<StoreState>,
}

impl BundleStore {
    /// Open (creating if needed) the store for one site, scanning the
    /// deploys directory for retained timestamps. A `current` marker that
    /// does not name a retained bundle is reset to 0.
    pub fn open(root: &Path, site_id: &str) -> Result<Self> {
        let site_dir = root.join(site_id);
        fs::create_dir_all(site_dir.join(DEPLOYS_DIR))?;

        let mut retained = Vec::new();
        for entry in fs::read_dir(site_dir.join(DEPLOYS_DIR))? {
            let entry = entry?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(name) => name,
                None => continue,
            };
            let stem = name
                .strip_suffix(".zip")
                .or_else(|| name.strip_suffix(".gz"));
            if let Some(stem) = stem {
                if let Ok(ts) = stem.parse::<u64>() {
                    retained.push(ts);
                }
            }
        }
        retained.sort_unstable();
        retained.dedup();

        let mut current = read_current(&site_dir.join(CURRENT_FILE));
        if current != 0 && !retained.contains(&current) {
            log::warn!("site {site_id}: current {current} has no retained bundle, resetting");
            current = 0;
        }

        Ok(Self {
            site_id: site_id.to_string(),
            site_dir,
            state: Mutex::new(StoreState { current, retained }),
        })
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn site_dir(&self) -> &Path {
        &self.site_dir
    }

    pub fn current(&self) -> u64 {
        self.state.lock().expect("store lock").current
    }

    /// Retained timestamps, ascending.
    pub fn retained(&self) -> Vec<u64> {
        self.state.lock().expect("store lock").retained.clone()
    }

    /// Download a bundle and record it under a fresh timestamp.
    ///
    /// The body is streamed to a temp file and renamed into place only on
    /// success, so a transport failure leaves no partial bundle visible.
    /// Concurrent downloads for the same site must be serialized by the
    /// caller to keep timestamps monotonic.
    pub async fn create_from_remote(
        &self,
        url: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<u64> {
        log::info!("site {}: downloading bundle from {url}", self.site_id);
        let response = reqwest::get(url)
            .await
            .map_err(|e| Error::Download(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "{url}: status {}",
                response.status()
            )));
        }
        let total = response.content_length().unwrap_or(0);

        let ts = self.next_timestamp();
        let dest = self.bundle_path(ts);
        let tmp = dest.with_extension("zip.tmp");
        let result = self
            .stream_to_file(response, &tmp, total, progress)
            .await;
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }

        self.publish_bundle(&tmp, &dest, ts)?;
        Ok(ts)
    }

    /// Record an already-downloaded bundle buffer under a fresh timestamp.
    pub fn import_bytes(&self, bytes: &[u8]) -> Result<u64> {
        let ts = self.next_timestamp();
        let dest = self.bundle_path(ts);
        let tmp = dest.with_extension("zip.tmp");
        fs::write(&tmp, bytes)?;
        self.publish_bundle(&tmp, &dest, ts)?;
        Ok(ts)
    }

    /// Materialize the payload for a retained timestamp. Canonical archives
    /// take priority; a `.gz` sibling is read through the legacy importer.
    pub fn activate(&self, ts: u64) -> Result<ContentPayload> {
        if !self.state.lock().expect("store lock").retained.contains(&ts) {
            return Err(Error::NotFound(format!(
                "deploy {ts} for site {}",
                self.site_id
            )));
        }

        let zip_path = self.bundle_path(ts);
        if zip_path.exists() {
            let bytes = fs::read(&zip_path)?;
            return ContentPayload::from_archive(&bytes);
        }

        let gz_path = self.legacy_path(ts);
        if gz_path.exists() {
            let bytes = fs::read(&gz_path)?;
            return legacy::import(&bytes);
        }

        Err(Error::NotFound(format!(
            "bundle file for deploy {ts} of site {}",
            self.site_id
        )))
    }

    /// Move the `current` marker. The timestamp must be retained.
    pub fn set_current(&self, ts: u64) -> Result<()> {
        let mut state = self.state.lock().expect("store lock");
        if ts != 0 && !state.retained.contains(&ts) {
            return Err(Error::NotFound(format!(
                "deploy {ts} for site {}",
                self.site_id
            )));
        }
        write_atomic(
            &self.site_dir.join(CURRENT_FILE),
            ts.to_string().as_bytes(),
        )?;
        state.current = ts;
        Ok(())
    }

    /// Delete a retained bundle. Pruning the live timestamp is refused as a
    /// no-op; pruning an unknown timestamp is also a no-op.
    pub fn prune(&self, ts: u64) -> Result<()> {
        let mut state = self.state.lock().expect("store lock");
        if ts == state.current {
            log::warn!("site {}: refusing to prune live deploy {ts}", self.site_id);
            return Ok(());
        }
        let Some(pos) = state.retained.iter().position(|&t| t == ts) else {
            return Ok(());
        };
        let _ = fs::remove_file(self.bundle_path(ts));
        let _ = fs::remove_file(self.legacy_path(ts));
        let _ = fs::remove_file(self.info_path(ts));
        state.retained.remove(pos);
        Ok(())
    }

    pub fn domains(&self) -> Vec<String> {
        fs::read(self.site_dir.join(DOMAINS_FILE))
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    pub fn add_domain(&self, domain: &str) -> Result<()> {
        let mut domains = self.domains();
        if !domains.iter().any(|d| d == domain) {
            domains.push(domain.to_string());
            self.write_domains(&domains)?;
        }
        Ok(())
    }

    pub fn remove_domain(&self, domain: &str) -> Result<()> {
        let mut domains = self.domains();
        let before = domains.len();
        domains.retain(|d| d != domain);
        if domains.len() != before {
            self.write_domains(&domains)?;
        }
        Ok(())
    }

    fn write_domains(&self, domains: &[String]) -> Result<()> {
        let json = serde_json::to_vec_pretty(domains)
            .map_err(|e| Error::Codec(format!("encode domains: {e}")))?;
        write_atomic(&self.site_dir.join(DOMAINS_FILE), &json)
    }

    fn bundle_path(&self, ts: u64) -> PathBuf {
        self.site_dir.join(DEPLOYS_DIR).join(format!("{ts}.zip"))
    }

    fn legacy_path(&self, ts: u64) -> PathBuf {
        self.site_dir.join(DEPLOYS_DIR).join(format!("{ts}.gz"))
    }

    fn info_path(&self, ts: u64) -> PathBuf {
        self.site_dir.join(DEPLOYS_DIR).join(format!("{ts}.info"))
    }

    /// Wall-clock millis, bumped past the newest retained timestamp if the
    /// clock has not advanced since the last deploy.
    fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let state = self.state.lock().expect("store lock");
        match state.retained.last() {
            Some(&newest) if now <= newest => newest + 1,
            _ => now,
        }
    }

    async fn stream_to_file(
        &self,
        mut response: reqwest::Response,
        tmp: &Path,
        total: u64,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<()> {
        let mut file = File::create(tmp)?;
        let mut received = 0u64;
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| Error::Download(e.to_string()))?;
            let Some(chunk) = chunk else { break };
            file.write_all(&chunk)?;
            received += chunk.len() as u64;
            if let Some(progress) = progress {
                progress(received, total);
            }
        }
        file.sync_all()?;
        Ok(())
    }

    fn publish_bundle(&self, tmp: &Path, dest: &Path, ts: u64) -> Result<()> {
        fs::rename(tmp, dest)?;
        fsync_dir(dest.parent().ok_or(Error::Format("bundle has no parent"))?)?;

        let info = BundleInfo {
            format: "zip",
            timestamp: ts,
            site_id: self.site_id.clone(),
        };
        let json = serde_json::to_vec_pretty(&info)
            .map_err(|e| Error::Codec(format!("encode bundle info: {e}")))?;
        write_atomic(&self.info_path(ts), &json)?;

        let mut state = self.state.lock().expect("store lock");
        match state.retained.binary_search(&ts) {
            Ok(_) => {}
            Err(pos) => state.retained.insert(pos, ts),
        }
        Ok(())
    }
}

fn read_current(path: &Path) -> u64 {
    fs::read_to_string(path)
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .unwrap_or(0)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}
