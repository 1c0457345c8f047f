//! Multi-site bootstrap.
//!
//! Scans the data root for site directories, opens a bundle store and
//! coordinator for each, and re-activates whatever was current before the
//! process went down. One site failing to come up leaves that site cold and
//! the rest serving; the failure only shows in the log and in that site's
//! status.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::CompressionCache;
use crate::deploy::{DeployCoordinator, ServerCodeHost};
use crate::serve::SiteHandle;
use crate::store::BundleStore;

/// Slow-codec disk store, shared by every site under the root.
const CACHE_DIR: &str = ".compress-cache";

pub struct Host {
    root: PathBuf,
    sites: HashMap<String, SiteHandle>,
}

impl Host {
    pub async fn load(
        root: &Path,
        port: u16,
        reload_host: Option<Arc<dyn ServerCodeHost>>,
    ) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("create data root {}", root.display()))?;
        let cache = CompressionCache::new(root.join(CACHE_DIR));

        let mut sites = HashMap::new();
        for entry in std::fs::read_dir(root).context("scan data root")? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(site_id) = name.to_str() else {
                continue;
            };
            if site_id.starts_with('.') {
                continue;
            }

            let store = BundleStore::open(root, site_id)
                .with_context(|| format!("open bundle store for {site_id}"))?;
            let coordinator = Arc::new(DeployCoordinator::new(
                store,
                Arc::clone(&cache),
                port,
                reload_host.clone(),
            ));

            if let Err(err) = coordinator.bootstrap().await {
                log::error!("site {site_id}: activation failed, serving cold: {err}");
            }
            sites.insert(site_id.to_string(), SiteHandle::new(coordinator));
        }

        log::info!("loaded {} site(s) from {}", sites.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            sites,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn site(&self, site_id: &str) -> Option<&SiteHandle> {
        self.sites.get(site_id)
    }

    /// Resolve a request hostname to the site bound to it.
    pub fn site_by_domain(&self, domain: &str) -> Option<&SiteHandle> {
        self.sites.values().find(|handle| {
            handle
                .coordinator()
                .store()
                .domains()
                .iter()
                .any(|d| d == domain)
        })
    }

    pub fn sites(&self) -> impl Iterator<Item = (&str, &SiteHandle)> {
        self.sites.iter().map(|(id, handle)| (id.as_str(), handle))
    }
}
