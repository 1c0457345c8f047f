//! Read-side surface for the HTTP dispatcher.
//!
//! A `SiteHandle` is a cheap clone over one site's coordinator. Every call
//! resolves against whatever generation is published at that instant;
//! requests racing a deploy see the old content until the swap lands, then
//! the new, never a mixture.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::cache::EncodedBody;
use crate::deploy::{DeployCoordinator, DeployStatus, SiteContent};
use crate::payload::{Component, FileContent, Page};

#[derive(Clone)]
pub struct SiteHandle {
    coordinator: Arc<DeployCoordinator>,
}

impl SiteHandle {
    pub fn new(coordinator: Arc<DeployCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<DeployCoordinator> {
        &self.coordinator
    }

    fn content(&self) -> Option<Arc<SiteContent>> {
        self.coordinator.content()
    }

    /// Resolve a request path to a page, with captured route params.
    pub fn lookup_page(&self, pathname: &str) -> Option<(Arc<Page>, Vec<(String, String)>)> {
        self.content()?.index.lookup(pathname)
    }

    pub fn page_by_id(&self, id: &str) -> Option<Arc<Page>> {
        self.content()?.index.page_by_id(id)
    }

    /// Bulk fetch for the builder runtime's "give me these components" call.
    /// Unknown ids are simply absent from the result.
    pub fn components_by_ids(&self, ids: &[&str]) -> HashMap<String, Arc<Component>> {
        let Some(content) = self.content() else {
            return HashMap::new();
        };
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(comp) = content.index.component_by_id(id) {
                found.insert((*id).to_string(), comp);
            }
        }
        found
    }

    /// Serve the `core/`, `site/` and `public/` buckets by path, in that
    /// priority order.
    pub fn renderable_asset(&self, pathname: &str) -> Option<FileContent> {
        let content = self.content()?;
        let path = pathname.trim_start_matches('/');
        let payload = &content.payload;
        payload
            .core_code
            .get(path)
            .or_else(|| payload.site_code.get(path))
            .or_else(|| payload.public_assets.get(path))
            .cloned()
    }

    /// The route summary the builder runtime loads on boot: site metadata,
    /// every page's id and url, and the default layout.
    pub fn route_manifest(&self) -> Option<Value> {
        let content = self.content()?;
        let layout = content.index.default_layout();
        Some(json!({
            "site": {
                "id": content.payload.site.id,
                "name": content.payload.site.name,
                "domain": content.payload.site.domain,
                "favicon": content.payload.site.favicon,
                "responsive": content.payload.site.responsive,
                "api_url": content.payload.site.config.get("api_url").cloned().unwrap_or(Value::Null),
            },
            "urls": content
                .payload
                .pages
                .iter()
                .map(|p| json!({ "id": p.id, "url": p.url }))
                .collect::<Vec<_>>(),
            "layout": {
                "id": layout.as_ref().map(|l| l.id.clone()),
                "root": layout.as_ref().map(|l| l.content_tree.clone()),
            },
        }))
    }

    /// Compress a response body for an `Accept-Encoding` header through the
    /// shared cache. Falls back to identity on any codec trouble.
    pub fn encode_body(&self, raw: &[u8], accept_encoding: &str) -> EncodedBody {
        self.coordinator.cache().encode(raw, accept_encoding)
    }

    pub fn status(&self) -> DeployStatus {
        self.coordinator.status()
    }
}
