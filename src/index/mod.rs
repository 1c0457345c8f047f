//! In-memory content index over one payload.
//!
//! Pure construction: routes, id maps and the default layout are built into
//! fresh structures and the result is published with a single pointer swap,
//! so concurrent readers never observe a partially built index. A duplicate
//! page URL fails the whole build; the previously published index stays
//! live in that case.

mod router;

pub use router::{RouteMatch, RouteTree};

use std::collections::HashMap;
use std::sync::Arc;

use crate::payload::{Component, ContentPayload, Layout, Page};
use crate::Result;

#[derive(Debug, Default)]
pub struct ContentIndex {
    routes: RouteTree,
    pages: HashMap<String, Arc<Page>>,
    components: HashMap<String, Arc<Component>>,
    default_layout: Option<Arc<Layout>>,
}

impl ContentIndex {
    pub fn build(payload: &ContentPayload) -> Result<Self> {
        let mut routes = RouteTree::new();
        let mut pages = HashMap::with_capacity(payload.pages.len());
        for page in &payload.pages {
            routes.insert(&page.url, &page.id)?;
            pages.insert(page.id.clone(), Arc::new(page.clone()));
        }

        let components = payload
            .components
            .iter()
            .map(|comp| (comp.id.clone(), Arc::new(comp.clone())))
            .collect();

        // The flagged layout wins; otherwise declaration order decides.
        let default_layout = payload
            .layouts
            .iter()
            .find(|l| l.is_default_layout)
            .or_else(|| payload.layouts.first())
            .map(|l| Arc::new(l.clone()));

        Ok(Self {
            routes,
            pages,
            components,
            default_layout,
        })
    }

    pub fn lookup(&self, pathname: &str) -> Option<(Arc<Page>, Vec<(String, String)>)> {
        let found = self.routes.lookup(pathname)?;
        let page = self.pages.get(&found.page_id)?;
        Some((Arc::clone(page), found.params))
    }

    pub fn page_by_id(&self, id: &str) -> Option<Arc<Page>> {
        self.pages.get(id).cloned()
    }

    pub fn component_by_id(&self, id: &str) -> Option<Arc<Component>> {
        self.components.get(id).cloned()
    }

    /// Absent when the payload declared no layouts at all; callers render
    /// without one rather than failing.
    pub fn default_layout(&self) -> Option<Arc<Layout>> {
        self.default_layout.clone()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn routes(&self) -> Vec<(String, String)> {
        self.routes.routes()
    }
}
