//! Deployment content engine for packaged site bundles.
//!
//! Downloads a site's deploy bundle, indexes its pages, layouts and
//! components, and serves the result with cached response compression.
//! Deploy swaps are zero-downtime: a new generation is built off to the
//! side and published with one pointer swap, and any retained prior
//! timestamp can be rolled back to.

pub mod archive;
pub mod cache;
pub mod deploy;
pub mod error;
pub mod host;
pub mod index;
pub mod payload;
pub mod serve;
pub mod store;

pub use cache::{fingerprint, Codec, CompressionCache};
pub use deploy::{DeployCoordinator, DeployPhase, DeployStatus, ServerCodeHost, SiteContent};
pub use error::{Error, Result};
pub use host::Host;
pub use index::{ContentIndex, RouteMatch, RouteTree};
pub use payload::{Component, ContentPayload, FileContent, Layout, Page, Site};
pub use serve::SiteHandle;
pub use store::BundleStore;
