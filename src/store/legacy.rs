//! One-time import path for legacy bundles.
//!
//! Older deployments were a single gzip-compressed JSON document instead of
//! an archive. They stay readable so an existing site can roll back across
//! the format change, but nothing ever writes this encoding again.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use serde_json::Value;

use crate::payload::{Component, ContentPayload, FileBucket, FileContent, Layout, Page, Site};
use crate::{Error, Result};

#[derive(Debug, Deserialize, Default)]
struct LegacyCode {
    #[serde(default)]
    server: BTreeMap<String, Value>,
    #[serde(default)]
    site: BTreeMap<String, Value>,
    #[serde(default)]
    core: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct LegacyBundle {
    #[serde(default)]
    site: Site,
    #[serde(default)]
    layouts: Vec<Layout>,
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default, alias = "comps")]
    components: Vec<Component>,
    #[serde(default)]
    public: BTreeMap<String, Value>,
    #[serde(default)]
    code: LegacyCode,
}

/// Decode a gzip-JSON bundle into the canonical payload shape.
pub fn import(raw: &[u8]) -> Result<ContentPayload> {
    let mut json = Vec::new();
    flate2::read::GzDecoder::new(raw)
        .read_to_end(&mut json)
        .map_err(|e| Error::Codec(format!("gunzip legacy bundle: {e}")))?;

    let bundle: LegacyBundle = serde_json::from_slice(&json)
        .map_err(|e| Error::Codec(format!("parse legacy bundle: {e}")))?;

    Ok(ContentPayload {
        site: bundle.site,
        layouts: bundle.layouts,
        pages: bundle.pages,
        components: bundle.components,
        public_assets: bucket_from_values(bundle.public),
        server_code: bucket_from_values(bundle.code.server),
        site_code: bucket_from_values(bundle.code.site),
        core_code: bucket_from_values(bundle.code.core),
    })
}

/// Legacy buckets stored file bodies as JSON strings (text) or number
/// arrays (binary).
fn bucket_from_values(values: BTreeMap<String, Value>) -> FileBucket {
    let mut bucket = FileBucket::new();
    for (path, value) in values {
        if !crate::payload::is_safe_relative(&path) {
            log::warn!("skipping legacy bundle entry with unsafe path: {path}");
            continue;
        }
        let content = match value {
            Value::String(text) => FileContent::Text(text),
            Value::Array(nums) => FileContent::Binary(
                nums.into_iter()
                    .filter_map(|n| n.as_u64().map(|b| b as u8))
                    .collect(),
            ),
            other => FileContent::Text(other.to_string()),
        };
        bucket.insert(path, content);
    }
    bucket
}
