//! Parsed bundle content.
//!
//! A bundle carries one `metadata.json` entry describing the site, its
//! layouts, pages and components, plus `public/`, `server/`, `site/` and
//! `core/` file buckets. The payload is assembled once per activation and
//! held immutably until the next deploy replaces it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::archive;
use crate::{Error, Result};

pub const METADATA_ENTRY: &str = "metadata.json";

/// Extensions stored as raw bytes; everything else is decoded as UTF-8 text.
const BINARY_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "ico", "svg", "woff", "woff2", "ttf", "eot", "js", "css", "map",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Site {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub favicon: String,
    #[serde(default)]
    pub responsive: String,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content_tree: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_default_layout: bool,
    #[serde(default)]
    pub content_tree: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content_tree: Value,
    #[serde(default)]
    pub props: Value,
}

/// Shape of the `metadata.json` entry inside a bundle.
#[derive(Debug, Deserialize)]
pub struct BundleMetadata {
    #[serde(default)]
    pub site: Site,
    #[serde(default)]
    pub layouts: Vec<Layout>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    fn from_bytes(path: &str, bytes: Vec<u8>) -> Self {
        if is_binary_path(path) {
            return FileContent::Binary(bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) => FileContent::Text(text),
            Err(err) => FileContent::Binary(err.into_bytes()),
        }
    }
}

pub type FileBucket = BTreeMap<String, FileContent>;

/// Fully parsed result of one bundle; the unit a deploy swap publishes.
#[derive(Debug, Clone, Default)]
pub struct ContentPayload {
    pub site: Site,
    pub layouts: Vec<Layout>,
    pub pages: Vec<Page>,
    pub components: Vec<Component>,
    pub public_assets: FileBucket,
    pub server_code: FileBucket,
    pub site_code: FileBucket,
    pub core_code: FileBucket,
}

impl ContentPayload {
    /// Assemble a payload from raw archive bytes.
    ///
    /// Entries with an unsupported compression method are logged and
    /// skipped; a missing or unreadable `metadata.json` fails the load.
    pub fn from_archive(archive_bytes: &[u8]) -> Result<Self> {
        let entries = archive::read_directory(archive_bytes)?;

        let metadata = entries
            .iter()
            .find(|e| e.path == METADATA_ENTRY)
            .ok_or_else(|| Error::NotFound(format!("{METADATA_ENTRY} entry in bundle")))?;
        let metadata_bytes = metadata.decompress(archive_bytes)?;
        let metadata: BundleMetadata = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| Error::Codec(format!("parse {METADATA_ENTRY}: {e}")))?;

        let mut payload = ContentPayload {
            site: metadata.site,
            layouts: metadata.layouts,
            pages: metadata.pages,
            components: metadata.components,
            ..Default::default()
        };

        for entry in &entries {
            if entry.is_dir() || entry.path == METADATA_ENTRY {
                continue;
            }
            let (bucket, rest) = match split_bucket(&entry.path) {
                Some(found) => found,
                None => continue,
            };
            if !is_safe_relative(rest) {
                log::warn!("skipping bundle entry with unsafe path: {}", entry.path);
                continue;
            }
            let bytes = match entry.decompress(archive_bytes) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("skipping bundle entry {}: {err}", entry.path);
                    continue;
                }
            };
            let content = FileContent::from_bytes(rest, bytes);
            match bucket {
                Bucket::Public => payload.public_assets.insert(rest.to_string(), content),
                Bucket::Server => payload.server_code.insert(rest.to_string(), content),
                Bucket::Site => payload.site_code.insert(rest.to_string(), content),
                Bucket::Core => payload.core_code.insert(rest.to_string(), content),
            };
        }

        Ok(payload)
    }
}

enum Bucket {
    Public,
    Server,
    Site,
    Core,
}

fn split_bucket(path: &str) -> Option<(Bucket, &str)> {
    if let Some(rest) = path.strip_prefix("public/") {
        return Some((Bucket::Public, rest));
    }
    if let Some(rest) = path.strip_prefix("server/") {
        return Some((Bucket::Server, rest));
    }
    if let Some(rest) = path.strip_prefix("site/") {
        return Some((Bucket::Site, rest));
    }
    if let Some(rest) = path.strip_prefix("core/") {
        return Some((Bucket::Core, rest));
    }
    None
}

/// Bucket-relative paths are joined onto on-disk directories when server
/// code is written out, so anything that could escape the bucket root is
/// rejected: absolute paths, `..` components, and empty segments.
pub(crate) fn is_safe_relative(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return false;
    }
    path.split('/').all(|seg| !seg.is_empty() && seg != "..")
}

fn is_binary_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    BINARY_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}

#[cfg(test)]
mod tests {
    use super::{is_binary_path, is_safe_relative, split_bucket, Bucket};

    #[test]
    fn bucket_prefixes() {
        assert!(matches!(
            split_bucket("public/index.html"),
            Some((Bucket::Public, "index.html"))
        ));
        assert!(matches!(
            split_bucket("server/index.js"),
            Some((Bucket::Server, "index.js"))
        ));
        assert!(split_bucket("other/file").is_none());
    }

    #[test]
    fn traversal_paths_are_rejected() {
        assert!(is_safe_relative("js/app.js"));
        assert!(is_safe_relative("deep/nested/file.txt"));
        assert!(!is_safe_relative("../../escaped.txt"));
        assert!(!is_safe_relative("a/../b"));
        assert!(!is_safe_relative("/etc/passwd"));
        assert!(!is_safe_relative("a//b"));
        assert!(!is_safe_relative(""));
    }

    #[test]
    fn binary_detection_is_case_insensitive() {
        assert!(is_binary_path("img/Logo.PNG"));
        assert!(is_binary_path("main.js"));
        assert!(!is_binary_path("index.html"));
    }
}
