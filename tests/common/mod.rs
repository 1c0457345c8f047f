#![allow(dead_code)]

use std::io::Read;

use serde_json::json;

/// Minimal ZIP writer for test bundles: local headers, central directory,
/// EOCD footer. Enough surface to exercise every reader path, including
/// unsupported methods and shuffled directory order.
pub struct ZipBuilder {
    data: Vec<u8>,
    central: Vec<Vec<u8>>,
    reverse_directory: bool,
}

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            central: Vec::new(),
            reverse_directory: false,
        }
    }

    /// Emit central directory records in reverse of entry order.
    pub fn reverse_directory(mut self) -> Self {
        self.reverse_directory = true;
        self
    }

    pub fn add_stored(self, path: &str, content: &[u8]) -> Self {
        let len = content.len();
        self.add_entry(path, METHOD_STORED, content, len)
    }

    pub fn add_deflate(self, path: &str, content: &[u8]) -> Self {
        let mut compressed = Vec::new();
        flate2::read::DeflateEncoder::new(content, flate2::Compression::default())
            .read_to_end(&mut compressed)
            .expect("deflate");
        self.add_entry(path, METHOD_DEFLATE, &compressed, content.len())
    }

    /// An entry claiming a compression method the reader does not support.
    pub fn add_with_method(self, path: &str, method: u16, content: &[u8]) -> Self {
        let len = content.len();
        self.add_entry(path, method, content, len)
    }

    fn add_entry(
        mut self,
        path: &str,
        method: u16,
        stored_bytes: &[u8],
        uncompressed_len: usize,
    ) -> Self {
        let name = path.as_bytes();
        let offset = self.data.len() as u32;

        // Local file header.
        self.data.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        self.data.extend_from_slice(&20u16.to_le_bytes()); // version needed
        self.data.extend_from_slice(&0u16.to_le_bytes()); // flags
        self.data.extend_from_slice(&method.to_le_bytes());
        self.data.extend_from_slice(&0u32.to_le_bytes()); // mod time+date
        self.data.extend_from_slice(&0u32.to_le_bytes()); // crc32
        self.data
            .extend_from_slice(&(stored_bytes.len() as u32).to_le_bytes());
        self.data
            .extend_from_slice(&(uncompressed_len as u32).to_le_bytes());
        self.data
            .extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // extra len
        self.data.extend_from_slice(name);
        self.data.extend_from_slice(stored_bytes);

        // Matching central directory record.
        let mut rec = Vec::new();
        rec.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        rec.extend_from_slice(&20u16.to_le_bytes()); // version made by
        rec.extend_from_slice(&20u16.to_le_bytes()); // version needed
        rec.extend_from_slice(&0u16.to_le_bytes()); // flags
        rec.extend_from_slice(&method.to_le_bytes());
        rec.extend_from_slice(&0u32.to_le_bytes()); // mod time+date
        rec.extend_from_slice(&0u32.to_le_bytes()); // crc32
        rec.extend_from_slice(&(stored_bytes.len() as u32).to_le_bytes());
        rec.extend_from_slice(&(uncompressed_len as u32).to_le_bytes());
        rec.extend_from_slice(&(name.len() as u16).to_le_bytes());
        rec.extend_from_slice(&0u16.to_le_bytes()); // extra len
        rec.extend_from_slice(&0u16.to_le_bytes()); // comment len
        rec.extend_from_slice(&0u16.to_le_bytes()); // disk number
        rec.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        rec.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        rec.extend_from_slice(&offset.to_le_bytes());
        rec.extend_from_slice(name);
        self.central.push(rec);
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.reverse_directory {
            self.central.reverse();
        }
        let dir_offset = self.data.len() as u32;
        let mut dir_size = 0u32;
        for rec in &self.central {
            dir_size += rec.len() as u32;
            self.data.extend_from_slice(rec);
        }

        // EOCD footer.
        self.data.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // this disk
        self.data.extend_from_slice(&0u16.to_le_bytes()); // directory disk
        self.data
            .extend_from_slice(&(self.central.len() as u16).to_le_bytes());
        self.data
            .extend_from_slice(&(self.central.len() as u16).to_le_bytes());
        self.data.extend_from_slice(&dir_size.to_le_bytes());
        self.data.extend_from_slice(&dir_offset.to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // comment len
        self.data
    }
}

/// A complete single-page bundle archive: metadata plus one public asset.
pub fn bundle_with_pages(pages: &[(&str, &str)]) -> Vec<u8> {
    let metadata = json!({
        "site": { "id": "site-1", "name": "Test Site", "domain": "example.test" },
        "layouts": [
            { "id": "layout-1", "name": "main", "is_default_layout": true, "content_tree": {} }
        ],
        "pages": pages
            .iter()
            .map(|(id, url)| json!({ "id": id, "url": url, "name": id, "content_tree": {} }))
            .collect::<Vec<_>>(),
        "components": [
            { "id": "comp-1", "name": "button", "content_tree": {}, "props": {} }
        ],
    });

    ZipBuilder::new()
        .add_stored("metadata.json", metadata.to_string().as_bytes())
        .add_stored("public/index.css", b"body { margin: 0 }")
        .finish()
}

/// A legacy gzip-JSON bundle with the same single-page shape.
pub fn legacy_bundle_with_pages(pages: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;

    let doc = json!({
        "site": { "id": "site-1", "name": "Legacy Site" },
        "layouts": [],
        "pages": pages
            .iter()
            .map(|(id, url)| json!({ "id": id, "url": url, "content_tree": {} }))
            .collect::<Vec<_>>(),
        "comps": [],
        "public": { "legacy.txt": "from the old format" },
        "code": { "server": {}, "site": {}, "core": {} },
    });

    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(doc.to_string().as_bytes())
        .expect("gzip write");
    encoder.finish().expect("gzip finish")
}
