//! Bundle container reader.
//!
//! Bundles are plain ZIP files. This module reads the end-of-central-directory
//! footer, walks the central directory into an entry list, and inflates
//! individual entries on demand. Only methods 0 (stored) and 8 (raw deflate)
//! are handled; anything else fails that entry alone so the rest of the
//! archive stays usable.

mod cursor;

pub use cursor::Cursor;

use std::io::Read;

use crate::{Error, Result};

/// End-of-central-directory signature ('PK\x05\x06').
pub const EOCD_MAGIC: u32 = 0x0605_4b50;
/// Central directory file header signature ('PK\x01\x02').
pub const CENTRAL_MAGIC: u32 = 0x0201_4b50;
/// Local file header signature ('PK\x03\x04').
pub const LOCAL_MAGIC: u32 = 0x0403_4b50;

/// Fixed part of the EOCD record.
const EOCD_LEN: usize = 22;
/// Fixed part of a central directory record.
const CENTRAL_LEN: usize = 46;
/// Fixed part of a local file header.
const LOCAL_LEN: usize = 30;
/// Maximum trailing comment the footer scan tolerates.
const MAX_COMMENT_LEN: usize = 65_535;
/// Ceiling on the output buffer reserved up front from a header's declared
/// uncompressed size; larger entries grow the buffer as they inflate.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

/// One file in the container directory. Offsets refer to the archive buffer
/// the entry was parsed from.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub local_header_offset: u64,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Decompress this entry's bytes out of `archive`, the same buffer the
    /// directory was read from.
    pub fn decompress(&self, archive: &[u8]) -> Result<Vec<u8>> {
        if self.uncompressed_size == 0 {
            return Ok(Vec::new());
        }

        let cur = Cursor::new(archive);
        let base = self.local_header_offset as usize;
        if cur.u32_le(base)? != LOCAL_MAGIC {
            return Err(Error::Format("bad local header signature"));
        }
        // Name/extra lengths in the local header may differ from the central
        // record, so the data offset comes from here.
        let name_len = cur.u16_le(base + 26)? as usize;
        let extra_len = cur.u16_le(base + 28)? as usize;
        let data_start = base + LOCAL_LEN + name_len + extra_len;
        let data = cur.bytes(data_start, self.compressed_size as usize)?;

        match self.method {
            METHOD_STORED => Ok(data.to_vec()),
            METHOD_DEFLATE => {
                // The declared size is untrusted header data; cap the
                // pre-allocation and let read_to_end grow past it if the
                // stream really is that large.
                let cap = (self.uncompressed_size as usize).min(MAX_PREALLOC);
                let mut out = Vec::with_capacity(cap);
                let mut decoder = flate2::read::DeflateDecoder::new(data);
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| Error::Codec(format!("inflate {}: {e}", self.path)))?;
                Ok(out)
            }
            other => Err(Error::Unsupported {
                path: self.path.clone(),
                method: other,
            }),
        }
    }
}

/// Parse the central directory of `archive` into an entry list.
///
/// Entries come back in directory order, which is not necessarily offset
/// order. A missing footer aborts the load; trailing padding after the last
/// directory record is tolerated.
pub fn read_directory(archive: &[u8]) -> Result<Vec<Entry>> {
    let cur = Cursor::new(archive);
    let eocd = find_eocd(&cur)?;

    let total_entries = cur.u16_le(eocd + 10)? as usize;
    let dir_offset = cur.u32_le(eocd + 16)? as usize;

    let mut entries = Vec::with_capacity(total_entries);
    let mut offset = dir_offset;
    for _ in 0..total_entries {
        // Stop cleanly at the first record that does not carry the directory
        // signature instead of erroring on writer quirks.
        match cur.u32_le(offset) {
            Ok(sig) if sig == CENTRAL_MAGIC => {}
            _ => break,
        }

        let method = cur.u16_le(offset + 10)?;
        let crc32 = cur.u32_le(offset + 16)?;
        let compressed_size = cur.u32_le(offset + 20)? as u64;
        let uncompressed_size = cur.u32_le(offset + 24)? as u64;
        let name_len = cur.u16_le(offset + 28)? as usize;
        let extra_len = cur.u16_le(offset + 30)? as usize;
        let comment_len = cur.u16_le(offset + 32)? as usize;
        let local_header_offset = cur.u32_le(offset + 42)? as u64;

        let name = cur.bytes(offset + CENTRAL_LEN, name_len)?;
        let path = String::from_utf8_lossy(name).into_owned();

        entries.push(Entry {
            path,
            method,
            compressed_size,
            uncompressed_size,
            crc32,
            local_header_offset,
        });

        offset += CENTRAL_LEN + name_len + extra_len + comment_len;
    }

    Ok(entries)
}

/// Scan backward from the end of the buffer for the EOCD signature. The
/// footer is the last record in the file followed only by an optional
/// comment, so the scan window is the fixed record plus the maximum comment.
fn find_eocd(cur: &Cursor<'_>) -> Result<usize> {
    if cur.len() < EOCD_LEN {
        return Err(Error::Format("buffer smaller than footer"));
    }
    let floor = cur.len().saturating_sub(EOCD_LEN + MAX_COMMENT_LEN);
    let mut offset = cur.len() - EOCD_LEN;
    loop {
        if cur.u32_le(offset)? == EOCD_MAGIC {
            return Ok(offset);
        }
        if offset == floor {
            return Err(Error::Format("end-of-directory footer not found"));
        }
        offset -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{find_eocd, Cursor};

    #[test]
    fn footer_scan_rejects_short_buffers() {
        assert!(find_eocd(&Cursor::new(b"PK")).is_err());
    }

    #[test]
    fn footer_scan_rejects_missing_signature() {
        let buf = vec![0u8; 64];
        assert!(find_eocd(&Cursor::new(&buf)).is_err());
    }
}
