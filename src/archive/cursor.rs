//! Bounds-checked little-endian reads over an immutable byte buffer.
//!
//! Every multi-byte field in the container format goes through one of these
//! accessors; a read past the end of the buffer is a format error, never a
//! panic.

use crate::{Error, Result};

#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u16_le(&self, offset: usize) -> Result<u16> {
        let bytes = self.bytes(offset, 2)?;
        Ok(u16::from_le_bytes(bytes.try_into().expect("slice length")))
    }

    pub fn u32_le(&self, offset: usize) -> Result<u32> {
        let bytes = self.bytes(offset, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("slice length")))
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or(Error::Format("offset overflow"))?;
        if end > self.buf.len() {
            return Err(Error::Format("read past end of buffer"));
        }
        Ok(&self.buf[offset..end])
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn reads_are_bounds_checked() {
        let cur = Cursor::new(&[0x01, 0x02, 0x03]);
        assert_eq!(cur.u16_le(0).expect("u16"), 0x0201);
        assert!(cur.u32_le(0).is_err());
        assert!(cur.bytes(2, 2).is_err());
        assert!(cur.bytes(usize::MAX, 2).is_err());
    }
}
