//! Content fingerprint for the compression cache.
//!
//! Two 32-bit multiplicative lanes folded into a u64 (the cyrb53
//! construction). This is a fast, order-sensitive, non-cryptographic hash:
//! distinct payloads can in principle share a cache slot, and that risk is
//! accepted in exchange for hashing at memcpy-like speed on every response.
//! Replacing it with a collision-resistant hash is a deliberate decision,
//! not a drop-in swap.

pub fn fingerprint(content: &[u8]) -> u64 {
    let mut h1: u32 = 0xdead_beef;
    let mut h2: u32 = 0x41c6_ce57;

    for &byte in content {
        h1 = (h1 ^ byte as u32).wrapping_mul(2_654_435_761);
        h2 = (h2 ^ byte as u32).wrapping_mul(1_597_334_677);
    }

    h1 = (h1 ^ (h1 >> 16)).wrapping_mul(2_246_822_507) ^ (h2 ^ (h2 >> 13)).wrapping_mul(3_266_489_909);
    h2 = (h2 ^ (h2 >> 16)).wrapping_mul(2_246_822_507) ^ (h1 ^ (h1 >> 13)).wrapping_mul(3_266_489_909);

    ((h2 as u64) << 32) | h1 as u64
}

#[cfg(test)]
mod tests {
    use super::fingerprint;

    #[test]
    fn deterministic() {
        assert_eq!(fingerprint(b"hello"), fingerprint(b"hello"));
    }

    #[test]
    fn order_sensitive() {
        assert_ne!(fingerprint(b"ab"), fingerprint(b"ba"));
        assert_ne!(fingerprint(b"hello"), fingerprint(b"hellp"));
    }

    #[test]
    fn empty_input_hashes() {
        let _ = fingerprint(b"");
    }
}
