//! Fast hashing utilities using xxHash3.
//!
//! The renderer keys its parsed-template cache on these hashes so a view
//! is only re-parsed when its source text changes.

use xxhash_rust::xxh3::xxh3_64;

/// Compute a 64-bit hash of the given string using xxHash3.
#[inline]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        let source = "@if($user) Hello @endif";
        assert_eq!(hash_str(source), hash_str(source));
    }

    #[test]
    fn test_hash_difference() {
        assert_ne!(hash_str("@if($a)"), hash_str("@if($b)"));
    }
}
