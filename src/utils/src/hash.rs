use std::hash::Hasher;

/// hash_parts hashes the concatenation of all parts without allocating a joined buffer.
/// Hash is always non-zero.
pub fn hash_parts(parts: &[&[u8]]) -> u64 {
    let mut xx_hash = twox_hash::XxHash64::with_seed(0);
    for part in parts {
        xx_hash.write(part);
    }
    let mut h = xx_hash.finish();

    if h == 0 {
        h = 1;
    }

    h
}
