//! Stable partition placement
//!
//! Producers and consumers run in separate processes and must agree on
//! which partition a key lands in, so the hash has to be fixed for all
//! time. FNV-1a over the key bytes; do not swap this for a randomized
//! hasher.

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Map a partition key to one of `partitions` slots
#[must_use]
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    debug_assert!(partitions > 0);
    (fnv1a64(key.as_bytes()) % u64::from(partitions.max(1))) as u32
}
