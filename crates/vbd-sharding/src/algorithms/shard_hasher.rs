//! # Shard Hasher
//!
//! Maps a document identifier to its vbucket exactly the way the cluster
//! does: zlib CRC-32 over the raw key bytes, upper 16 bits, masked to 15
//! bits, modulo the shard count.

use crate::domain::{ShardCount, ShardIndex};

/// Compute the shard that owns `identifier`.
///
/// The identifier is treated as opaque bytes; an empty key hashes like any
/// other byte string.
pub fn shard_of(identifier: &[u8], shard_count: ShardCount) -> ShardIndex {
    let checksum = crc32fast::hash(identifier);
    (((checksum >> 16) & 0x7fff) % u32::from(shard_count.get())) as ShardIndex
}

/// Whether a copy found on `found_shard` is outside its owning shard.
pub fn is_misplaced(identifier: &[u8], found_shard: ShardIndex, shard_count: ShardCount) -> bool {
    shard_of(identifier, shard_count) != found_shard
}
