/// Number of buckets a user identifier is hashed into.
const BUCKET_COUNT: u32 = 100;

/// Returns whether the user identified by `id` falls inside a rollout of `percentage` percent.
///
/// The bucket is the IEEE CRC-32 of the identifier's UTF-8 bytes modulo 100, so the same
/// identifier lands in the same bucket across processes and across client implementations.
pub fn in_rollout(id: &str, percentage: u32) -> bool {
    if percentage >= BUCKET_COUNT {
        return true;
    }
    if percentage == 0 {
        return false;
    }
    bucket(id) < percentage
}

pub(crate) fn bucket(id: &str) -> u32 {
    crc32fast::hash(id.as_bytes()) % BUCKET_COUNT
}
