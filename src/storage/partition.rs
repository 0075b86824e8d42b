//! Partition Hasher and Shard Container
//!
//! Keys (usernames, token ids) are placed in one of a fixed number of shards by
//! hashing them with MD5 and reducing the leading 32 bits modulo the shard count.
//! The mapping is deterministic, so the same key always lands on the same shard
//! for a given count.
//!
//! ```text
//!   "alice" ──md5──> [a3 1f 9c 02 ...] ──u32 BE──> 0xa31f9c02 ──mod N──> shard
//! ```
//!
//! The same digest is used to mint token ids: `md5(name ‖ password ‖ nanos_be)`,
//! encoded as padded URL-safe base64.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Maps a key to a shard index in `0..shard_count`.
///
/// # Panics
///
/// Panics if `shard_count` is zero. Engines validate their configuration, so
/// this cannot happen through the public API.
#[inline]
pub fn shard_index(key: &str, shard_count: usize) -> usize {
    let digest = Md5::digest(key.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    prefix as usize % shard_count
}

/// Mints a token id for `name`/`password` at `issued_at`.
///
/// Two mintings for the same user at different instants yield different ids.
pub fn mint_token_id(name: &str, password: &str, issued_at: SystemTime) -> String {
    // Negative instants wrap modulo 2^64, as the original ids did.
    let nanos = unix_nanos(issued_at) as u64;

    let mut hasher = Md5::new();
    hasher.update(name.as_bytes());
    hasher.update(password.as_bytes());
    hasher.update(nanos.to_be_bytes());
    URL_SAFE.encode(hasher.finalize())
}

/// Signed nanoseconds between the Unix epoch and `t`.
fn unix_nanos(t: SystemTime) -> i128 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    }
}

/// Microseconds between the Unix epoch and `t`.
pub fn unix_micros(t: SystemTime) -> i64 {
    (unix_nanos(t) / 1_000) as i64
}

/// A fixed array of independently locked maps, keyed by string.
#[derive(Debug)]
pub struct ShardSet<V> {
    shards: Vec<RwLock<HashMap<String, V>>>,
}

impl<V> ShardSet<V> {
    /// Creates `count` empty shards. `count` must be non-zero.
    pub fn new(count: usize) -> Self {
        let shards = (0..count).map(|_| RwLock::new(HashMap::new())).collect();
        Self { shards }
    }

    /// Number of shards.
    #[inline]
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    #[inline]
    pub fn index_of(&self, key: &str) -> usize {
        shard_index(key, self.shards.len())
    }

    /// Shared access to the shard owning `key`.
    pub fn read(&self, key: &str) -> RwLockReadGuard<'_, HashMap<String, V>> {
        self.read_at(self.index_of(key))
    }

    /// Exclusive access to the shard owning `key`.
    pub fn write(&self, key: &str) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        self.write_at(self.index_of(key))
    }

    // A poisoned shard is still consistent: every mutation completes before any
    // call that could panic, so the guard is recovered rather than propagated.

    pub fn read_at(&self, index: usize) -> RwLockReadGuard<'_, HashMap<String, V>> {
        self.shards[index]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_at(&self, index: usize) -> RwLockWriteGuard<'_, HashMap<String, V>> {
        self.shards[index]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shard_index_is_deterministic() {
        for key in ["alice", "bob", "ITnCejjs1pXtVDpI-6eDfw==", ""] {
            let first = shard_index(key, 1024);
            assert!(first < 1024);
            assert_eq!(shard_index(key, 1024), first);
        }
    }

    #[test]
    fn test_shard_index_single_shard() {
        assert_eq!(shard_index("anything", 1), 0);
        assert_eq!(shard_index("else", 1), 0);
    }

    #[test]
    fn test_shard_index_spreads_keys() {
        let mut used = std::collections::HashSet::new();
        for i in 0..256 {
            used.insert(shard_index(&format!("user{}", i), 16));
        }
        // 256 keys over 16 shards should touch nearly all of them
        assert!(used.len() >= 12);
    }

    #[test]
    fn test_mint_token_id_reference_vector() {
        // 2022-08-06T15:04:05Z
        let issued_at = UNIX_EPOCH + Duration::from_secs(1_659_798_245);
        assert_eq!(
            mint_token_id("__test_user__", "__pass_word__", issued_at),
            "fG66W_mTGhMVmSuXc--qYQ=="
        );
    }

    #[test]
    fn test_mint_token_id_wraps_pre_epoch_instants() {
        // 0001-01-01T00:00:00Z, the zero instant the original test vector used
        let zero = UNIX_EPOCH
            .checked_sub(Duration::from_secs(62_135_596_800))
            .unwrap();
        assert_eq!(
            mint_token_id("__test_user__", "__pass_word__", zero),
            "ITnCejjs1pXtVDpI-6eDfw=="
        );
    }

    #[test]
    fn test_mint_token_id_distinct_over_time() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let a = mint_token_id("u1", "xxxx", t);
        let b = mint_token_id("u1", "xxxx", t + Duration::from_nanos(1));
        assert_ne!(a, b);
        assert_eq!(a.len(), 24);
        assert!(!a.contains('+') && !a.contains('/'));
    }

    #[test]
    fn test_unix_micros() {
        let t = UNIX_EPOCH + Duration::from_micros(1_500_000);
        assert_eq!(unix_micros(t), 1_500_000);
        let before = UNIX_EPOCH - Duration::from_micros(3);
        assert_eq!(unix_micros(before), -3);
    }

    #[test]
    fn test_shard_set_routes_by_key() {
        let set: ShardSet<u32> = ShardSet::new(8);
        assert_eq!(set.len(), 8);
        set.write("k").insert("k".to_string(), 7);
        assert_eq!(set.read("k").get("k"), Some(&7));
        assert_eq!(set.read_at(set.index_of("k")).len(), 1);
    }
}
