//! Local node keys for remote Flair entities.
//!
//! Flair resources are keyed by their display name, not by their remote id,
//! so a renamed room becomes a new node and two rooms with the same name
//! share one. Keys are fixed-width decimal strings short enough for host
//! addresses.

use md5::Digest;
use md5::Md5;

/// Number of distinct keys a name can map to
pub const KEY_MODULUS: u128 = 100_000_000;

/// Characters of the parent key that prefix a scoped child key
pub const SCOPE_PREFIX_LEN: usize = 4;

/// Derives local node keys from remote entity names
pub trait IdentityMapper: Send + Sync {
    /// Key for a top-level entity (structure or room)
    fn derive_key(&self, name: &str) -> String;

    /// Key for an entity scoped under a parent (vent or puck under a room)
    fn scoped_key(&self, parent_key: &str, name: &str) -> String {
        let prefix = parent_key.get(..SCOPE_PREFIX_LEN).unwrap_or(parent_key);
        format!("{}{}", prefix, self.derive_key(name))
    }
}

/// MD5 of the name, reduced modulo 10^8 and zero-padded to 8 digits
#[derive(Debug, Clone, Copy, Default)]
pub struct NameHashMapper;

impl IdentityMapper for NameHashMapper {
    fn derive_key(&self, name: &str) -> String {
        let digest: [u8; 16] = Md5::digest(name.as_bytes()).into();
        format!("{:08}", u128::from_be_bytes(digest) % KEY_MODULUS)
    }
}
