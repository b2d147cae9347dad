//! Node addresses derived from a local secret

use std::fmt;

use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Size of the node secret in bytes
pub const SECRET_LEN: usize = 32;

/// Version byte prepended to the RIPEMD-160 digest before encoding
const ADDRESS_VERSION: u8 = 0x00;

/// Number of double-SHA-256 bytes appended as a checksum
const CHECKSUM_LEN: usize = 4;

/// Base-58 display address of a node.
///
/// Addresses identify peers in the registry and tag queries and responses
/// on the wire. They are labels, not proofs: a peer's claimed address is
/// accepted as-is during the handshake, so arbitrary strings are
/// representable.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Get as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the display address for a node secret.
///
/// Pipeline: SHA-256 over the secret, RIPEMD-160 over that digest, prepend
/// the version byte `0x00`, append the first four bytes of a double
/// SHA-256 checksum, base-58 encode. Deterministic for a given secret.
pub fn derive_address(secret: &[u8; SECRET_LEN]) -> Address {
    let sha = Sha256::digest(secret);
    let ripe = Ripemd160::digest(sha);

    let mut payload = Vec::with_capacity(1 + ripe.len() + CHECKSUM_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(&ripe);

    let checksum = Sha256::digest(Sha256::digest(&payload));
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);

    Address(bs58::encode(payload).into_string())
}

/// A node's identity: the display address derived from a 32-byte secret.
///
/// The secret is consumed at construction and never retained, transmitted,
/// or logged. Only the derived address leaves the process.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    address: Address,
}

impl NodeIdentity {
    /// Generate an identity from a fresh random secret
    pub fn random() -> Self {
        let mut secret = [0u8; SECRET_LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut secret);
        Self::from_secret(&secret)
    }

    /// Derive an identity from a fixed secret
    pub fn from_secret(secret: &[u8; SECRET_LEN]) -> Self {
        NodeIdentity {
            address: derive_address(secret),
        }
    }

    /// The derived display address
    pub fn address(&self) -> &Address {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Decode a display address and check the version byte and checksum.
    fn well_formed(addr: &Address) -> bool {
        let bytes = match bs58::decode(addr.as_str()).into_vec() {
            Ok(b) => b,
            Err(_) => return false,
        };
        if bytes.len() != 1 + 20 + CHECKSUM_LEN || bytes[0] != ADDRESS_VERSION {
            return false;
        }
        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let expected = Sha256::digest(Sha256::digest(body));
        checksum == &expected[..CHECKSUM_LEN]
    }

    // ==================== Derivation ====================

    #[test]
    fn test_derivation_is_deterministic() {
        let secret = [7u8; SECRET_LEN];
        assert_eq!(derive_address(&secret), derive_address(&secret));
    }

    #[test]
    fn test_distinct_secrets_distinct_addresses() {
        let a = derive_address(&[1u8; SECRET_LEN]);
        let b = derive_address(&[2u8; SECRET_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_address_layout_and_checksum() {
        let addr = derive_address(&[42u8; SECRET_LEN]);
        assert!(well_formed(&addr));
    }

    #[test]
    fn test_version_byte_encodes_as_leading_one() {
        // A 0x00 version byte always base-58 encodes to a leading '1'.
        let addr = derive_address(&[9u8; SECRET_LEN]);
        assert!(addr.as_str().starts_with('1'));
    }

    // ==================== Address type ====================

    #[test]
    fn test_address_display_and_debug() {
        let addr = Address::from("1abc");
        assert_eq!(format!("{}", addr), "1abc");
        assert_eq!(format!("{:?}", addr), "Address(1abc)");
    }

    #[test]
    fn test_address_serializes_as_bare_string() {
        let addr = Address::from("1abc");
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"1abc\"");
        let back: Address = serde_json::from_str("\"1abc\"").unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_address_hash_keys_a_map() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Address::from("a"), 1);
        map.insert(Address::from("a"), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&Address::from("a")], 2);
    }

    // ==================== Identity ====================

    #[test]
    fn test_identity_matches_direct_derivation() {
        let secret = [3u8; SECRET_LEN];
        let identity = NodeIdentity::from_secret(&secret);
        assert_eq!(identity.address(), &derive_address(&secret));
    }

    #[test]
    fn test_random_identities_are_distinct() {
        let a = NodeIdentity::random();
        let b = NodeIdentity::random();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_identity_debug_shows_only_address() {
        let identity = NodeIdentity::from_secret(&[5u8; SECRET_LEN]);
        let debug = format!("{:?}", identity);
        assert!(debug.contains(identity.address().as_str()));
    }

    proptest! {
        #[test]
        fn prop_every_secret_derives_a_well_formed_address(secret in any::<[u8; SECRET_LEN]>()) {
            let addr = derive_address(&secret);
            prop_assert!(well_formed(&addr));
            prop_assert_eq!(&derive_address(&secret), &addr);
        }
    }
}
