//! Merkle tree parent computation.

use brc100_primitives::chainhash::Hash;
use brc100_primitives::hash::sha256d;

/// Compute the Merkle tree parent of two display-order hex hashes.
///
/// Returns the parent in display order.
pub fn merkle_tree_parent_str(left: &str, right: &str) -> Result<String, brc100_primitives::PrimitivesError> {
    let l = Hash::from_hex(left)?;
    let r = Hash::from_hex(right)?;
    Ok(merkle_tree_parent(&l, &r).to_string())
}

/// Compute the Merkle tree parent of two `Hash` values.
///
/// The hashes are in internal (little-endian) byte order. They are
/// concatenated directly (no reversal), double-SHA256'd.
pub fn merkle_tree_parent(left: &Hash, right: &Hash) -> Hash {
    let mut concatenated = [0u8; 64];
    concatenated[..32].copy_from_slice(left.as_bytes());
    concatenated[32..].copy_from_slice(right.as_bytes());
    Hash::new(sha256d(&concatenated))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEFT: &str = "d6c79a6ef05572f0cb8e9a450c561fc40b0a8a7d48faad95e20d93ddeb08c231";
    const RIGHT: &str = "b1ed931b79056438b990d8981ba46fae97e5574b142445a74a44b978af284f98";
    const PARENT: &str = "b0d537b3ee52e472507f453df3d69561720346118a5a8c4d85ca0de73bc792be";

    #[test]
    fn test_merkle_tree_parent_str() {
        assert_eq!(merkle_tree_parent_str(LEFT, RIGHT).unwrap(), PARENT);
    }

    #[test]
    fn test_order_matters() {
        assert_ne!(merkle_tree_parent_str(RIGHT, LEFT).unwrap(), PARENT);
    }

    #[test]
    fn test_rejects_short_hex() {
        assert!(merkle_tree_parent_str("abcd", RIGHT).is_err());
    }
}
