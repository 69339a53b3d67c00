//! Identity proofs and the sibling-path Merkle proof they carry.

use std::collections::BTreeMap;

use brc100_primitives::chainhash::Hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SpvError;
use crate::merkle_path::MerklePath;
use crate::merkle_tree_parent::merkle_tree_parent;

/// Path entry standing for "hash the working node with itself".
pub const DUPLICATE_MARKER: &str = "*";

/// A Merkle inclusion proof as an ordered list of sibling hashes.
///
/// Hashes are display-order hex. Bit `h` of `index` tells whether the
/// working node is the right child at height `h`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub index: u64,
    pub path: Vec<String>,
    pub root: String,
}

impl MerkleProof {
    /// Build a proof for `txid` from a BRC-74 path and a committed root.
    pub fn from_bump(bump: &MerklePath, txid: &Hash, root: &str) -> Result<Self, SpvError> {
        let (index, path) = bump.sibling_path(txid)?;
        Ok(Self {
            index,
            path,
            root: root.to_string(),
        })
    }

    /// Walk the path from `txid` to the root it implies.
    pub fn compute_root(&self, txid: &Hash) -> Result<Hash, SpvError> {
        if self.path.len() < 64 && self.index >> self.path.len() != 0 {
            return Err(SpvError::InvalidMerklePath(format!(
                "index {} does not fit a path of {} levels",
                self.index,
                self.path.len()
            )));
        }
        let mut working = *txid;
        for (height, sibling) in self.path.iter().enumerate() {
            if sibling == DUPLICATE_MARKER {
                working = merkle_tree_parent(&working, &working);
                continue;
            }
            let sibling = Hash::from_hex(sibling)
                .map_err(|e| SpvError::InvalidMerklePath(format!("level {}: {}", height, e)))?;
            working = if (self.index >> height) & 1 == 1 {
                merkle_tree_parent(&sibling, &working)
            } else {
                merkle_tree_parent(&working, &sibling)
            };
        }
        Ok(working)
    }

    /// Whether the path from `txid` reaches the committed root.
    pub fn verify(&self, txid: &Hash) -> Result<bool, SpvError> {
        let root = Hash::from_hex(&self.root)
            .map_err(|e| SpvError::InvalidMerklePath(format!("root: {}", e)))?;
        Ok(self.compute_root(txid)? == root)
    }
}

/// A claim that identity data is anchored in a mined transaction.
///
/// Created unverified. Only [`crate::SpvVerifier`] sets `verified`, and
/// only after every check passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProof {
    pub transaction_id: String,
    pub block_height: u64,
    pub merkle_proof: MerkleProof,
    pub identity_data: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_deserializing)]
    verified: bool,
}

impl IdentityProof {
    pub fn new(
        transaction_id: impl Into<String>,
        block_height: u64,
        merkle_proof: MerkleProof,
        identity_data: BTreeMap<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            block_height,
            merkle_proof,
            identity_data,
            timestamp,
            verified: false,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub(crate) fn mark_verified(&mut self) {
        self.verified = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Hash {
        Hash::new([n; 32])
    }

    #[test]
    fn test_four_leaf_tree() {
        let (a, b, c, d) = (leaf(1), leaf(2), leaf(3), leaf(4));
        let ab = merkle_tree_parent(&a, &b);
        let cd = merkle_tree_parent(&c, &d);
        let root = merkle_tree_parent(&ab, &cd);

        let proof = MerkleProof {
            index: 2,
            path: vec![d.to_string(), ab.to_string()],
            root: root.to_string(),
        };
        assert!(proof.verify(&c).unwrap());
        assert!(!proof.verify(&d).unwrap());
    }

    #[test]
    fn test_duplicate_marker() {
        let (a, b, c) = (leaf(1), leaf(2), leaf(3));
        let ab = merkle_tree_parent(&a, &b);
        let cc = merkle_tree_parent(&c, &c);
        let root = merkle_tree_parent(&ab, &cc);

        let proof = MerkleProof {
            index: 2,
            path: vec![DUPLICATE_MARKER.to_string(), ab.to_string()],
            root: root.to_string(),
        };
        assert!(proof.verify(&c).unwrap());
    }

    #[test]
    fn test_single_transaction_block() {
        let a = leaf(7);
        let proof = MerkleProof {
            index: 0,
            path: Vec::new(),
            root: a.to_string(),
        };
        assert!(proof.verify(&a).unwrap());
    }

    #[test]
    fn test_index_outside_path_rejected() {
        let proof = MerkleProof {
            index: 4,
            path: vec![leaf(1).to_string()],
            root: leaf(2).to_string(),
        };
        assert!(matches!(proof.verify(&leaf(3)), Err(SpvError::InvalidMerklePath(_))));
    }

    #[test]
    fn test_verified_flag_is_not_deserialized() {
        let mut proof = IdentityProof::new(
            "ab",
            1,
            MerkleProof {
                index: 0,
                path: Vec::new(),
                root: leaf(1).to_string(),
            },
            BTreeMap::new(),
            Utc::now(),
        );
        proof.mark_verified();
        let json = serde_json::to_string(&proof).unwrap();
        assert!(json.contains("\"verified\":true"));
        let back: IdentityProof = serde_json::from_str(&json).unwrap();
        assert!(!back.is_verified());
    }
}
