//! Merkle path (BUMP) parsing and root computation, BRC-74 binary format.

use std::collections::HashMap;

use brc100_primitives::chainhash::Hash;
use brc100_primitives::util::{BsvReader, BsvWriter, VarInt};
use serde::{Deserialize, Serialize};

use crate::error::SpvError;
use crate::merkle_tree_parent::merkle_tree_parent;
use crate::proof::DUPLICATE_MARKER;

/// A single element in a Merkle path level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElement {
    /// Position offset within this tree level.
    pub offset: u64,
    /// Hash value at this position (absent when `duplicate` is set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash>,
    /// When `Some(true)`, indicates this element is a client transaction ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<bool>,
    /// When `Some(true)`, the sibling hash is a duplicate of its pair (odd leaf count).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
}

/// A Merkle path (BUMP) associating transactions with a block via a
/// sequence of hashes at each tree level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerklePath {
    /// Block height at which the transactions were mined.
    pub block_height: u32,
    /// Path levels from leaf (index 0) to root.
    pub path: Vec<Vec<PathElement>>,
}

/// Offset-indexed levels, computing absent interior nodes on demand.
struct IndexedPath(Vec<HashMap<u64, PathElement>>);

impl IndexedPath {
    fn from_merkle_path(mp: &MerklePath) -> Self {
        IndexedPath(
            mp.path
                .iter()
                .map(|level| level.iter().map(|e| (e.offset, e.clone())).collect())
                .collect(),
        )
    }

    fn get_offset_leaf(&self, layer: usize, offset: u64) -> Option<PathElement> {
        if let Some(leaf) = self.0.get(layer)?.get(&offset) {
            return Some(leaf.clone());
        }
        if layer == 0 {
            return None;
        }
        let prev_offset = offset * 2;
        let left = self.get_offset_leaf(layer - 1, prev_offset)?;
        let right = self.get_offset_leaf(layer - 1, prev_offset + 1)?;
        let left_hash = left.hash.as_ref()?;
        let parent_hash = if right.duplicate == Some(true) {
            merkle_tree_parent(left_hash, left_hash)
        } else {
            merkle_tree_parent(left_hash, right.hash.as_ref()?)
        };
        Some(PathElement {
            offset,
            hash: Some(parent_hash),
            txid: None,
            duplicate: None,
        })
    }
}

fn bad_path(context: &str, e: impl std::fmt::Display) -> SpvError {
    SpvError::InvalidMerklePath(format!("{}: {}", context, e))
}

impl MerklePath {
    /// Parse a MerklePath from a hex string.
    pub fn from_hex(hex_data: &str) -> Result<Self, SpvError> {
        Self::from_bytes(&hex::decode(hex_data)?)
    }

    /// Parse a MerklePath from BRC-74 bytes. Trailing bytes are rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SpvError> {
        if data.len() < 37 {
            return Err(SpvError::InvalidMerklePath(
                "BUMP bytes do not contain enough data to be valid".to_string(),
            ));
        }
        let mut reader = BsvReader::new(data);
        let mp = Self::from_reader(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(SpvError::InvalidMerklePath(format!(
                "{} trailing bytes after BUMP",
                reader.remaining()
            )));
        }
        Ok(mp)
    }

    /// Parse a MerklePath from a BsvReader.
    pub fn from_reader(reader: &mut BsvReader) -> Result<Self, SpvError> {
        let block_height = reader
            .read_varint()
            .map_err(|e| bad_path("reading block height", e))?
            .value();
        let block_height = u32::try_from(block_height)
            .map_err(|_| SpvError::InvalidMerklePath("block height out of range".into()))?;
        let tree_height = reader.read_u8().map_err(|e| bad_path("reading tree height", e))?;
        if tree_height == 0 {
            return Err(SpvError::InvalidMerklePath("empty tree".into()));
        }

        let mut path = Vec::with_capacity(tree_height as usize);
        for _ in 0..tree_height {
            let n_leaves = reader
                .read_varint()
                .map_err(|e| bad_path("reading leaf count", e))?
                .value();

            let mut level = Vec::new();
            for _ in 0..n_leaves {
                let offset = reader.read_varint().map_err(|e| bad_path("reading offset", e))?.value();
                let flags = reader.read_u8().map_err(|e| bad_path("reading flags", e))?;

                let mut elem = PathElement {
                    offset,
                    hash: None,
                    txid: None,
                    duplicate: None,
                };
                if flags & 1 != 0 {
                    elem.duplicate = Some(true);
                } else {
                    let hash_bytes = reader.read_bytes(32).map_err(|e| bad_path("reading hash", e))?;
                    elem.hash = Some(Hash::from_bytes(hash_bytes).map_err(|e| bad_path("invalid hash", e))?);
                }
                if flags & 2 != 0 {
                    elem.txid = Some(true);
                }
                level.push(elem);
            }

            level.sort_by_key(|e| e.offset);
            path.push(level);
        }

        Ok(MerklePath { block_height, path })
    }

    /// Serialize to BRC-74 binary format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::new();
        writer.write_varint(VarInt(self.block_height as u64));
        writer.write_u8(self.path.len() as u8);

        for level in &self.path {
            writer.write_varint(VarInt::from(level.len()));
            for leaf in level {
                writer.write_varint(VarInt(leaf.offset));
                let mut flags = 0u8;
                if leaf.duplicate == Some(true) {
                    flags |= 1;
                }
                if leaf.txid == Some(true) {
                    flags |= 2;
                }
                writer.write_u8(flags);
                if flags & 1 == 0 {
                    if let Some(ref hash) = leaf.hash {
                        writer.write_bytes(hash.as_bytes());
                    }
                }
            }
        }

        writer.into_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Compute the Merkle root for `txid`.
    pub fn compute_root(&self, txid: &Hash) -> Result<Hash, SpvError> {
        let (index, siblings) = self.siblings(txid)?;
        let mut working = *txid;
        for (height, sibling) in siblings.iter().enumerate() {
            working = match sibling {
                None => merkle_tree_parent(&working, &working),
                Some(hash) if (index >> height) & 1 == 1 => merkle_tree_parent(hash, &working),
                Some(hash) => merkle_tree_parent(&working, hash),
            };
        }
        Ok(working)
    }

    /// Compute the root from a display-order hex txid.
    pub fn compute_root_hex(&self, txid: &str) -> Result<String, SpvError> {
        let txid = Hash::from_hex(txid).map_err(|e| bad_path("invalid txid hex", e))?;
        Ok(self.compute_root(&txid)?.to_string())
    }

    /// Flatten the path of `txid` into its leaf index and display-order
    /// sibling hashes, with [`DUPLICATE_MARKER`] standing for a duplicated node.
    pub fn sibling_path(&self, txid: &Hash) -> Result<(u64, Vec<String>), SpvError> {
        let (index, siblings) = self.siblings(txid)?;
        let path = siblings
            .into_iter()
            .map(|s| s.map_or_else(|| DUPLICATE_MARKER.to_string(), |h| h.to_string()))
            .collect();
        Ok((index, path))
    }

    // `None` marks a duplicated sibling.
    fn siblings(&self, txid: &Hash) -> Result<(u64, Vec<Option<Hash>>), SpvError> {
        let level0 = self
            .path
            .first()
            .ok_or_else(|| SpvError::InvalidMerklePath("empty path".into()))?;
        let tx_leaf = level0
            .iter()
            .find(|l| l.hash.as_ref() == Some(txid))
            .ok_or_else(|| {
                SpvError::InvalidMerklePath(format!("the BUMP does not contain the txid: {}", txid))
            })?;
        let index = tx_leaf.offset;

        // A block holding a single transaction.
        if self.path.len() == 1 && level0.len() == 1 {
            return Ok((index, Vec::new()));
        }

        let indexed = IndexedPath::from_merkle_path(self);
        let mut siblings = Vec::with_capacity(self.path.len());
        for height in 0..self.path.len() {
            let offset = (index >> height) ^ 1;
            let leaf = indexed.get_offset_leaf(height, offset).ok_or_else(|| {
                SpvError::InvalidMerklePath(format!(
                    "we do not have a hash for this index at height: {}",
                    height
                ))
            })?;
            if leaf.duplicate == Some(true) {
                siblings.push(None);
            } else {
                let hash = leaf.hash.ok_or_else(|| {
                    SpvError::InvalidMerklePath(format!(
                        "missing hash at height {} offset {}",
                        height, offset
                    ))
                })?;
                siblings.push(Some(hash));
            }
        }
        Ok((index, siblings))
    }
}
