//! Binary SHA-256 Merkle tree.
//!
//! Leaves are 32-byte digests in caller-supplied order. An odd node at any
//! level is paired with itself (`h(x, x)`). The same hash function is
//! applied uniformly at every level; the root is rendered as 64-char
//! lowercase hex.

use sha2::{Digest, Sha256};

/// Inclusion proof for one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Index of the proven leaf.
    pub leaf_index: usize,
    /// Sibling digests from leaf level to the root, with each sibling's
    /// side: true when the sibling is on the right.
    pub path: Vec<([u8; 32], bool)>,
}

/// A fully materialized Merkle tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] = leaves, last level = [root].
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree over the given leaves.
    ///
    /// An empty leaf set produces the digest of the empty string as its
    /// root, depth 0.
    pub fn build(leaves: Vec<[u8; 32]>) -> Self {
        if leaves.is_empty() {
            let empty: [u8; 32] = Sha256::digest([]).into();
            return Self {
                levels: vec![vec![empty]],
            };
        }

        let mut levels = vec![leaves];
        while levels.last().map(Vec::len).unwrap_or(0) > 1 {
            let prev = levels.last().expect("levels never empty");
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            for pair in prev.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                next.push(hash_pair(&left, &right));
            }
            levels.push(next);
        }
        Self { levels }
    }

    /// The root digest.
    pub fn root(&self) -> [u8; 32] {
        self.levels.last().expect("levels never empty")[0]
    }

    /// Root as 64-char lowercase hex.
    pub fn root_hex(&self) -> String {
        hex::encode(self.root())
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of hashing levels above the leaves.
    pub fn depth(&self) -> u32 {
        (self.levels.len() - 1) as u32
    }

    /// Inclusion proof for the leaf at `index`.
    pub fn prove(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut path = Vec::with_capacity(self.depth() as usize);
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let (sibling_index, sibling_is_right) = if position % 2 == 0 {
                (position + 1, true)
            } else {
                (position - 1, false)
            };
            // Odd node duplicates itself.
            let sibling = level
                .get(sibling_index)
                .copied()
                .unwrap_or(level[position]);
            path.push((sibling, sibling_is_right));
            position /= 2;
        }
        Some(MerkleProof {
            leaf_index: index,
            path,
        })
    }

    /// Verify an inclusion proof against a root.
    pub fn verify(leaf: &[u8; 32], proof: &MerkleProof, root: &[u8; 32]) -> bool {
        let mut acc = *leaf;
        for (sibling, sibling_is_right) in &proof.path {
            acc = if *sibling_is_right {
                hash_pair(&acc, sibling)
            } else {
                hash_pair(sibling, &acc)
            };
        }
        acc == *root
    }
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
