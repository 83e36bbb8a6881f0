use crate::{hasher::HashWriter, Hash};
use std::io::Write;

/// Bitcoin-style merkle tree over transaction ids.
///
/// Interior nodes are `SHA256(SHA256(left || right))`; an odd node at the
/// end of a level is paired with itself.
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Create a Merkle tree directly from leaf hashes
    pub fn from_leaves(leaves: Vec<Hash>) -> Self {
        let mut tree = Self { levels: vec![leaves] };
        tree.build_tree();
        tree
    }

    fn build_tree(&mut self) {
        let mut current_level = self.levels[0].clone();
        while current_level.len() > 1 {
            let next_level: Vec<Hash> = current_level
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => hash_pair(left, right),
                    [single] => hash_pair(single, single),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            self.levels.push(next_level.clone());
            current_level = next_level;
        }
    }

    /// Get the Merkle root hash. An empty tree has the zero hash as root.
    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first().copied())
            .unwrap_or_default()
    }

    /// Number of leaves the tree was built from
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }
}

/// Convenience wrapper returning only the root.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    MerkleTree::from_leaves(leaves.to_vec()).root()
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut writer = HashWriter::new();
    // Writes into a hasher never fail.
    let _ = writer.write_all(left.as_bytes());
    let _ = writer.write_all(right.as_bytes());
    Hash::from(writer.finalize_double())
}
