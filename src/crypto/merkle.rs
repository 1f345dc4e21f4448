//! Merkle tree implementation
//!
//! Reduces an ordered list of leaf hashes to a single root.

use super::{hash_pair, Hash};

/// Compute the merkle root of a list of hashes
///
/// If the list is empty, returns the zero hash.
/// A single leaf is its own root.
/// If a level has an odd number of elements, the last one is duplicated.
pub fn compute_merkle_root(hashes: &[Hash]) -> Hash {
    match hashes {
        [] => return Hash::zero(),
        [only] => return *only,
        _ => {}
    }

    let mut current_level: Vec<Hash> = hashes.to_vec();

    while current_level.len() > 1 {
        if let Some(&last) = current_level.last() {
            if current_level.len() % 2 == 1 {
                current_level.push(last);
            }
        }

        current_level = current_level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    current_level[0]
}
