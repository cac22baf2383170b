// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Subset-parity locality-sensitive hashing for Hamming distance.
//!
//! Each of the L hash functions is the parity of the vector over a random
//! size-k subset of dimensions, k = ⌈d/(δ+1)⌉. Two vectors within distance δ
//! collide on at least one fingerprint with probability
//! ≥ 1 − (1 − (1 − δ/d)^k)^L.
//!
//! Subsets are drawn from a pool of high-entropy dimensions (estimated
//! bit-entropy above τ). Both parties must construct the fingerprinter from
//! the same seed; subset agreement is by that explicit shared seed, never by
//! accident.

use crate::params::ProtocolParams;
use rand::seq::SliceRandom;
use rand::Rng;
use scupper::{AesRng, Block};

/// The subset-parity fingerprinter.
pub struct SubsetParityLsh {
    dim: usize,
    subsets: Vec<Vec<usize>>,
}

impl SubsetParityLsh {
    /// Derive the L subsets from `seed`. Equal parameters and equal seeds
    /// yield identical fingerprinters on both parties.
    pub fn new(params: &ProtocolParams, seed: Block) -> Self {
        let k = params.subset_size();
        let mut rng = AesRng::from_block_seed(seed);
        let pool = high_entropy_pool(params, k, &mut rng);
        let subsets = (0..params.lsh_count)
            .map(|_| {
                let mut candidates = pool.clone();
                candidates.shuffle(&mut rng);
                candidates.truncate(k);
                candidates
            })
            .collect();
        SubsetParityLsh {
            dim: params.dim,
            subsets,
        }
    }

    /// The vector dimension this fingerprinter expects.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Compute the L canonical fingerprint strings `"ℓ||p"` of `v`, in
    /// ascending ℓ order. The sequence always has exactly L entries, so the
    /// per-query round count is data-independent.
    pub fn fingerprints(&self, v: &[u8]) -> Vec<String> {
        self.subsets
            .iter()
            .enumerate()
            .map(|(ell, subset)| {
                let parity = subset.iter().fold(0u8, |acc, &j| acc ^ (v[j] & 1));
                format!("{}||{}", ell, parity)
            })
            .collect()
    }

    #[cfg(test)]
    fn subsets(&self) -> &[Vec<usize>] {
        &self.subsets
    }
}

/// Rank dimensions by a simulated bit-entropy (bias in [0.4, 0.6], so the
/// entropy is H(p)) and keep those above τ, padding with the remaining
/// dimensions until the pool covers min(k·L, d) entries. The simulation is
/// driven by the shared seed, keeping the ranking identical across parties.
fn high_entropy_pool(params: &ProtocolParams, k: usize, rng: &mut AesRng) -> Vec<usize> {
    let want = (k * params.lsh_count).min(params.dim);
    let mut ranked = (0..params.dim)
        .map(|i| {
            let p: f64 = rng.gen_range(0.4..0.6);
            let entropy = -p * p.log2() - (1.0 - p) * (1.0 - p).log2();
            (entropy, i)
        })
        .collect::<Vec<(f64, usize)>>();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut pool = Vec::with_capacity(params.dim);
    for &(entropy, i) in &ranked {
        if entropy > params.entropy_threshold || pool.len() < want {
            pool.push(i);
        }
    }
    if pool.len() < want {
        for i in 0..params.dim {
            if pool.len() >= want {
                break;
            }
            if !pool.contains(&i) {
                pool.push(i);
            }
        }
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{neighbor_at_distance, rand_binary_vec};

    fn params(dim: usize, delta: usize, lsh_count: usize) -> ProtocolParams {
        ProtocolParams::new(dim, delta, lsh_count).unwrap()
    }

    #[test]
    fn test_same_seed_same_subsets() {
        let p = params(128, 10, 32);
        let seed = Block::from_words(1, 2);
        let a = SubsetParityLsh::new(&p, seed);
        let b = SubsetParityLsh::new(&p, seed);
        assert_eq!(a.subsets(), b.subsets());
    }

    #[test]
    fn test_different_seeds_differ() {
        let p = params(128, 10, 32);
        let a = SubsetParityLsh::new(&p, Block::from(1u128));
        let b = SubsetParityLsh::new(&p, Block::from(2u128));
        assert_ne!(a.subsets(), b.subsets());
    }

    #[test]
    fn test_subset_shape() {
        let p = params(128, 10, 32);
        let lsh = SubsetParityLsh::new(&p, Block::from(3u128));
        assert_eq!(lsh.subsets().len(), 32);
        for s in lsh.subsets() {
            assert_eq!(s.len(), p.subset_size());
            assert!(s.iter().all(|&j| j < 128));
        }
    }

    #[test]
    fn test_fingerprint_format() {
        let p = params(8, 1, 4);
        let lsh = SubsetParityLsh::new(&p, Block::from(4u128));
        let fps = lsh.fingerprints(&[0; 8]);
        assert_eq!(fps, vec!["0||0", "1||0", "2||0", "3||0"]);
    }

    #[test]
    fn test_equal_vectors_collide_everywhere() {
        let p = params(64, 4, 16);
        let lsh = SubsetParityLsh::new(&p, Block::from(5u128));
        let mut rng = AesRng::from_block_seed(Block::from(6u128));
        let v = rand_binary_vec(64, &mut rng);
        assert_eq!(lsh.fingerprints(&v), lsh.fingerprints(&v));
    }

    #[test]
    fn test_planted_match_recall() {
        // With d=128, δ=10, L=32 the no-collision probability per planted
        // pair is ~3e-7; over 1000 plants the recall target of 0.99 has
        // enormous slack.
        let p = params(128, 10, 32);
        let lsh = SubsetParityLsh::new(&p, Block::from(7u128));
        let mut rng = AesRng::from_block_seed(Block::from(8u128));
        let trials = 1000;
        let mut collisions = 0;
        for _ in 0..trials {
            let v = rand_binary_vec(128, &mut rng);
            let w = neighbor_at_distance(&v, 10, &mut rng);
            let fv = lsh.fingerprints(&v);
            let fw = lsh.fingerprints(&w);
            if fv.iter().zip(fw.iter()).any(|(a, b)| a == b) {
                collisions += 1;
            }
        }
        assert!(collisions >= 990, "recall too low: {}/{}", collisions, trials);
    }
}
