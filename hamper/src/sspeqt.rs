// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Secret-shared equality material: XOR share generation and the per-block
//! comparison feeding the blinded threshold sum.

use rand::{CryptoRng, Rng};

/// Produce XOR shares of `bit`: the first share is uniform, and the two
/// shares XOR to the bit.
pub(crate) fn share<RNG: CryptoRng + Rng>(bit: bool, rng: &mut RNG) -> (u8, u8) {
    let a = rng.gen::<bool>() as u8;
    (a, a ^ bit as u8)
}

/// For each 8-bit block of the coordinate space, the number of positions in
/// which `u` and `v` differ. Both inputs hold one bit per byte; the total
/// over all blocks is the Hamming distance of the underlying vectors.
pub(crate) fn block_mismatch_counts(u: &[u8], v: &[u8]) -> Vec<u64> {
    u.chunks(8)
        .zip(v.chunks(8))
        .map(|(ub, vb)| {
            ub.iter()
                .zip(vb.iter())
                .filter(|(x, y)| (**x & 1) != (**y & 1))
                .count() as u64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{hamming_distance, rand_binary_vec};
    use scupper::AesRng;

    #[test]
    fn test_share_law() {
        let mut rng = AesRng::new();
        for bit in [false, true] {
            for _ in 0..256 {
                let (a, b) = share(bit, &mut rng);
                assert!(a <= 1 && b <= 1);
                assert_eq!(a ^ b, bit as u8);
            }
        }
    }

    #[test]
    fn test_first_share_is_balanced() {
        let mut rng = AesRng::from_block_seed(scupper::Block::from(9u128));
        let n = 10_000;
        let ones: usize = (0..n).map(|_| share(true, &mut rng).0 as usize).sum();
        let freq = ones as f64 / n as f64;
        assert!((0.45..=0.55).contains(&freq));
    }

    #[test]
    fn test_counts_sum_to_hamming_distance() {
        let mut rng = AesRng::new();
        for d in [8, 13, 64, 128] {
            let u = rand_binary_vec(d, &mut rng);
            let v = rand_binary_vec(d, &mut rng);
            let counts = block_mismatch_counts(&u, &v);
            assert_eq!(counts.len(), d.div_ceil(8));
            assert!(counts.iter().all(|&c| c <= 8));
            assert_eq!(
                counts.iter().sum::<u64>() as usize,
                hamming_distance(&u, &v)
            );
        }
    }
}
