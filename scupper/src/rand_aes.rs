// -*- mode: rust; -*-
//
// This file is part of `scupper`.
// See LICENSE for licensing information.

//! AES-based random number generator.

use crate::Block;
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::{CryptoRng, Error, Rng, RngCore, SeedableRng};
use rand_core::block::{BlockRng, BlockRngCore};

/// Implementation of a random number generator based on AES-128 in counter
/// mode: the seed keys the cipher and the counter always starts at zero.
#[derive(Clone, Debug)]
pub struct AesRng(BlockRng<AesRngCore>);

impl RngCore for AesRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }
    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl SeedableRng for AesRng {
    type Seed = <AesRngCore as SeedableRng>::Seed;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        AesRng(BlockRng::<AesRngCore>::from_seed(seed))
    }
}

impl CryptoRng for AesRng {}

// `fhe`/`fhe-traits` (via `hamper`) pin a newer major version of `rand`,
// whose `RngCore`/`CryptoRng` are a distinct set of traits from the ones
// above. Implement them too so `AesRng` is usable as the RNG for both the
// OT/OKVS code (on the 0.8 traits) and the homomorphic-encryption code (on
// the 0.9 traits) without maintaining two RNGs.
impl rand09::RngCore for AesRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        RngCore::next_u32(self)
    }
    #[inline]
    fn next_u64(&mut self) -> u64 {
        RngCore::next_u64(self)
    }
    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        RngCore::fill_bytes(self, dest)
    }
}

impl rand09::CryptoRng for AesRng {}

impl AesRng {
    /// Create a new random number generator using a random seed from
    /// `rand::random`.
    #[inline]
    pub fn new() -> Self {
        let seed = rand::random::<Block>();
        AesRng::from_block_seed(seed)
    }

    /// Create a new random number generator seeded by `seed`.
    #[inline]
    pub fn from_block_seed(seed: Block) -> Self {
        AesRng::from_seed(seed.into())
    }

    /// Create a new RNG using a random seed from this one.
    #[inline]
    pub fn fork(&mut self) -> Self {
        let seed = self.gen::<Block>();
        AesRng::from_block_seed(seed)
    }
}

impl Default for AesRng {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// The core of `AesRng`, used with `BlockRng`.
#[derive(Clone)]
pub struct AesRngCore {
    aes: Aes128,
    counter: u64,
}

impl BlockRngCore for AesRngCore {
    type Item = u32;
    // Four AES blocks per refill.
    type Results = [u32; 16];

    #[inline]
    fn generate(&mut self, results: &mut Self::Results) {
        let mut blocks = [GenericArray::default(); 4];
        for blk in blocks.iter_mut() {
            blk[..8].copy_from_slice(&self.counter.to_le_bytes());
            self.counter = self.counter.wrapping_add(1);
        }
        self.aes.encrypt_blocks(&mut blocks);
        for (i, blk) in blocks.iter().enumerate() {
            for j in 0..4 {
                let mut word = [0u8; 4];
                word.copy_from_slice(&blk[4 * j..4 * (j + 1)]);
                results[4 * i + j] = u32::from_le_bytes(word);
            }
        }
    }
}

impl SeedableRng for AesRngCore {
    type Seed = [u8; 16];

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        let aes = Aes128::new(GenericArray::from_slice(&seed));
        AesRngCore { aes, counter: 0 }
    }
}

impl CryptoRng for AesRngCore {}

impl std::fmt::Debug for AesRngCore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "AesRngCore {{ counter: {} }}", self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let seed = Block::from(0x42u128);
        let mut a = AesRng::from_block_seed(seed);
        let mut b = AesRng::from_block_seed(seed);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = AesRng::from_block_seed(Block::from(1u128));
        let mut b = AesRng::from_block_seed(Block::from(2u128));
        let xs = (0..8).map(|_| a.next_u64()).collect::<Vec<u64>>();
        let ys = (0..8).map(|_| b.next_u64()).collect::<Vec<u64>>();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_fork_diverges() {
        let mut a = AesRng::from_block_seed(Block::from(7u128));
        let mut b = a.fork();
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn test_fill_bytes_matches_words() {
        let seed = Block::from(0xabcdu128);
        let mut a = AesRng::from_block_seed(seed);
        let mut b = AesRng::from_block_seed(seed);
        let mut buf = [0u8; 32];
        a.fill_bytes(&mut buf);
        let mut buf2 = [0u8; 32];
        b.fill_bytes(&mut buf2);
        assert_eq!(buf, buf2);
    }
}
