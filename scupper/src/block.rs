// -*- mode: rust; -*-
//
// This file is part of `scupper`.
// See LICENSE for licensing information.

//! Defines a block as a 128-bit value, and implements block-related functions.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes256;
use curve25519_dalek::ristretto::RistrettoPoint;
use rand::distributions::{Distribution, Standard};
use rand::Rng;

/// A 128-bit value, stored as little-endian bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block([u8; 16]);

impl Block {
    /// Build a block from its low and high 64-bit words.
    #[inline]
    pub fn from_words(hi: u64, lo: u64) -> Self {
        Block::from(((hi as u128) << 64) | lo as u128)
    }

    /// The low 64-bit word.
    #[inline]
    pub fn lo_u64(&self) -> u64 {
        u128::from(*self) as u64
    }

    /// The high 64-bit word.
    #[inline]
    pub fn hi_u64(&self) -> u64 {
        (u128::from(*self) >> 64) as u64
    }

    /// Return the least significant bit.
    #[inline]
    pub fn lsb(&self) -> bool {
        self.0[0] & 1 == 1
    }

    /// Hash a Ristretto point into a `Block`, tweaked by `tweak`.
    ///
    /// The compressed point keys an AES-256 instance which encrypts the
    /// tweak; distinct tweaks therefore yield independent-looking blocks
    /// from the same point.
    pub fn hash_pt(tweak: u128, pt: &RistrettoPoint) -> Self {
        let k = pt.compress();
        let cipher = Aes256::new(GenericArray::from_slice(k.as_bytes()));
        let mut blk = GenericArray::clone_from_slice(&tweak.to_le_bytes());
        cipher.encrypt_block(&mut blk);
        let mut out = [0u8; 16];
        out.copy_from_slice(&blk);
        Block(out)
    }
}

impl std::ops::BitXor for Block {
    type Output = Block;
    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Block::from(u128::from(self) ^ u128::from(rhs))
    }
}

impl std::ops::BitXorAssign for Block {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        *self = *self ^ rhs;
    }
}

impl AsRef<[u8]> for Block {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Block {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl From<u128> for Block {
    #[inline]
    fn from(x: u128) -> Self {
        Block(x.to_le_bytes())
    }
}

impl From<Block> for u128 {
    #[inline]
    fn from(b: Block) -> Self {
        u128::from_le_bytes(b.0)
    }
}

impl From<[u8; 16]> for Block {
    #[inline]
    fn from(bytes: [u8; 16]) -> Self {
        Block(bytes)
    }
}

impl From<Block> for [u8; 16] {
    #[inline]
    fn from(b: Block) -> Self {
        b.0
    }
}

impl Distribution<Block> for Standard {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        Block::from(rng.gen::<u128>())
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:032x}", u128::from(*self))
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:032x}", u128::from(*self))
    }
}
