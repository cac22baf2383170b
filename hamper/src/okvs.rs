// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Band oblivious key-value store over 128-bit blocks.
//!
//! Every key hashes, under the store seed, to a short random band of the
//! output vector; encoding solves the resulting GF(2) band system, filling
//! the free positions with random blocks. Decoding an inserted key returns
//! its value; decoding any other key returns a pseudorandom block.

use crate::Error;
use rand::{CryptoRng, Rng};
use scupper::{AesRng, Block};

/// Expansion factor ε: the encoded vector has ⌈(1 + ε)·n⌉ blocks.
const EPSILON: f64 = 0.05;

/// How many fresh seeds to try before giving up on a singular system. The
/// per-attempt failure probability is far below 1/2 at every supported size,
/// so exhausting this bound means the input itself is degenerate
/// (e.g. duplicate keys).
const MAX_ENCODE_ATTEMPTS: usize = 40;

/// A band OKVS: the decoding parameters of one encoded table. The encoded
/// blocks themselves travel separately so the receiver can ship them
/// directly from the encode call.
#[derive(Clone, Copy, Debug)]
pub struct BandOkvs {
    nitems: usize,
    size: usize,
    band_len: usize,
    seed: Block,
}

impl BandOkvs {
    /// Rebuild the decoder from transmitted parameters.
    pub fn new(nitems: usize, size: usize, band_len: usize, seed: Block) -> Self {
        BandOkvs {
            nitems,
            size,
            band_len,
            seed,
        }
    }

    /// Band length for `nitems` inserted pairs. Numbers follow the band-OKVS
    /// parameterization at statistical security 40; inputs above 2^24 have
    /// no tabulated band.
    pub fn band_length_for(nitems: usize) -> Result<usize, Error> {
        let band = if nitems <= 1 << 14 {
            339
        } else if nitems <= 1 << 16 {
            350
        } else if nitems <= 1 << 18 {
            366
        } else if nitems <= 1 << 20 {
            377
        } else if nitems <= 1 << 22 {
            396
        } else if nitems <= 1 << 24 {
            413
        } else {
            return Err(Error::Config {
                field: "n_items",
                details: format!("no band length tabulated for {} items", nitems),
            });
        };
        Ok(band)
    }

    /// Encode `keys[i] → values[i]`, drawing a fresh store seed from `rng`
    /// (retrying on a singular system; the chosen seed is part of the
    /// returned store and must be transmitted alongside the blocks).
    pub fn encode<RNG: CryptoRng + Rng>(
        keys: &[Block],
        values: &[Block],
        rng: &mut RNG,
    ) -> Result<(Self, Vec<Block>), Error> {
        if keys.is_empty() || keys.len() != values.len() {
            return Err(Error::Config {
                field: "okvs_input",
                details: format!(
                    "need equal, nonzero key/value counts, got {}/{}",
                    keys.len(),
                    values.len()
                ),
            });
        }
        let nitems = keys.len();
        let size = ((1.0 + EPSILON) * nitems as f64).ceil() as usize;
        let band_len = Self::band_length_for(nitems)?.min(size);

        for _ in 0..MAX_ENCODE_ATTEMPTS {
            let store = BandOkvs {
                nitems,
                size,
                band_len,
                seed: rng.gen::<Block>(),
            };
            if let Some(blocks) = store.try_encode(keys, values, rng) {
                return Ok((store, blocks));
            }
        }
        Err(Error::CryptoSetup(format!(
            "band OKVS encoding failed after {} attempts",
            MAX_ENCODE_ATTEMPTS
        )))
    }

    /// Decode `key` against the encoded `blocks`.
    pub fn decode(&self, key: Block, blocks: &[Block]) -> Block {
        let (start, bits) = self.band_of(key);
        let mut acc = Block::default();
        for rel in bit_positions(&bits) {
            acc ^= blocks[start + rel];
        }
        acc
    }

    /// Number of inserted pairs.
    pub fn nitems(&self) -> usize {
        self.nitems
    }

    /// Number of encoded blocks.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Band length in bits.
    pub fn band_len(&self) -> usize {
        self.band_len
    }

    /// The store seed.
    pub fn seed(&self) -> Block {
        self.seed
    }

    /// Derive the band of `key`: a start position and `band_len` coefficient
    /// bits with the leading coefficient forced on.
    fn band_of(&self, key: Block) -> (usize, Vec<u64>) {
        let mut rng = AesRng::from_block_seed(self.seed ^ key);
        let start = rng.gen_range(0..=(self.size - self.band_len));
        let words = self.band_len.div_ceil(64);
        let mut bits = vec![0u64; words];
        for w in bits.iter_mut() {
            *w = rng.gen();
        }
        let tail = self.band_len % 64;
        if tail != 0 {
            bits[words - 1] &= (1u64 << tail) - 1;
        }
        bits[0] |= 1;
        (start, bits)
    }

    /// One elimination + back-substitution pass; `None` if the band system
    /// is singular under the current seed.
    fn try_encode<RNG: CryptoRng + Rng>(
        &self,
        keys: &[Block],
        values: &[Block],
        rng: &mut RNG,
    ) -> Option<Vec<Block>> {
        let mut rows = keys
            .iter()
            .zip(values.iter())
            .map(|(k, v)| {
                let (start, bits) = self.band_of(*k);
                Row {
                    start,
                    bits,
                    value: *v,
                }
            })
            .collect::<Vec<Row>>();
        rows.sort_by_key(|r| r.start);

        let mut pivot_of = vec![usize::MAX; self.size];
        let mut solved: Vec<Row> = Vec::with_capacity(rows.len());
        let mut pivots: Vec<usize> = Vec::with_capacity(rows.len());

        for mut row in rows {
            loop {
                let rel = match leading_bit(&row.bits) {
                    Some(rel) => rel,
                    None => {
                        if row.value == Block::default() {
                            // A duplicate pair reduced to 0 = 0.
                            break;
                        }
                        return None;
                    }
                };
                let col = row.start + rel;
                let p = pivot_of[col];
                if p == usize::MAX {
                    pivot_of[col] = solved.len();
                    pivots.push(col);
                    solved.push(row);
                    break;
                }
                xor_row(&mut row, &solved[p]);
            }
        }

        // Free positions stay random so non-inserted keys decode to
        // pseudorandom blocks.
        let mut blocks = (0..self.size)
            .map(|_| rng.gen::<Block>())
            .collect::<Vec<Block>>();

        let mut order = (0..solved.len()).collect::<Vec<usize>>();
        order.sort_by_key(|&i| std::cmp::Reverse(pivots[i]));
        for i in order {
            let row = &solved[i];
            let mut acc = row.value;
            for rel in bit_positions(&row.bits) {
                let col = row.start + rel;
                if col != pivots[i] {
                    acc ^= blocks[col];
                }
            }
            blocks[pivots[i]] = acc;
        }
        Some(blocks)
    }
}

struct Row {
    start: usize,
    bits: Vec<u64>,
    value: Block,
}

/// Index of the first set bit, if any.
fn leading_bit(bits: &[u64]) -> Option<usize> {
    for (i, &w) in bits.iter().enumerate() {
        if w != 0 {
            return Some(64 * i + w.trailing_zeros() as usize);
        }
    }
    None
}

/// Positions of all set bits, ascending.
fn bit_positions(bits: &[u64]) -> Vec<usize> {
    let mut out = Vec::new();
    for (i, &word) in bits.iter().enumerate() {
        let mut w = word;
        while w != 0 {
            out.push(64 * i + w.trailing_zeros() as usize);
            w &= w - 1;
        }
    }
    out
}

/// XOR `pivot` into `row`, aligning their band windows. The pivot's leading
/// bit sits at or above `row.start`, so no set bit is shifted out.
fn xor_row(row: &mut Row, pivot: &Row) {
    let shift = row.start - pivot.start;
    let word_shift = shift / 64;
    let bit_shift = shift % 64;
    for i in 0..row.bits.len() {
        let j = i + word_shift;
        let mut w = 0u64;
        if j < pivot.bits.len() {
            w |= pivot.bits[j] >> bit_shift;
        }
        if bit_shift > 0 && j + 1 < pivot.bits.len() {
            w |= pivot.bits[j + 1] << (64 - bit_shift);
        }
        row.bits[i] ^= w;
    }
    row.value ^= pivot.value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use scupper::AesRng;

    fn rand_blocks(n: usize, rng: &mut AesRng) -> Vec<Block> {
        (0..n).map(|_| rng.gen::<Block>()).collect()
    }

    #[test]
    fn test_round_trip() {
        let mut rng = AesRng::from_block_seed(Block::from(1u128));
        let keys = rand_blocks(1000, &mut rng);
        let values = rand_blocks(1000, &mut rng);
        let (okvs, blocks) = BandOkvs::encode(&keys, &values, &mut rng).unwrap();
        assert_eq!(blocks.len(), okvs.size());
        for (k, v) in keys.iter().zip(values.iter()) {
            assert_eq!(okvs.decode(*k, &blocks), *v);
        }
    }

    #[test]
    fn test_decoder_rebuilt_from_params() {
        let mut rng = AesRng::from_block_seed(Block::from(2u128));
        let keys = rand_blocks(500, &mut rng);
        let values = rand_blocks(500, &mut rng);
        let (okvs, blocks) = BandOkvs::encode(&keys, &values, &mut rng).unwrap();
        let decoder = BandOkvs::new(okvs.nitems(), okvs.size(), okvs.band_len(), okvs.seed());
        for (k, v) in keys.iter().zip(values.iter()) {
            assert_eq!(decoder.decode(*k, &blocks), *v);
        }
    }

    #[test]
    fn test_tiny_input() {
        // Query-scale inputs shrink the band to the whole table; the seed
        // retry keeps encoding reliable there.
        let mut rng = AesRng::from_block_seed(Block::from(3u128));
        let keys = rand_blocks(4, &mut rng);
        let values = rand_blocks(4, &mut rng);
        let (okvs, blocks) = BandOkvs::encode(&keys, &values, &mut rng).unwrap();
        for (k, v) in keys.iter().zip(values.iter()) {
            assert_eq!(okvs.decode(*k, &blocks), *v);
        }
    }

    #[test]
    fn test_absent_keys_decode_out_of_range() {
        // Values carry small indices in their low word; a pseudorandom
        // decode lands in [0, n) with probability n/2^64.
        let mut rng = AesRng::from_block_seed(Block::from(4u128));
        let keys = rand_blocks(1000, &mut rng);
        let values = (0..1000u64).map(|i| Block::from_words(0, i)).collect::<Vec<_>>();
        let (okvs, blocks) = BandOkvs::encode(&keys, &values, &mut rng).unwrap();
        for _ in 0..1000 {
            let absent = rng.gen::<Block>();
            assert!(okvs.decode(absent, &blocks).lo_u64() >= 1000);
        }
    }

    #[test]
    fn test_absent_keys_decode_uniformly() {
        // Bit-balance check over 10^4 pseudorandom decodes.
        let mut rng = AesRng::from_block_seed(Block::from(5u128));
        let keys = rand_blocks(2000, &mut rng);
        let values = rand_blocks(2000, &mut rng);
        let (okvs, blocks) = BandOkvs::encode(&keys, &values, &mut rng).unwrap();
        let samples = 10_000;
        let mut ones = [0u32; 128];
        for _ in 0..samples {
            let bits = u128::from(okvs.decode(rng.gen::<Block>(), &blocks));
            for (i, count) in ones.iter_mut().enumerate() {
                *count += ((bits >> i) & 1) as u32;
            }
        }
        for &count in ones.iter() {
            let freq = count as f64 / samples as f64;
            assert!((0.45..=0.55).contains(&freq), "biased bit: {}", freq);
        }
    }

    #[test]
    fn test_band_length_table() {
        assert_eq!(BandOkvs::band_length_for(1 << 14).unwrap(), 339);
        assert_eq!(BandOkvs::band_length_for(1 << 16).unwrap(), 350);
        assert_eq!(BandOkvs::band_length_for(1 << 20).unwrap(), 377);
        assert_eq!(BandOkvs::band_length_for(1 << 24).unwrap(), 413);
        assert!(matches!(
            BandOkvs::band_length_for((1 << 24) + 1),
            Err(Error::Config {
                field: "n_items",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut rng = AesRng::new();
        assert!(BandOkvs::encode(&[], &[], &mut rng).is_err());
    }
}
