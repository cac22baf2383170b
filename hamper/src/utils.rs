// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Bit-vector helpers shared by the protocol, the binaries, and the tests,
//! plus the post-run statistics writer.

use crate::ProtocolParams;
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};
use std::io::Write;
use std::path::Path;

/// Sample a uniform binary vector of dimension `d`, one bit per byte.
pub fn rand_binary_vec<RNG: CryptoRng + Rng>(d: usize, rng: &mut RNG) -> Vec<u8> {
    (0..d).map(|_| rng.gen::<bool>() as u8).collect()
}

/// Return a copy of `base` with exactly `distance` randomly chosen bits
/// flipped.
pub fn neighbor_at_distance<RNG: CryptoRng + Rng>(
    base: &[u8],
    distance: usize,
    rng: &mut RNG,
) -> Vec<u8> {
    let mut v = base.to_vec();
    let distance = distance.min(v.len());
    let mut positions = (0..v.len()).collect::<Vec<usize>>();
    positions.shuffle(rng);
    for &p in &positions[..distance] {
        v[p] ^= 1;
    }
    v
}

/// Hamming distance between two equal-length binary vectors.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count()
}

/// Pack a binary vector (one bit per byte) into bytes, LSB first.
pub fn pack_bits(bits: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &b) in bits.iter().enumerate() {
        out[i / 8] |= (b & 1) << (i % 8);
    }
    out
}

/// Unpack `d` bits (LSB first) from bytes into a binary vector.
pub fn unpack_bits(bytes: &[u8], d: usize) -> Vec<u8> {
    (0..d).map(|i| (bytes[i / 8] >> (i % 8)) & 1).collect()
}

/// Per-phase timing and communication volume, as sampled by the binaries
/// from a tracking channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhaseStats {
    /// Wall-clock seconds spent in the phase.
    pub seconds: f64,
    /// Megabytes written during the phase.
    pub sent_mb: f64,
    /// Megabytes read during the phase.
    pub received_mb: f64,
}

/// Append a human-readable statistics block for one finished session.
pub fn append_stats(
    path: &Path,
    role: &str,
    params: &ProtocolParams,
    set_size: usize,
    offline: PhaseStats,
    online: PhaseStats,
) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "========================================")?;
    writeln!(file, "role: {}", role)?;
    writeln!(
        file,
        "params: set_size={}, d={}, delta={}, L={}",
        set_size, params.dim, params.delta, params.lsh_count
    )?;
    for (name, phase) in [("offline", offline), ("online", online)] {
        writeln!(
            file,
            "{}: {:.3} s, sent {:.3} MB, received {:.3} MB",
            name, phase.seconds, phase.sent_mb, phase.received_mb
        )?;
    }
    writeln!(
        file,
        "total: {:.3} s, {:.3} MB",
        offline.seconds + online.seconds,
        offline.sent_mb + offline.received_mb + online.sent_mb + online.received_mb
    )?;
    writeln!(file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scupper::AesRng;

    #[test]
    fn test_neighbor_distance_exact() {
        let mut rng = AesRng::new();
        let base = rand_binary_vec(128, &mut rng);
        for distance in [0, 1, 5, 64, 128] {
            let v = neighbor_at_distance(&base, distance, &mut rng);
            assert_eq!(hamming_distance(&base, &v), distance);
        }
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let mut rng = AesRng::new();
        for d in [1, 7, 8, 9, 16, 127, 128] {
            let bits = rand_binary_vec(d, &mut rng);
            assert_eq!(unpack_bits(&pack_bits(&bits), d), bits);
        }
    }

    #[test]
    fn test_pack_lsb_first() {
        assert_eq!(pack_bits(&[1, 0, 0, 0, 0, 0, 0, 0, 1]), vec![0x01, 0x01]);
        assert_eq!(pack_bits(&[0, 0, 0, 0, 0, 0, 0, 1]), vec![0x80]);
    }
}
