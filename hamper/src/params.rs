// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Protocol parameters. The wire format carries none of these: both parties
//! must be configured identically.

use crate::Error;

/// BFV polynomial degree; also the number of plaintext slots available for
/// packing one vector.
pub const BFV_DEGREE: usize = 4096;

/// Plaintext modulus: a prime ≡ 1 (mod 2·degree) so SIMD batching applies,
/// with ~2^20.8 of headroom above `dim + BLIND_RANGE`.
pub const BFV_PLAINTEXT_MODULUS: u64 = (1 << 20) + (1 << 19) + (1 << 17) + (1 << 16) + (1 << 14) + 1;

/// Ciphertext modulus sizes in bits.
pub const BFV_MODULI_SIZES: [usize; 2] = [54, 55];

/// The blinded sum's mask is drawn uniformly from `[0, BLIND_RANGE)`.
pub const BLIND_RANGE: u64 = 1 << 20;

/// Default number of packed ciphertexts sent between sync points during the
/// offline transfer.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Default entropy threshold for the LSH dimension pool.
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 0.5;

/// Shared parameters of one protocol session.
#[derive(Clone, Copy, Debug)]
pub struct ProtocolParams {
    /// Vector dimension d.
    pub dim: usize,
    /// Hamming distance threshold δ.
    pub delta: usize,
    /// Number of LSH fingerprints L per vector.
    pub lsh_count: usize,
    /// Entropy threshold τ for the LSH dimension pool.
    pub entropy_threshold: f64,
    /// Offline ciphertext batch size.
    pub batch_size: usize,
}

impl ProtocolParams {
    /// Create a parameter set with the default entropy threshold and batch
    /// size, validating all fields.
    pub fn new(dim: usize, delta: usize, lsh_count: usize) -> Result<Self, Error> {
        let params = ProtocolParams {
            dim,
            delta,
            lsh_count,
            entropy_threshold: DEFAULT_ENTROPY_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check every field against its protocol bounds.
    pub fn validate(&self) -> Result<(), Error> {
        if self.dim == 0 || self.dim > BFV_DEGREE {
            return Err(Error::Config {
                field: "dim",
                details: format!("must be in [1, {}], got {}", BFV_DEGREE, self.dim),
            });
        }
        if self.delta >= self.dim {
            return Err(Error::Config {
                field: "delta",
                details: format!("must be below dim {}, got {}", self.dim, self.delta),
            });
        }
        if self.lsh_count == 0 {
            return Err(Error::Config {
                field: "lsh_count",
                details: "must be at least 1".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(Error::Config {
                field: "batch_size",
                details: "must be at least 1".to_string(),
            });
        }
        if self.dim as u64 + BLIND_RANGE >= BFV_PLAINTEXT_MODULUS {
            return Err(Error::Config {
                field: "dim",
                details: "dim + blind range overflows the plaintext modulus".to_string(),
            });
        }
        Ok(())
    }

    /// Size k of each LSH subset: ⌈d / (δ + 1)⌉.
    pub fn subset_size(&self) -> usize {
        self.dim.div_ceil(self.delta + 1)
    }

    /// Number of 8-bit coordinate blocks: ⌈d / 8⌉.
    pub fn nblocks(&self) -> usize {
        self.dim.div_ceil(8)
    }

    /// Number of bytes one vector packs into.
    pub fn packed_len(&self) -> usize {
        self.nblocks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let p = ProtocolParams::new(128, 10, 32).unwrap();
        assert_eq!(p.subset_size(), 12);
        assert_eq!(p.nblocks(), 16);
    }

    #[test]
    fn test_rejects_bad_fields() {
        assert!(matches!(
            ProtocolParams::new(0, 0, 4),
            Err(Error::Config { field: "dim", .. })
        ));
        assert!(matches!(
            ProtocolParams::new(8, 8, 4),
            Err(Error::Config { field: "delta", .. })
        ));
        assert!(matches!(
            ProtocolParams::new(8, 1, 0),
            Err(Error::Config {
                field: "lsh_count",
                ..
            })
        ));
    }

    #[test]
    fn test_plaintext_modulus_supports_batching() {
        assert_eq!(BFV_PLAINTEXT_MODULUS % (2 * BFV_DEGREE as u64), 1);
    }
}
