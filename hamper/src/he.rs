// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Thin wrappers around the BFV scheme of the `fhe` crate: key material per
//! role, slot packing of bit vectors, slot-selector extraction, and the
//! length-prefixed ciphertext wire codec.

use crate::{params, Error};
use fhe::bfv::{
    BfvParameters, BfvParametersBuilder, Ciphertext, Encoding, Plaintext, PublicKey, SecretKey,
};
use fhe_traits::{
    DeserializeParametrized, FheDecoder, FheDecrypter, FheEncoder, FheEncrypter,
    Serialize as FheSerialize,
};
use rand09::{CryptoRng, RngCore};
use scupper::AbstractChannel;
use std::sync::Arc;

/// Build the shared BFV parameter set. Both parties derive it locally from
/// compile-time constants; it never travels on the wire.
pub(crate) fn bfv_parameters() -> Result<Arc<BfvParameters>, Error> {
    BfvParametersBuilder::new()
        .set_degree(params::BFV_DEGREE)
        .set_plaintext_modulus(params::BFV_PLAINTEXT_MODULUS)
        .set_moduli_sizes(&params::BFV_MODULI_SIZES)
        .build()
        .map(Arc::new)
        .map_err(|e| Error::CryptoSetup(format!("BFV parameter generation: {}", e)))
}

/// The receiver's homomorphic capability: the full key pair. The secret key
/// never leaves this struct.
pub(crate) struct HeReceiver {
    par: Arc<BfvParameters>,
    sk: SecretKey,
    pk: PublicKey,
}

impl HeReceiver {
    pub fn new<RNG: CryptoRng + RngCore>(rng: &mut RNG) -> Result<Self, Error> {
        let par = bfv_parameters()?;
        let sk = SecretKey::random(&par, rng);
        let pk = PublicKey::new(&sk, rng);
        Ok(HeReceiver { par, sk, pk })
    }

    pub fn params(&self) -> &Arc<BfvParameters> {
        &self.par
    }

    /// Serialized public key for transmission.
    pub fn pk_bytes(&self) -> Vec<u8> {
        self.pk.to_bytes()
    }

    /// Encrypt a bit vector with bit j in slot j and zeros elsewhere.
    pub fn encrypt_packed_bits<RNG: CryptoRng + RngCore>(
        &self,
        bits: &[u8],
        rng: &mut RNG,
    ) -> Result<Ciphertext, Error> {
        let slots = bits.iter().map(|&b| (b & 1) as u64).collect::<Vec<u64>>();
        let pt = Plaintext::try_encode(slots.as_slice(), Encoding::simd(), &self.par)?;
        Ok(self.pk.try_encrypt(&pt, rng)?)
    }

    /// Encrypt a single value in slot 0.
    pub fn encrypt_scalar<RNG: CryptoRng + RngCore>(
        &self,
        value: u64,
        rng: &mut RNG,
    ) -> Result<Ciphertext, Error> {
        let pt = Plaintext::try_encode(&[value][..], Encoding::simd(), &self.par)?;
        Ok(self.pk.try_encrypt(&pt, rng)?)
    }

    /// Decrypt and return the value in slot `slot`.
    pub fn decrypt_slot(&self, ct: &Ciphertext, slot: usize) -> Result<u64, Error> {
        let pt = self.sk.try_decrypt(ct)?;
        let values = Vec::<u64>::try_decode(&pt, Encoding::simd())?;
        Ok(values[slot])
    }

    /// Decrypt and return slot 0.
    pub fn decrypt_scalar(&self, ct: &Ciphertext) -> Result<u64, Error> {
        self.decrypt_slot(ct, 0)
    }
}

/// The sender's homomorphic capability, derived purely from the received
/// public key: it can encrypt and evaluate but never decrypt.
pub(crate) struct HeSender {
    par: Arc<BfvParameters>,
    pk: PublicKey,
    // Unit plaintexts for slot-selector extraction, one per coordinate.
    units: Vec<Plaintext>,
}

impl HeSender {
    pub fn new(par: Arc<BfvParameters>, pk_bytes: &[u8], dim: usize) -> Result<Self, Error> {
        let pk = PublicKey::from_bytes(pk_bytes, &par)?;
        let units = (0..dim)
            .map(|k| {
                let mut slots = vec![0u64; k + 1];
                slots[k] = 1;
                Plaintext::try_encode(slots.as_slice(), Encoding::simd(), &par)
            })
            .collect::<Result<Vec<Plaintext>, fhe::Error>>()?;
        Ok(HeSender { par, pk, units })
    }

    /// Derive the ciphertext of bit k: slot k keeps its value, all other
    /// slots become zero (slot-selector multiplication by the unit
    /// plaintext at position k).
    pub fn extract_bit(&self, packed: &Ciphertext, k: usize) -> Result<Ciphertext, Error> {
        Ok(fhe::bfv::dot_product_scalar(
            std::iter::once(packed),
            std::iter::once(&self.units[k]),
        )?)
    }

    /// Encrypt `bit` in slot `k` and zeros elsewhere.
    pub fn encrypt_slot_bit<RNG: CryptoRng + RngCore>(
        &self,
        k: usize,
        bit: u8,
        rng: &mut RNG,
    ) -> Result<Ciphertext, Error> {
        let mut slots = vec![0u64; k + 1];
        slots[k] = (bit & 1) as u64;
        let pt = Plaintext::try_encode(slots.as_slice(), Encoding::simd(), &self.par)?;
        Ok(self.pk.try_encrypt(&pt, rng)?)
    }

    /// Encrypt the all-zero vector (the dummy path of an OKVS miss).
    pub fn encrypt_zero<RNG: CryptoRng + RngCore>(
        &self,
        rng: &mut RNG,
    ) -> Result<Ciphertext, Error> {
        let pt = Plaintext::try_encode(&[0u64][..], Encoding::simd(), &self.par)?;
        Ok(self.pk.try_encrypt(&pt, rng)?)
    }

    /// Encrypt a single value in slot 0.
    pub fn encrypt_scalar<RNG: CryptoRng + RngCore>(
        &self,
        value: u64,
        rng: &mut RNG,
    ) -> Result<Ciphertext, Error> {
        let pt = Plaintext::try_encode(&[value][..], Encoding::simd(), &self.par)?;
        Ok(self.pk.try_encrypt(&pt, rng)?)
    }
}

/// Write a ciphertext as a length-prefixed frame.
pub(crate) fn write_ciphertext<C: AbstractChannel>(
    channel: &mut C,
    ct: &Ciphertext,
) -> Result<(), Error> {
    channel.write_frame(&ct.to_bytes())?;
    Ok(())
}

/// Read a length-prefixed ciphertext frame.
pub(crate) fn read_ciphertext<C: AbstractChannel>(
    channel: &mut C,
    par: &Arc<BfvParameters>,
) -> Result<Ciphertext, Error> {
    let bytes = channel.read_frame()?;
    Ok(Ciphertext::from_bytes(&bytes, par)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scupper::{AesRng, Block, Channel};
    use std::io::Cursor;

    #[test]
    fn test_packed_round_trip() {
        let mut rng = AesRng::from_block_seed(Block::from(1u128));
        let he = HeReceiver::new(&mut rng).unwrap();
        let bits = crate::utils::rand_binary_vec(128, &mut rng);
        let ct = he.encrypt_packed_bits(&bits, &mut rng).unwrap();
        for (k, &b) in bits.iter().enumerate() {
            assert_eq!(he.decrypt_slot(&ct, k).unwrap(), b as u64);
        }
        assert_eq!(he.decrypt_slot(&ct, 128).unwrap(), 0);
    }

    #[test]
    fn test_extract_and_mask() {
        let mut rng = AesRng::from_block_seed(Block::from(2u128));
        let receiver = HeReceiver::new(&mut rng).unwrap();
        let sender = HeSender::new(
            receiver.params().clone(),
            &receiver.pk_bytes(),
            8,
        )
        .unwrap();
        let bits = vec![1, 0, 1, 1, 0, 0, 1, 0];
        let packed = receiver.encrypt_packed_bits(&bits, &mut rng).unwrap();
        for (k, &b) in bits.iter().enumerate() {
            let extracted = sender.extract_bit(&packed, k).unwrap();
            // Slot k carries the bit, every other slot is zero.
            assert_eq!(receiver.decrypt_slot(&extracted, k).unwrap(), b as u64);
            let other = (k + 1) % 8;
            assert_eq!(receiver.decrypt_slot(&extracted, other).unwrap(), 0);
            // A masked bit decrypts to r + b in slot k.
            let masked = &sender.encrypt_slot_bit(k, 1, &mut rng).unwrap() + &extracted;
            assert_eq!(receiver.decrypt_slot(&masked, k).unwrap(), 1 + b as u64);
        }
    }

    #[test]
    fn test_blinded_sum_round_trip() {
        let mut rng = AesRng::from_block_seed(Block::from(3u128));
        let receiver = HeReceiver::new(&mut rng).unwrap();
        let sender = HeSender::new(receiver.params().clone(), &receiver.pk_bytes(), 8).unwrap();
        let counts = [3u64, 0, 7, 2];
        let mut sum = receiver.encrypt_scalar(counts[0], &mut rng).unwrap();
        for &c in &counts[1..] {
            sum += &receiver.encrypt_scalar(c, &mut rng).unwrap();
        }
        let blind = 123_456u64;
        sum += &sender.encrypt_scalar(blind, &mut rng).unwrap();
        let total = receiver.decrypt_scalar(&sum).unwrap();
        assert_eq!(total - blind, counts.iter().sum::<u64>());
    }

    #[test]
    fn test_ciphertext_wire_codec() {
        let mut rng = AesRng::from_block_seed(Block::from(4u128));
        let he = HeReceiver::new(&mut rng).unwrap();
        let ct = he.encrypt_scalar(42, &mut rng).unwrap();

        let mut out = Channel::new(Cursor::new(Vec::new()), Vec::new());
        write_ciphertext(&mut out, &ct).unwrap();
        let bytes = ct.to_bytes();

        let mut framed = (bytes.len() as u64).to_le_bytes().to_vec();
        framed.extend_from_slice(&bytes);
        let mut inp = Channel::new(Cursor::new(framed), Vec::new());
        let back = read_ciphertext(&mut inp, he.params()).unwrap();
        assert_eq!(he.decrypt_scalar(&back).unwrap(), 42);
    }
}
