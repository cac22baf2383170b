// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! The fuzzy PSI protocol under Hamming distance.
//!
//! Offline, the receiver fingerprints its vectors with subset-parity LSH,
//! publishes a band OKVS mapping fingerprints to vector indices, and ships
//! one slot-packed BFV ciphertext per vector plus its public key. Online,
//! the sender runs exactly L rounds per query (OKVS decode, slot-selector
//! extraction, masked homomorphic XOR, blinded distance sum), after which
//! the parties aggregate the round flags and the matching vector (or a
//! dummy) is delivered through a 1-out-of-2 oblivious transfer.
//!
//! The wire pattern per query depends only on the public parameters: OKVS
//! misses substitute dummy encryptions, and the fingerprint sequence always
//! has exactly L entries.

use crate::{
    delivery,
    he::{self, HeReceiver, HeSender},
    lsh::SubsetParityLsh,
    okvs::BandOkvs,
    params::{self, ProtocolParams},
    sspeqt, utils, Error,
};
use fhe::bfv::{BfvParameters, Ciphertext};
use itertools::Itertools;
use log::{debug, info};
use rand::{CryptoRng, Rng, RngCore};
use scupper::{AbstractChannel, Block, SemiHonest};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// OKVS key for a fingerprint string owned by vector/query `index`: the
/// fingerprint hash in the high word, the index in the low word.
fn okvs_key(fingerprint: &str, index: usize) -> Block {
    let digest = Sha256::digest(fingerprint.as_bytes());
    let mut h = [0u8; 8];
    h.copy_from_slice(&digest[..8]);
    Block::from_words(u64::from_le_bytes(h), index as u64)
}

/// The receiver-side OKVS as held by the sender after the offline phase.
struct OkvsState {
    decoder: BandOkvs,
    blocks: Vec<Block>,
}

/// Fuzzy private set intersection sender (the querying party).
pub struct Sender {
    params: ProtocolParams,
    lsh: SubsetParityLsh,
    par: Arc<BfvParameters>,
    okvs: Option<OkvsState>,
    he: Option<HeSender>,
    packed: Vec<Ciphertext>,
    nreceiver: usize,
}

impl Sender {
    /// Create a sender. `lsh_seed` must equal the receiver's.
    pub fn init(params: ProtocolParams, lsh_seed: Block) -> Result<Self, Error> {
        params.validate()?;
        let lsh = SubsetParityLsh::new(&params, lsh_seed);
        let par = he::bfv_parameters()?;
        Ok(Sender {
            params,
            lsh,
            par,
            okvs: None,
            he: None,
            packed: Vec::new(),
            nreceiver: 0,
        })
    }

    /// Run the offline phase: receive the OKVS, the packed ciphertexts (in
    /// the announced batch cadence, ACKing each), and the public key.
    pub fn offline<C: AbstractChannel>(&mut self, channel: &mut C) -> Result<(), Error> {
        let okvs_len = channel.read_u64()? as usize;
        let blocks = channel.read_blocks(okvs_len)?;
        let seed = channel.read_block()?;
        let m_okvs = channel.read_u32()? as usize;
        let band_len = channel.read_u32()? as usize;
        let n_items = channel.read_u32()? as usize;
        if m_okvs != okvs_len {
            return Err(Error::ProtocolError(format!(
                "OKVS length {} disagrees with announced size {}",
                okvs_len, m_okvs
            )));
        }
        if band_len == 0 || band_len > m_okvs {
            return Err(Error::ProtocolError(format!(
                "OKVS band length {} out of range for size {}",
                band_len, m_okvs
            )));
        }
        let decoder = BandOkvs::new(n_items, m_okvs, band_len, seed);
        info!(
            "offline: received OKVS of {} blocks ({} items, band {})",
            okvs_len, n_items, band_len
        );

        let n = channel.read_u32()? as usize;
        let nbatches = n.div_ceil(self.params.batch_size);
        let mut packed = Vec::with_capacity(n);
        for batch in 0..nbatches {
            let upto = ((batch + 1) * self.params.batch_size).min(n);
            while packed.len() < upto {
                packed.push(he::read_ciphertext(channel, &self.par)?);
            }
            let token = channel.read_string()?;
            let expected = format!("BATCH_{}", batch);
            if token != expected {
                return Err(Error::ProtocolError(format!(
                    "unexpected sync token {:?}, wanted {:?}",
                    token, expected
                )));
            }
            channel.write_string("ACK")?;
            channel.flush()?;
            debug!("offline: acknowledged batch {}/{}", batch + 1, nbatches);
        }

        let pk_bytes = channel.read_frame()?;
        self.he = Some(HeSender::new(self.par.clone(), &pk_bytes, self.params.dim)?);
        self.okvs = Some(OkvsState { decoder, blocks });
        self.packed = packed;
        self.nreceiver = n;
        info!("offline: stored {} packed ciphertexts", n);
        Ok(())
    }

    /// Run the online phase over `queries`. Returns how many queries
    /// aggregated to a match.
    pub fn online<C: AbstractChannel, RNG: CryptoRng + Rng + rand09::CryptoRng + rand09::RngCore>(
        &mut self,
        queries: &[Vec<u8>],
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<usize, Error> {
        let dim = self.params.dim;
        for q in queries {
            if q.len() != dim {
                return Err(Error::Config {
                    field: "dim",
                    details: format!("query of length {} in a dim-{} session", q.len(), dim),
                });
            }
        }
        let he = match self.he.as_ref() {
            Some(he) => he,
            None => {
                return Err(Error::ProtocolError(
                    "online phase started before offline phase".to_string(),
                ))
            }
        };

        channel.write_u32(queries.len() as u32)?;
        channel.flush()?;
        let mut ot = otter::ChouOrlandiSender::init(channel, rng)?;

        let mut nmatched = 0;
        for (j, q) in queries.iter().enumerate() {
            if j % 100 == 0 && j > 0 {
                info!("online: query {}/{}", j, queries.len());
            }
            let mut flags = Vec::with_capacity(self.params.lsh_count);
            let fingerprints = self.lsh.fingerprints(q);
            for fp in fingerprints.iter().take(self.params.lsh_count) {
                let e = self.query_round(he, fp, j, q, channel, rng)?;
                flags.push(e);
            }
            let matched = delivery::peqt_sender(channel, &flags, rng)?;
            delivery::deliver_sender(&mut ot, channel, &utils::pack_bits(q), rng)?;
            if matched {
                nmatched += 1;
            }
        }
        info!("online: {} of {} queries matched", nmatched, queries.len());
        Ok(nmatched)
    }

    /// One fingerprint round of query `j`: decode, extract, mask, blind the
    /// distance sum, and collect the receiver's flag.
    fn query_round<C: AbstractChannel, RNG: CryptoRng + Rng + rand09::CryptoRng + rand09::RngCore>(
        &self,
        he: &HeSender,
        fingerprint: &str,
        j: usize,
        q: &[u8],
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<u8, Error> {
        let dim = self.params.dim;

        let bit_cts = match self.decode_index(fingerprint, j) {
            Some(idx) => (0..dim)
                .map(|k| he.extract_bit(&self.packed[idx], k))
                .collect::<Result<Vec<Ciphertext>, Error>>()?,
            // A miss is indistinguishable from a hit on the wire: the dummy
            // encryptions run through the same masking pipeline.
            None => (0..dim)
                .map(|_| he.encrypt_zero(rng))
                .collect::<Result<Vec<Ciphertext>, Error>>()?,
        };

        let r = utils::rand_binary_vec(dim, rng);
        for (k, ct) in bit_cts.iter().enumerate() {
            let masked = &he.encrypt_slot_bit(k, r[k], rng)? + ct;
            he::write_ciphertext(channel, &masked)?;
        }
        let u = r.iter().zip(q.iter()).map(|(rk, qk)| rk ^ qk).collect_vec();
        channel.write_bytes(&u)?;
        channel.flush()?;

        let nblocks = self.params.nblocks();
        let mut sum = he::read_ciphertext(channel, &self.par)?;
        for _ in 1..nblocks {
            sum += &he::read_ciphertext(channel, &self.par)?;
        }
        let blind = rng.gen_range(0..params::BLIND_RANGE);
        sum += &he.encrypt_scalar(blind, rng)?;
        he::write_ciphertext(channel, &sum)?;
        channel.write_u64(blind)?;
        channel.flush()?;

        let e = channel.read_u8()?;
        if e > 1 {
            return Err(Error::ProtocolError(format!(
                "match flag byte out of range: {}",
                e
            )));
        }
        Ok(e)
    }

    /// Decode the OKVS under (fingerprint, query index). Out-of-range
    /// indices, the pseudorandom decodes of non-inserted keys, are misses;
    /// genuine value blocks carry zero high bits.
    fn decode_index(&self, fingerprint: &str, query_index: usize) -> Option<usize> {
        let st = self.okvs.as_ref()?;
        let block = st.decoder.decode(okvs_key(fingerprint, query_index), &st.blocks);
        let idx = block.lo_u64() as usize;
        if block.hi_u64() == 0 && idx < self.nreceiver {
            Some(idx)
        } else {
            None
        }
    }
}

/// Fuzzy private set intersection receiver (the set holder; learns the
/// intersection).
pub struct Receiver {
    params: ProtocolParams,
    lsh: SubsetParityLsh,
    he: Option<HeReceiver>,
}

impl Receiver {
    /// Create a receiver. `lsh_seed` must equal the sender's.
    pub fn init(params: ProtocolParams, lsh_seed: Block) -> Result<Self, Error> {
        params.validate()?;
        let lsh = SubsetParityLsh::new(&params, lsh_seed);
        Ok(Receiver {
            params,
            lsh,
            he: None,
        })
    }

    /// Run the offline phase over the receiver set `inputs`: build and send
    /// the OKVS, the packed ciphertexts, and the public key.
    pub fn offline<C: AbstractChannel, RNG: CryptoRng + RngCore + rand09::CryptoRng + rand09::RngCore>(
        &mut self,
        inputs: &[Vec<u8>],
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<(), Error> {
        let dim = self.params.dim;
        if inputs.is_empty() {
            return Err(Error::Config {
                field: "inputs",
                details: "receiver set must be nonempty".to_string(),
            });
        }
        for w in inputs {
            if w.len() != dim {
                return Err(Error::Config {
                    field: "dim",
                    details: format!("input of length {} in a dim-{} session", w.len(), dim),
                });
            }
        }

        let he = HeReceiver::new(rng)?;
        info!("offline: key material generated");

        let npairs = inputs.len() * self.params.lsh_count;
        let mut keys = Vec::with_capacity(npairs);
        let mut values = Vec::with_capacity(npairs);
        for (i, w) in inputs.iter().enumerate() {
            for fp in self.lsh.fingerprints(w) {
                keys.push(okvs_key(&fp, i));
                values.push(Block::from_words(0, i as u64));
            }
        }
        let (okvs, blocks) = BandOkvs::encode(&keys, &values, rng)?;
        info!(
            "offline: encoded {} fingerprint pairs into {} OKVS blocks",
            keys.len(),
            blocks.len()
        );

        channel.write_u64(blocks.len() as u64)?;
        for b in &blocks {
            channel.write_block(b)?;
        }
        channel.write_block(&okvs.seed())?;
        channel.write_u32(okvs.size() as u32)?;
        channel.write_u32(okvs.band_len() as u32)?;
        channel.write_u32(okvs.nitems() as u32)?;
        channel.write_u32(inputs.len() as u32)?;
        channel.flush()?;

        let nbatches = inputs.len().div_ceil(self.params.batch_size);
        for batch in 0..nbatches {
            let lo = batch * self.params.batch_size;
            let hi = (lo + self.params.batch_size).min(inputs.len());
            for w in &inputs[lo..hi] {
                let ct = he.encrypt_packed_bits(w, rng)?;
                he::write_ciphertext(channel, &ct)?;
            }
            channel.write_string(&format!("BATCH_{}", batch))?;
            channel.flush()?;
            let ack = channel.read_string()?;
            if ack != "ACK" {
                return Err(Error::ProtocolError(format!(
                    "unexpected batch acknowledgement {:?}",
                    ack
                )));
            }
            debug!("offline: batch {}/{} delivered", batch + 1, nbatches);
        }

        channel.write_frame(&he.pk_bytes())?;
        channel.flush()?;
        info!("offline: sent {} packed ciphertexts and public key", inputs.len());
        self.he = Some(he);
        Ok(())
    }

    /// Run the online phase; returns the fuzzy intersection: every sender
    /// vector within Hamming distance δ of one of the receiver's.
    pub fn online<C: AbstractChannel, RNG: CryptoRng + Rng + rand09::CryptoRng + rand09::RngCore>(
        &mut self,
        channel: &mut C,
        rng: &mut RNG,
    ) -> Result<Vec<Vec<u8>>, Error> {
        let he = match self.he.as_ref() {
            Some(he) => he,
            None => {
                return Err(Error::ProtocolError(
                    "online phase started before offline phase".to_string(),
                ))
            }
        };
        let dim = self.params.dim;
        let nblocks = self.params.nblocks();

        let nqueries = channel.read_u32()? as usize;
        let mut ot = otter::ChouOrlandiReceiver::init(channel)?;
        info!("online: {} incoming queries", nqueries);

        let mut intersection = Vec::new();
        for j in 0..nqueries {
            if j % 100 == 0 && j > 0 {
                info!("online: query {}/{}", j, nqueries);
            }
            let mut flags = Vec::with_capacity(self.params.lsh_count);
            for _ in 0..self.params.lsh_count {
                let cts = (0..dim)
                    .map(|_| he::read_ciphertext(channel, he.params()))
                    .collect::<Result<Vec<Ciphertext>, Error>>()?;
                let mut u = vec![0u8; dim];
                channel.read_bytes(&mut u)?;

                let v = cts
                    .iter()
                    .enumerate()
                    .map(|(k, ct)| he.decrypt_slot(ct, k).map(|x| (x % 2) as u8))
                    .collect::<Result<Vec<u8>, Error>>()?;
                let counts = sspeqt::block_mismatch_counts(&u, &v);
                for &c in &counts {
                    he::write_ciphertext(channel, &he.encrypt_scalar(c, rng)?)?;
                }
                channel.flush()?;

                let sum = he::read_ciphertext(channel, he.params())?;
                let blind = channel.read_u64()?;
                let total = he.decrypt_scalar(&sum)?;
                let max = dim as u64 + params::BLIND_RANGE;
                if total > max || total < blind {
                    return Err(Error::HeRange { value: total, max });
                }
                let distance = total - blind;
                if distance > dim as u64 {
                    return Err(Error::HeRange {
                        value: distance,
                        max: dim as u64,
                    });
                }
                debug_assert_eq!(counts.len(), nblocks);

                let e = (distance <= self.params.delta as u64) as u8;
                channel.write_u8(e)?;
                channel.flush()?;
                flags.push(e);
            }

            let matched = delivery::peqt_receiver(channel, &flags)?;
            let payload =
                delivery::deliver_receiver(&mut ot, channel, matched, self.params.packed_len(), rng)?;
            if matched {
                intersection.push(utils::unpack_bits(&payload, dim));
            }
        }
        info!("online: intersection holds {} vectors", intersection.len());
        Ok(intersection)
    }
}

impl SemiHonest for Sender {}
impl SemiHonest for Receiver {}

#[cfg(test)]
mod tests {
    use super::*;
    use scupper::{AesRng, Channel};
    use std::{
        io::{BufReader, BufWriter},
        os::unix::net::UnixStream,
    };

    #[test]
    fn test_exact_match_round_trip() {
        // Equal vectors share every fingerprint, so delivery is
        // deterministic for any LSH seed.
        let params = ProtocolParams::new(8, 1, 4).unwrap();
        let lsh_seed = Block::from_words(0x5eed, 0x5eed);
        let v = vec![1u8, 0, 1, 0, 0, 1, 1, 0];
        let w = vec![v.clone()];
        let q = vec![v.clone()];

        let (s, r) = UnixStream::pair().unwrap();
        let handle = std::thread::spawn(move || {
            let mut rng = AesRng::new();
            let reader = BufReader::new(s.try_clone().unwrap());
            let writer = BufWriter::new(s);
            let mut channel = Channel::new(reader, writer);
            let mut sender = Sender::init(params, lsh_seed).unwrap();
            sender.offline(&mut channel).unwrap();
            sender.online(&q, &mut channel, &mut rng).unwrap()
        });

        let mut rng = AesRng::new();
        let reader = BufReader::new(r.try_clone().unwrap());
        let writer = BufWriter::new(r);
        let mut channel = Channel::new(reader, writer);
        let mut receiver = Receiver::init(params, lsh_seed).unwrap();
        receiver.offline(&w, &mut channel, &mut rng).unwrap();
        let intersection = receiver.online(&mut channel, &mut rng).unwrap();
        let nmatched = handle.join().unwrap();

        assert_eq!(nmatched, 1);
        assert_eq!(intersection, vec![v]);
    }

    #[test]
    fn test_online_before_offline_rejected() {
        let params = ProtocolParams::new(8, 1, 4).unwrap();
        let (s, _r) = UnixStream::pair().unwrap();
        let mut channel = Channel::new(
            BufReader::new(s.try_clone().unwrap()),
            BufWriter::new(s),
        );
        let mut rng = AesRng::new();
        let mut receiver = Receiver::init(params, Block::from(1u128)).unwrap();
        assert!(matches!(
            receiver.online(&mut channel, &mut rng),
            Err(Error::ProtocolError(_))
        ));
    }
}
