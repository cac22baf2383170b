// -*- mode: rust; -*-
//
// This file is part of `otter`.
// See LICENSE for licensing information.

//! The Chou-Orlandi "simplest" oblivious transfer protocol (cf.
//! <https://eprint.iacr.org/2015/267>), specialized to one transfer per
//! call: the consumer delivers exactly one key pair per protocol result, so
//! there is no batch interface. One `init` exchange serves any number of
//! subsequent transfers on the same object; the transfer ordinal is hashed
//! into the key derivation so those transfers stay independent.

use crate::errors::Error;
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_TABLE,
    ristretto::{RistrettoBasepointTable, RistrettoPoint},
    scalar::Scalar,
    traits::IsIdentity,
};
use rand::{CryptoRng, Rng};
use scupper::{AbstractChannel, Block, SemiHonest};

/// Oblivious transfer sender.
pub struct Sender {
    y: Scalar,
    // y·S, fixed for the session and folded into every derived `k1`.
    ys: RistrettoPoint,
    transfer: u128,
}

impl Sender {
    /// Fix the session secret and publish the sender's group element.
    pub fn init<C: AbstractChannel, RNG: CryptoRng + Rng>(
        channel: &mut C,
        mut rng: &mut RNG,
    ) -> Result<Self, Error> {
        let y = Scalar::random(&mut rng);
        let s = &y * RISTRETTO_BASEPOINT_TABLE;
        channel.write_pt(&s)?;
        channel.flush()?;
        Ok(Self {
            y,
            ys: y * s,
            transfer: 0,
        })
    }

    /// Obliviously transfer one of `msgs`, selected by the receiver's
    /// hidden choice bit.
    pub fn send<C: AbstractChannel>(
        &mut self,
        channel: &mut C,
        msgs: (Block, Block),
    ) -> Result<(), Error> {
        let blind = channel.read_pt()?;
        let yb = self.y * blind;
        let k0 = Block::hash_pt(self.transfer, &yb);
        let k1 = Block::hash_pt(self.transfer, &(yb - self.ys));
        self.transfer += 1;
        channel.write_block(&(k0 ^ msgs.0))?;
        channel.write_block(&(k1 ^ msgs.1))?;
        channel.flush()?;
        Ok(())
    }
}

/// Oblivious transfer receiver.
pub struct Receiver {
    s: RistrettoBasepointTable,
    transfer: u128,
}

impl Receiver {
    /// Read and validate the sender's group element. A degenerate element
    /// would collapse the two derived keys, so it is rejected outright.
    pub fn init<C: AbstractChannel>(channel: &mut C) -> Result<Self, Error> {
        let s = channel.read_pt()?;
        if s.is_identity() {
            return Err(Error::InvalidPoint);
        }
        Ok(Self {
            s: RistrettoBasepointTable::create(&s),
            transfer: 0,
        })
    }

    /// Receive the message selected by `choice`.
    pub fn receive<C: AbstractChannel, RNG: CryptoRng + Rng>(
        &mut self,
        channel: &mut C,
        choice: bool,
        mut rng: &mut RNG,
    ) -> Result<Block, Error> {
        let x = Scalar::random(&mut rng);
        let mut blind = &x * RISTRETTO_BASEPOINT_TABLE;
        if choice {
            blind += &Scalar::ONE * &self.s;
        }
        channel.write_pt(&blind)?;
        channel.flush()?;
        let key = Block::hash_pt(self.transfer, &(&x * &self.s));
        self.transfer += 1;
        let c0 = channel.read_block()?;
        let c1 = channel.read_block()?;
        Ok(key ^ if choice { c1 } else { c0 })
    }
}

impl SemiHonest for Sender {}
impl SemiHonest for Receiver {}

#[cfg(test)]
mod tests {
    use super::*;
    use scupper::{AesRng, Channel};
    use std::{
        io::{BufReader, BufWriter, Cursor},
        os::unix::net::UnixStream,
    };

    #[test]
    fn test_transfers_deliver_chosen_block() {
        // One init, then a run of single transfers with mixed choice bits,
        // as the per-query delivery uses it.
        let pairs = (0..8)
            .map(|_| (rand::random::<Block>(), rand::random::<Block>()))
            .collect::<Vec<(Block, Block)>>();
        let choices = [false, true, true, false, true, false, false, true];
        let expected = pairs
            .iter()
            .zip(choices.iter())
            .map(|(&(m0, m1), &b)| if b { m1 } else { m0 })
            .collect::<Vec<Block>>();

        let (s, r) = UnixStream::pair().unwrap();
        let sender_pairs = pairs.clone();
        let handle = std::thread::spawn(move || {
            let mut rng = AesRng::new();
            let reader = BufReader::new(s.try_clone().unwrap());
            let writer = BufWriter::new(s);
            let mut channel = Channel::new(reader, writer);
            let mut ot = Sender::init(&mut channel, &mut rng).unwrap();
            for msgs in sender_pairs {
                ot.send(&mut channel, msgs).unwrap();
            }
        });

        let mut rng = AesRng::new();
        let reader = BufReader::new(r.try_clone().unwrap());
        let writer = BufWriter::new(r);
        let mut channel = Channel::new(reader, writer);
        let mut ot = Receiver::init(&mut channel).unwrap();
        for (i, &b) in choices.iter().enumerate() {
            let got = ot.receive(&mut channel, b, &mut rng).unwrap();
            assert_eq!(got, expected[i]);
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_rejects_identity_element() {
        // The identity compresses to 32 zero bytes.
        let mut channel = Channel::new(Cursor::new(vec![0u8; 32]), Vec::new());
        assert!(matches!(
            Receiver::init(&mut channel),
            Err(Error::InvalidPoint)
        ));
    }
}
