// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Per-query aggregation and result delivery: the "any-one" equality test
//! over the round flags, and the 1-out-of-2 oblivious transfer of the query
//! vector (or a dummy) keyed through Chou-Orlandi.

use crate::{sspeqt, Error};
use rand::{CryptoRng, Rng, RngCore};
use scupper::{AbstractChannel, AesRng, Block};

/// Mask vectors are padded to whole bytes of flags so the exchange length
/// depends only on L.
fn padded_len(nflags: usize) -> usize {
    nflags.div_ceil(8) * 8
}

/// Sender side of the any-one test: mask the flags, ship them, unmask the
/// receiver's folded answer. Returns the aggregated flag.
pub(crate) fn peqt_sender<C: AbstractChannel, RNG: CryptoRng + Rng>(
    channel: &mut C,
    flags: &[u8],
    rng: &mut RNG,
) -> Result<bool, Error> {
    let padded = padded_len(flags.len());
    let mut masks = Vec::with_capacity(padded);
    let mut masked = Vec::with_capacity(padded);
    for ell in 0..padded {
        let e = flags.get(ell).copied().unwrap_or(0) == 1;
        let (m, t) = sspeqt::share(e, rng);
        masks.push(m);
        masked.push(t);
    }
    channel.write_bytes(&masked)?;
    channel.flush()?;
    let r = channel.read_u8()?;
    if r > 1 {
        return Err(Error::ProtocolError(format!(
            "any-one result byte out of range: {}",
            r
        )));
    }
    let any_mask = masks.contains(&1) as u8;
    Ok(r ^ any_mask == 1)
}

/// Receiver side of the any-one test: recover the masks from its own flag
/// replicas and return the masked OR. Returns the locally known aggregate.
pub(crate) fn peqt_receiver<C: AbstractChannel>(
    channel: &mut C,
    flags: &[u8],
) -> Result<bool, Error> {
    let padded = padded_len(flags.len());
    let masked = channel.read_vec(padded)?;
    if masked.iter().any(|&t| t > 1) {
        return Err(Error::ProtocolError(
            "masked flag byte out of range".to_string(),
        ));
    }
    let any_flag = flags.contains(&1);
    let any_mask = masked
        .iter()
        .enumerate()
        .any(|(ell, &t)| t ^ flags.get(ell).copied().unwrap_or(0) == 1);
    let r = any_flag as u8 ^ any_mask as u8;
    channel.write_u8(r)?;
    channel.flush()?;
    Ok(any_flag)
}

/// Obliviously deliver `payload` (or an equal-length all-zero dummy): the
/// two branch keys go through the OT, then both branches travel XOR-padded
/// under their keys. The receiver can open exactly its chosen branch.
pub(crate) fn deliver_sender<C: AbstractChannel, RNG: CryptoRng + Rng>(
    ot: &mut otter::ChouOrlandiSender,
    channel: &mut C,
    payload: &[u8],
    rng: &mut RNG,
) -> Result<(), Error> {
    let k0 = rng.gen::<Block>();
    let k1 = rng.gen::<Block>();
    ot.send(channel, (k0, k1))?;
    let dummy = vec![0u8; payload.len()];
    channel.write_bytes(&xor_pad(&dummy, k0))?;
    channel.write_bytes(&xor_pad(payload, k1))?;
    channel.flush()?;
    Ok(())
}

/// Receive the branch selected by `choice`; `nbytes` is the (public) branch
/// length.
pub(crate) fn deliver_receiver<C: AbstractChannel, RNG: CryptoRng + Rng>(
    ot: &mut otter::ChouOrlandiReceiver,
    channel: &mut C,
    choice: bool,
    nbytes: usize,
    rng: &mut RNG,
) -> Result<Vec<u8>, Error> {
    let key = ot.receive(channel, choice, rng)?;
    let c0 = channel.read_vec(nbytes)?;
    let c1 = channel.read_vec(nbytes)?;
    let chosen = if choice { c1 } else { c0 };
    Ok(xor_pad(&chosen, key))
}

/// XOR `bytes` with the AES-CTR stream keyed by `key`.
fn xor_pad(bytes: &[u8], key: Block) -> Vec<u8> {
    let mut pad = vec![0u8; bytes.len()];
    AesRng::from_block_seed(key).fill_bytes(&mut pad);
    pad.iter().zip(bytes.iter()).map(|(p, b)| p ^ b).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scupper::Channel;
    use std::{
        io::{BufReader, BufWriter},
        os::unix::net::UnixStream,
    };

    fn unix_pair() -> (
        Channel<BufReader<UnixStream>, BufWriter<UnixStream>>,
        Channel<BufReader<UnixStream>, BufWriter<UnixStream>>,
    ) {
        let (a, b) = UnixStream::pair().unwrap();
        let left = Channel::new(BufReader::new(a.try_clone().unwrap()), BufWriter::new(a));
        let right = Channel::new(BufReader::new(b.try_clone().unwrap()), BufWriter::new(b));
        (left, right)
    }

    #[test]
    fn test_peqt_truth_table() {
        for flags in [
            vec![0u8; 4],
            vec![1, 0, 0, 0],
            vec![0, 0, 0, 1],
            vec![1, 1, 1, 1],
            vec![0u8; 32],
            {
                let mut f = vec![0u8; 32];
                f[17] = 1;
                f
            },
        ] {
            let expected = flags.contains(&1);
            let (mut sch, mut rch) = unix_pair();
            let sender_flags = flags.clone();
            let handle = std::thread::spawn(move || {
                let mut rng = AesRng::new();
                peqt_sender(&mut sch, &sender_flags, &mut rng).unwrap()
            });
            let got_receiver = peqt_receiver(&mut rch, &flags).unwrap();
            let got_sender = handle.join().unwrap();
            assert_eq!(got_receiver, expected);
            assert_eq!(got_sender, expected);
        }
    }

    #[test]
    fn test_delivery_both_choices() {
        for choice in [false, true] {
            let payload = (0u8..16).collect::<Vec<u8>>();
            let expected = payload.clone();
            let (mut sch, mut rch) = unix_pair();
            let handle = std::thread::spawn(move || {
                let mut rng = AesRng::new();
                let mut ot = otter::ChouOrlandiSender::init(&mut sch, &mut rng).unwrap();
                deliver_sender(&mut ot, &mut sch, &payload, &mut rng).unwrap();
            });
            let mut rng = AesRng::new();
            let mut ot = otter::ChouOrlandiReceiver::init(&mut rch).unwrap();
            let got = deliver_receiver(&mut ot, &mut rch, choice, 16, &mut rng).unwrap();
            handle.join().unwrap();
            if choice {
                assert_eq!(got, expected);
            } else {
                assert_eq!(got, vec![0u8; 16]);
            }
        }
    }
}
