// -*- mode: rust; -*-
//
// This file is part of `otter`.
// See LICENSE for licensing information.

//! One-out-of-two oblivious transfer of `Block` messages.
//!
//! The interface is single-pair: every call moves exactly one `(m0, m1)`
//! pair under one choice bit, matching a protocol that runs one transfer
//! per delivered result.

pub mod chou_orlandi;

/// The Chou-Orlandi OT sender.
pub type ChouOrlandiSender = chou_orlandi::Sender;
/// The Chou-Orlandi OT receiver.
pub type ChouOrlandiReceiver = chou_orlandi::Receiver;
