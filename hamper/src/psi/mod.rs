// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

pub mod hamming;

/// Fuzzy private set intersection sender.
pub type Sender = hamming::Sender;
/// Fuzzy private set intersection receiver.
pub type Receiver = hamming::Receiver;
