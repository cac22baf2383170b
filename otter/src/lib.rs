// -*- mode: rust; -*-
//
// This file is part of `otter`.
// See LICENSE for licensing information.

//! Single-pair 1-out-of-2 oblivious transfer over 128-bit blocks, via the
//! Chou-Orlandi "simplest" protocol.

mod errors;
pub mod ot;

pub use crate::errors::Error;
pub use crate::ot::{ChouOrlandiReceiver, ChouOrlandiSender};
