// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Two-party fuzzy private set intersection under Hamming distance.
//!
//! The receiver holds n binary vectors, the sender holds m; at the end of
//! the protocol the receiver learns exactly those sender vectors within
//! Hamming distance δ of one of its own, and nothing else. Candidate
//! narrowing uses subset-parity locality-sensitive hashing over an oblivious
//! key-value store; the distance check itself runs under batched BFV
//! homomorphic encryption, with a 1-out-of-2 oblivious transfer delivering
//! each matching vector.

mod delivery;
mod errors;
mod he;
pub mod lsh;
pub mod okvs;
pub mod params;
mod psi;
mod sspeqt;
pub mod utils;

pub use crate::{errors::Error, params::ProtocolParams, psi::*};
