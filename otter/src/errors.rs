// -*- mode: rust; -*-
//
// This file is part of `otter`.
// See LICENSE for licensing information.

/// Errors produced by `otter`.
#[derive(Debug)]
pub enum Error {
    /// An I/O error has occurred.
    IoError(std::io::Error),
    /// The peer supplied a group element that fails validation.
    InvalidPoint,
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IoError(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::InvalidPoint => "invalid group element from peer".fmt(f),
        }
    }
}
