// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

/// Errors produced by the fuzzy private set intersection protocol.
#[derive(Debug)]
pub enum Error {
    /// A protocol parameter is invalid or the parties cannot be configured
    /// consistently; names the violating field.
    Config {
        /// The offending parameter.
        field: &'static str,
        /// What went wrong with it.
        details: String,
    },
    /// Key generation, parameter validation, or encoder setup failed.
    CryptoSetup(String),
    /// An input/output error occurred.
    IoError(std::io::Error),
    /// The homomorphic encryption layer failed.
    HeError(fhe::Error),
    /// A decrypted value fell outside its expected range.
    HeRange {
        /// The recovered value.
        value: u64,
        /// The inclusive upper bound it had to satisfy.
        max: u64,
    },
    /// A state-machine precondition was violated (wrong sync token, wrong
    /// ACK, malformed flag byte).
    ProtocolError(String),
    /// The underlying oblivious transfer failed.
    OtError(otter::Error),
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(e: std::io::Error) -> Error {
        Error::IoError(e)
    }
}

impl From<fhe::Error> for Error {
    #[inline]
    fn from(e: fhe::Error) -> Error {
        Error::HeError(e)
    }
}

impl From<otter::Error> for Error {
    #[inline]
    fn from(e: otter::Error) -> Error {
        Error::OtError(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Config { field, details } => {
                write!(f, "configuration error in `{}`: {}", field, details)
            }
            Error::CryptoSetup(s) => write!(f, "crypto setup error: {}", s),
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::HeError(e) => write!(f, "homomorphic encryption error: {}", e),
            Error::HeRange { value, max } => write!(
                f,
                "decrypted value {} outside expected range [0, {}]",
                value, max
            ),
            Error::ProtocolError(s) => write!(f, "protocol error: {}", s),
            Error::OtError(e) => write!(f, "oblivious transfer error: {}", e),
        }
    }
}
