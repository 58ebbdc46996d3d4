//! Errors raised while parsing shared types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid public key length: expected 64 hex characters, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid public key hex: {0}")]
    InvalidKeyHex(String),
}
