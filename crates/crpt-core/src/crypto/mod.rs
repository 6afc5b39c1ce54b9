use thiserror::Error;

#[cfg(not(feature = "zeroize"))]
compile_error!("crpt-core crypto requires the `zeroize` feature");

pub mod cbc;
pub mod iv;
pub mod kdf;

pub use cbc::{CbcStream, Direction, BLOCK_LEN};
pub use iv::{generate_iv, IV_LEN};
pub use kdf::{derive_key, KEY_LEN};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, found {found}")]
    InvalidKeyLength { expected: usize, found: usize },
    #[error("invalid IV length: expected {expected}, found {found}")]
    InvalidIvLength { expected: usize, found: usize },
    #[error("ciphertext is not a whole number of blocks ({pending} trailing bytes)")]
    IncompleteBlock { pending: usize },
    #[error("invalid padding")]
    BadPadding,
}
