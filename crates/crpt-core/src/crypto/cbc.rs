use std::fmt;

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256Dec, Aes256Enc, Block};

use crate::crypto::iv::IV_LEN;
use crate::crypto::kdf::KEY_LEN;
use crate::crypto::CryptoError;
use crate::util::{ct_fill_eq, zeroize_bytes};

pub const BLOCK_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

enum Engine {
    Encrypt(Aes256Enc),
    Decrypt(Aes256Dec),
}

/// AES-256-CBC with PKCS#7 padding, fed incrementally.
///
/// `update` may be called with any chunk sizes; the concatenation of every
/// `update` output followed by the `finalize` output equals the one-shot
/// transform. When decrypting, the last full block is held back until
/// `finalize` because it carries the padding.
pub struct CbcStream {
    engine: Engine,
    chain: [u8; BLOCK_LEN],
    pending: [u8; BLOCK_LEN],
    pending_len: usize,
}

impl CbcStream {
    pub fn new(key: &[u8], iv: &[u8], direction: Direction) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                found: key.len(),
            });
        }
        if iv.len() != IV_LEN {
            return Err(CryptoError::InvalidIvLength {
                expected: IV_LEN,
                found: iv.len(),
            });
        }

        let key_error = |_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            found: key.len(),
        };
        let engine = match direction {
            Direction::Encrypt => {
                Engine::Encrypt(Aes256Enc::new_from_slice(key).map_err(key_error)?)
            }
            Direction::Decrypt => {
                Engine::Decrypt(Aes256Dec::new_from_slice(key).map_err(key_error)?)
            }
        };

        let mut chain = [0u8; BLOCK_LEN];
        chain.copy_from_slice(iv);

        Ok(Self {
            engine,
            chain,
            pending: [0u8; BLOCK_LEN],
            pending_len: 0,
        })
    }

    pub fn direction(&self) -> Direction {
        match self.engine {
            Engine::Encrypt(_) => Direction::Encrypt,
            Engine::Decrypt(_) => Direction::Decrypt,
        }
    }

    /// Feeds `input` and appends every block that is ready to `out`.
    /// Returns the number of bytes appended, always a multiple of 16.
    pub fn update(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> usize {
        let start = out.len();
        let holds_back = self.direction() == Direction::Decrypt;

        while !input.is_empty() {
            if self.pending_len == BLOCK_LEN {
                self.flush_pending(out);
            }

            let take = (BLOCK_LEN - self.pending_len).min(input.len());
            self.pending[self.pending_len..self.pending_len + take]
                .copy_from_slice(&input[..take]);
            self.pending_len += take;
            input = &input[take..];

            if self.pending_len == BLOCK_LEN && !holds_back {
                self.flush_pending(out);
            }
        }

        out.len() - start
    }

    /// Emits the final block. Encryption pads the buffered tail; decryption
    /// validates and strips the padding of the held-back block.
    pub fn finalize(mut self, out: &mut Vec<u8>) -> Result<usize, CryptoError> {
        let start = out.len();

        match self.direction() {
            Direction::Encrypt => {
                let pad = (BLOCK_LEN - self.pending_len) as u8;
                self.pending[self.pending_len..].fill(pad);
                self.pending_len = BLOCK_LEN;
                self.flush_pending(out);
            }
            Direction::Decrypt => {
                if self.pending_len != BLOCK_LEN {
                    return Err(CryptoError::IncompleteBlock {
                        pending: self.pending_len,
                    });
                }

                let mut plain = Vec::with_capacity(BLOCK_LEN);
                self.flush_pending(&mut plain);
                let result =
                    strip_padding(&plain).map(|len| out.extend_from_slice(&plain[..len]));
                zeroize_bytes(&mut plain);
                result?;
            }
        }

        Ok(out.len() - start)
    }

    fn flush_pending(&mut self, out: &mut Vec<u8>) {
        let mut block = Block::from(self.pending);

        match &self.engine {
            Engine::Encrypt(cipher) => {
                for (byte, prev) in block.iter_mut().zip(self.chain.iter()) {
                    *byte ^= prev;
                }
                cipher.encrypt_block(&mut block);
                self.chain.copy_from_slice(block.as_slice());
            }
            Engine::Decrypt(cipher) => {
                cipher.decrypt_block(&mut block);
                for (byte, prev) in block.iter_mut().zip(self.chain.iter()) {
                    *byte ^= prev;
                }
                self.chain = self.pending;
            }
        }

        out.extend_from_slice(block.as_slice());
        zeroize_bytes(block.as_mut_slice());
        zeroize_bytes(&mut self.pending);
        self.pending_len = 0;
    }
}

/// Returns the plaintext length of the final block or `BadPadding`.
fn strip_padding(block: &[u8]) -> Result<usize, CryptoError> {
    let pad = block[BLOCK_LEN - 1] as usize;
    if !(1..=BLOCK_LEN).contains(&pad) {
        return Err(CryptoError::BadPadding);
    }
    if !ct_fill_eq(&block[BLOCK_LEN - pad..], pad as u8) {
        return Err(CryptoError::BadPadding);
    }
    Ok(BLOCK_LEN - pad)
}

impl Drop for CbcStream {
    fn drop(&mut self) {
        zeroize_bytes(&mut self.pending);
        zeroize_bytes(&mut self.chain);
    }
}

impl fmt::Debug for CbcStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbcStream")
            .field("direction", &self.direction())
            .field("pending_len", &self.pending_len)
            .finish_non_exhaustive()
    }
}
