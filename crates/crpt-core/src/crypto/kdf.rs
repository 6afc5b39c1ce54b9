use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

pub const KEY_LEN: usize = 32;

/// Turns a passphrase into an AES-256 key with a single SHA-256 over its
/// UTF-8 bytes.
///
/// There is no salt and no work factor: the same passphrase always yields
/// the same key, which is what existing `.crpt` files depend on.
pub fn derive_key(passphrase: &str) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    let digest = Sha256::digest(passphrase.as_bytes());
    key.copy_from_slice(digest.as_slice());
    key
}
