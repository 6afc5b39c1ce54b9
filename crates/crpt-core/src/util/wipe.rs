#[cfg(feature = "zeroize")]
use zeroize::Zeroize;

/// Wipes a buffer that held key bytes or plaintext.
///
/// Without the `zeroize` feature this is a plain overwrite the optimizer is
/// free to drop, so the crypto module refuses to build without it.
#[cfg(feature = "zeroize")]
pub fn zeroize_bytes(buf: &mut [u8]) {
    buf.zeroize();
}

#[cfg(not(feature = "zeroize"))]
pub fn zeroize_bytes(buf: &mut [u8]) {
    buf.fill(0);
}
