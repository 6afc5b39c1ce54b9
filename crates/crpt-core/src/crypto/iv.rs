use rand_core::{OsRng, RngCore};

pub const IV_LEN: usize = 16;

/// Fresh CBC initialization vector from the operating system RNG.
///
/// Every encryption must call this; an IV is never reused.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}
