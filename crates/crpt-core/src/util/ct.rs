/// Returns true when every byte of `buf` equals `value`.
///
/// Used for PKCS#7 padding checks, where the whole tail must be inspected
/// regardless of where the first bad byte sits.
pub fn ct_fill_eq(buf: &[u8], value: u8) -> bool {
    let diff = buf.iter().fold(0u8, |acc, byte| acc | (byte ^ value));
    diff == 0
}
