#![deny(warnings)]
#![deny(clippy::all)]

/// Deterministic, non-repeating-per-block filler.
pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn flip_byte(buf: &mut [u8], index: usize) {
    if buf.is_empty() {
        return;
    }

    let idx = index % buf.len();
    buf[idx] ^= 0xFF;
}

/// Raw container header bytes: little-endian length, extension, IV.
pub fn header_bytes(extension: &[u8], iv: &[u8; 16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + extension.len() + iv.len());
    bytes.extend_from_slice(&(extension.len() as u32).to_le_bytes());
    bytes.extend_from_slice(extension);
    bytes.extend_from_slice(iv);
    bytes
}

/// A header whose length field claims `declared` but is followed by nothing.
pub fn header_declaring(declared: i32) -> Vec<u8> {
    declared.to_le_bytes().to_vec()
}
