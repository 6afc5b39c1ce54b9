use std::io::Write;

use tracing::debug;

use crate::container::{encode_header, ContainerHeader, FormatError};

/// Writes `header` ahead of any ciphertext and returns its length in bytes.
pub fn write_header<W: Write + ?Sized>(
    writer: &mut W,
    header: &ContainerHeader,
) -> Result<u64, FormatError> {
    let bytes = encode_header(header)?;
    writer.write_all(&bytes)?;
    debug!(extension = %header.extension, header_len = bytes.len(), "wrote container header");
    Ok(bytes.len() as u64)
}
