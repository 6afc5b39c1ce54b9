use std::io::Read;

use crpt_core::crypto::IV_LEN;
use crpt_core::io_ext::read_full;
use tracing::debug;

use crate::container::{decode_extension, ContainerHeader, FormatError, LENGTH_FIELD_LEN};
use crate::validate::validate_extension_len;

/// Reads the container header from the current position of `reader` and
/// returns it together with the number of bytes consumed, leaving `reader`
/// at the first ciphertext byte.
pub fn read_header<R: Read + ?Sized>(
    reader: &mut R,
) -> Result<(ContainerHeader, u64), FormatError> {
    let mut length_field = [0u8; LENGTH_FIELD_LEN];
    if read_full(reader, &mut length_field)? < LENGTH_FIELD_LEN {
        return Err(FormatError::MalformedHeader("missing extension length"));
    }

    let declared = i32::from_le_bytes(length_field);
    let ext_len = validate_extension_len(declared as i64)?;

    let mut ext_bytes = vec![0u8; ext_len];
    let found = read_full(reader, &mut ext_bytes)?;
    if found < ext_len {
        return Err(FormatError::TruncatedHeader {
            expected: ext_len,
            found,
        });
    }
    let extension = decode_extension(ext_bytes)?;

    let mut iv = [0u8; IV_LEN];
    if read_full(reader, &mut iv)? < IV_LEN {
        return Err(FormatError::MalformedHeader("missing IV"));
    }

    let header = ContainerHeader { extension, iv };
    let consumed = header.encoded_len();
    debug!(extension = %header.extension, header_len = consumed, "read container header");

    Ok((header, consumed))
}
