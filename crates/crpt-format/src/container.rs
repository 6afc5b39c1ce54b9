use std::io;

use crpt_core::crypto::{CryptoError, IV_LEN};
use crpt_core::CrptError;
use thiserror::Error;

use crate::validate::validate_extension_len;

/// File name extension given to containers, without the dot.
pub const CONTAINER_EXTENSION: &str = "crpt";

/// Width of the little-endian extension length field.
pub const LENGTH_FIELD_LEN: usize = 4;
pub const MAX_EXTENSION_LEN: usize = 256;
pub const MAX_HEADER_LEN: usize = LENGTH_FIELD_LEN + MAX_EXTENSION_LEN + IV_LEN;

/// Header preceding the ciphertext: the source file's extension (with its
/// leading dot, possibly empty) and the CBC IV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub extension: String,
    pub iv: [u8; IV_LEN],
}

impl ContainerHeader {
    pub fn new(extension: impl Into<String>, iv: [u8; IV_LEN]) -> Result<Self, FormatError> {
        let extension = extension.into();
        validate_extension_len(extension.len() as i64)?;
        Ok(Self { extension, iv })
    }

    /// Number of bytes the header occupies on disk.
    pub fn encoded_len(&self) -> u64 {
        (LENGTH_FIELD_LEN + self.extension.len() + IV_LEN) as u64
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Core(#[from] CrptError),
    #[error("crypto error: {0}")]
    Crypto(CryptoError),
    #[error("invalid container header: {0}")]
    MalformedHeader(&'static str),
    #[error("invalid extension length in container header: {0}")]
    ExtensionLengthOutOfRange(i64),
    #[error("incomplete extension data in container header: expected {expected} bytes, found {found}")]
    TruncatedHeader { expected: usize, found: usize },
    #[error("invalid stored extension: {0:?}")]
    InvalidExtension(String),
    #[error("no encrypted data found")]
    NoCiphertextData,
    #[error("error decrypting the file (bad key?)")]
    DecryptionFailed,
    #[error("operation cancelled")]
    Cancelled,
}

impl From<CryptoError> for FormatError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::BadPadding | CryptoError::IncompleteBlock { .. } => {
                FormatError::DecryptionFailed
            }
            other => FormatError::Crypto(other),
        }
    }
}

pub fn encode_header(header: &ContainerHeader) -> Result<Vec<u8>, FormatError> {
    let ext_len = validate_extension_len(header.extension.len() as i64)?;

    let mut buf = Vec::with_capacity(header.encoded_len() as usize);
    buf.extend_from_slice(&(ext_len as u32).to_le_bytes());
    buf.extend_from_slice(header.extension.as_bytes());
    buf.extend_from_slice(&header.iv);
    Ok(buf)
}

/// Parses a header from the front of `buf`, returning it with the number of
/// bytes it spans. Trailing bytes (the ciphertext) are ignored.
pub fn parse_header(buf: &[u8]) -> Result<(ContainerHeader, usize), FormatError> {
    if buf.len() < LENGTH_FIELD_LEN {
        return Err(FormatError::MalformedHeader("missing extension length"));
    }

    let declared = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let ext_len = validate_extension_len(declared as i64)?;

    let ext_end = LENGTH_FIELD_LEN + ext_len;
    if buf.len() < ext_end {
        return Err(FormatError::TruncatedHeader {
            expected: ext_len,
            found: buf.len() - LENGTH_FIELD_LEN,
        });
    }
    let extension = decode_extension(buf[LENGTH_FIELD_LEN..ext_end].to_vec())?;

    let iv_end = ext_end + IV_LEN;
    if buf.len() < iv_end {
        return Err(FormatError::MalformedHeader("missing IV"));
    }
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&buf[ext_end..iv_end]);

    Ok((ContainerHeader { extension, iv }, iv_end))
}

pub(crate) fn decode_extension(bytes: Vec<u8>) -> Result<String, FormatError> {
    String::from_utf8(bytes).map_err(|err| {
        FormatError::InvalidExtension(String::from_utf8_lossy(err.as_bytes()).into_owned())
    })
}
