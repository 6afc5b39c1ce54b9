use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crpt_core::crypto::{derive_key, generate_iv, CbcStream, Direction};
use tracing::debug;

use crate::container::{ContainerHeader, FormatError};
use crate::observer::Observer;
use crate::stream::pump;
use crate::validate::validate_extension_len;
use crate::writer::write_header;

/// Extension of `path` with its leading dot, or an empty string when it has
/// none. `archive.tar.gz` yields `.gz`; `.bashrc` and `notes.` yield nothing.
pub fn source_extension(path: &Path) -> Result<String, FormatError> {
    match path.extension() {
        None => Ok(String::new()),
        Some(ext) if ext.is_empty() => Ok(String::new()),
        Some(ext) => ext
            .to_str()
            .map(|ext| format!(".{ext}"))
            .ok_or_else(|| FormatError::InvalidExtension(ext.to_string_lossy().into_owned())),
    }
}

/// Encrypts everything `reader` yields into `writer` as a container that
/// records `extension`. `total_len` is only used for progress.
pub fn encrypt_stream<R, W, O>(
    reader: &mut R,
    writer: &mut W,
    passphrase: &str,
    extension: &str,
    total_len: u64,
    observer: &mut O,
) -> Result<ContainerHeader, FormatError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    O: Observer + ?Sized,
{
    let key = derive_key(passphrase);
    let header = ContainerHeader::new(extension, generate_iv())?;
    let cipher = CbcStream::new(key.as_slice(), &header.iv, Direction::Encrypt)?;

    write_header(writer, &header)?;
    let written = pump(reader, writer, cipher, total_len, observer)?;
    debug!(plaintext_len = total_len, ciphertext_len = written, "encryption finished");

    Ok(header)
}

/// Encrypts the file at `source` into a new container at `dest`, replacing
/// whatever is there. On error the partially written `dest` is left behind
/// for the caller to remove.
pub fn encrypt_file<O: Observer + ?Sized>(
    source: &Path,
    dest: &Path,
    passphrase: &str,
    observer: &mut O,
) -> Result<ContainerHeader, FormatError> {
    let extension = source_extension(source)?;
    validate_extension_len(extension.len() as i64)?;

    let mut input = File::open(source)?;
    let total_len = input.metadata()?.len();

    let mut output = File::create(dest)?;
    observer.output_opened(dest);
    debug!(
        source = %source.display(),
        dest = %dest.display(),
        total_len,
        "encrypting file"
    );

    encrypt_stream(
        &mut input,
        &mut output,
        passphrase,
        &extension,
        total_len,
        observer,
    )
}
