use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crpt_core::crypto::{derive_key, CbcStream, Direction};
use crpt_core::resolve_unique_path;
use tracing::debug;

use crate::container::{ContainerHeader, FormatError};
use crate::observer::{Observer, RenameNotice};
use crate::reader::read_header;
use crate::stream::pump;
use crate::validate::validate_stored_extension;

/// Decrypts a whole container from `reader` into `writer`.
///
/// `container_len` is the total size of the container including its header;
/// it drives progress and the empty-payload check.
pub fn decrypt_stream<R, W, O>(
    reader: &mut R,
    writer: &mut W,
    passphrase: &str,
    container_len: u64,
    observer: &mut O,
) -> Result<ContainerHeader, FormatError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    O: Observer + ?Sized,
{
    let key = derive_key(passphrase);
    let (header, header_len) = read_header(reader)?;
    let ciphertext_len = ciphertext_len(container_len, header_len)?;

    decrypt_payload(reader, writer, key.as_slice(), &header, ciphertext_len, observer)?;
    Ok(header)
}

/// Decrypts the container at `source` to `dest_base` plus the extension
/// stored in the header, and returns the path actually written.
///
/// When that path already exists a numbered sibling is used instead and
/// [`Observer::renamed`] is told about it.
pub fn decrypt_file<O: Observer + ?Sized>(
    source: &Path,
    dest_base: &Path,
    passphrase: &str,
    observer: &mut O,
) -> Result<PathBuf, FormatError> {
    let key = derive_key(passphrase);

    let mut input = File::open(source)?;
    let container_len = input.metadata()?.len();
    let (header, header_len) = read_header(&mut input)?;
    validate_stored_extension(&header.extension)?;

    let requested = with_extension_appended(dest_base, &header.extension);
    let output_path = resolve_unique_path(&requested)?;
    if output_path != requested {
        let notice = RenameNotice {
            requested,
            resolved: output_path.clone(),
        };
        debug!(%notice, "decrypt output renamed");
        observer.renamed(&notice);
    }

    let ciphertext_len = ciphertext_len(container_len, header_len)?;

    let mut output = File::create(&output_path)?;
    observer.output_opened(&output_path);
    debug!(
        source = %source.display(),
        dest = %output_path.display(),
        ciphertext_len,
        "decrypting file"
    );

    decrypt_payload(
        &mut input,
        &mut output,
        key.as_slice(),
        &header,
        ciphertext_len,
        observer,
    )?;

    Ok(output_path)
}

fn decrypt_payload<R, W, O>(
    reader: &mut R,
    writer: &mut W,
    key: &[u8],
    header: &ContainerHeader,
    ciphertext_len: u64,
    observer: &mut O,
) -> Result<u64, FormatError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    O: Observer + ?Sized,
{
    let cipher = CbcStream::new(key, &header.iv, Direction::Decrypt)?;
    let written = pump(reader, writer, cipher, ciphertext_len, observer).map_err(|err| {
        debug!(error = %err, "decryption aborted");
        err
    })?;
    debug!(ciphertext_len, plaintext_len = written, "decryption finished");
    Ok(written)
}

fn ciphertext_len(container_len: u64, header_len: u64) -> Result<u64, FormatError> {
    container_len
        .checked_sub(header_len)
        .ok_or(FormatError::NoCiphertextData)
}

/// `dir/name` + `.txt` -> `dir/name.txt`, without treating any dot already in
/// `base` as an extension.
fn with_extension_appended(base: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(extension);
    PathBuf::from(name)
}
