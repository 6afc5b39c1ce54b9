use std::io::{self, Read};

/// Reads until `buf` is full or the reader hits EOF, returning the number of
/// bytes placed in `buf`.
///
/// Unlike `read_exact`, a short read is not an error: callers decide whether
/// a partial fill means a truncated header or simply the last chunk.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(read) => total += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}
