#![deny(warnings)]
#![deny(clippy::all)]

pub mod container;
pub mod decrypt;
pub mod encrypt;
pub mod observer;
pub mod reader;
pub mod stream;
pub mod validate;
pub mod writer;

pub use container::{
    encode_header, parse_header, ContainerHeader, FormatError, CONTAINER_EXTENSION,
    LENGTH_FIELD_LEN, MAX_EXTENSION_LEN, MAX_HEADER_LEN,
};
pub use decrypt::{decrypt_file, decrypt_stream};
pub use encrypt::{encrypt_file, encrypt_stream, source_extension};
pub use observer::{Observer, RenameNotice, Silent};
pub use reader::read_header;
pub use stream::CHUNK_SIZE;
pub use writer::write_header;
