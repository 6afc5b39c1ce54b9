#![deny(warnings)]
#![deny(clippy::all)]

pub mod crypto;
pub mod error;
pub mod io_ext;
pub mod path;
pub mod util;

pub use error::CrptError;
pub use path::resolve_unique_path;
pub use util::zeroize_bytes;
