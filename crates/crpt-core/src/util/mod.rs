mod ct;
mod wipe;

pub use self::ct::ct_fill_eq;
pub use self::wipe::zeroize_bytes;
