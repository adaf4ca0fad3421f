//! Length-prefixed TCP lookup protocol (spec §4.E/§4.F): request is a
//! 1-byte IP length (0 = farewell, 4 = IPv4, 16 = IPv6) followed by the
//! packed address; reply is a 1-byte name length (0 = unknown) followed by
//! the UTF-8 name.

pub mod client;
pub mod server;

use thiserror::Error;

/// Reply names longer than this are truncated rather than rejected — see
/// `lookup_server`'s policy note in the crate's expanded spec.
pub const MAX_REPLY_NAME_LEN: usize = 255;

const FAREWELL_LEN: u8 = 0;
const IPV4_LEN: u8 = 4;
const IPV6_LEN: u8 = 16;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("unsupported IP length {0} (expected 4 or 16)")]
    BadAddressLength(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
