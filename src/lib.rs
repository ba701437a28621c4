//! A PROXY protocol header parser and builder written in Rust.
//! Supports both the text (version 1) and binary (version 2) forms of the
//! protocol, including TLV extensions, the SSL composite TLV, CRC32c
//! verification, and NOOP alignment padding.
//!
//! The codec is pure in/out on byte buffers: the caller reads from the
//! socket, hands the bytes to [`parse_header`], and learns how many bytes
//! the header consumed. [`create_header`] takes a populated [`PpInfo`] and
//! returns a freshly allocated buffer.
//!
//! See <https://haproxy.org/download/1.8/doc/proxy-protocol.txt>

mod crc32c;
mod error;
mod model;
mod tlv;
mod v1;
mod v2;

pub use error::Error;
pub use model::{
    AddrBuf, AddressFamily, Command, PpInfo, SslInfo, TransportProtocol, Version,
};
pub use tlv::{Tlv, Type};

use tracing::trace;

/// Parses a PROXY protocol header of either version from the start of
/// `buffer`.
///
/// Returns the populated [`PpInfo`] together with the number of bytes the
/// header consumed, or `None` when the buffer does not begin with either
/// protocol prefix — the connection then carries no header and the caller
/// may proceed with the buffer as-is.
pub fn parse_header(buffer: &[u8]) -> Result<Option<(PpInfo, usize)>, Error> {
    if buffer.len() >= v2::MINIMUM_LENGTH && buffer.starts_with(v2::PROTOCOL_PREFIX) {
        v2::parse(buffer).map(Some)
    } else if buffer.len() >= v1::MINIMUM_LENGTH
        && buffer.starts_with(v1::PROTOCOL_PREFIX.as_bytes())
    {
        v1::parse(buffer).map(Some)
    } else {
        trace!("buffer does not begin with a PROXY protocol prefix");
        Ok(None)
    }
}

/// Serializes `info` as a header of the given version.
/// The returned buffer is owned by the caller.
pub fn create_header(version: Version, info: &PpInfo) -> Result<Vec<u8>, Error> {
    match version {
        Version::One => v1::create(info),
        Version::Two => v2::create(info),
    }
}

/// A 16 byte v2 LOCAL header carrying no addresses, as sent in front of
/// health-check connections.
pub fn create_healthcheck_header() -> Result<Vec<u8>, Error> {
    let mut info = PpInfo::default();
    info.local = true;

    v2::create(&info)
}
