//! Version 1 of the HAProxy PROXY protocol (text form).
//!
//! See <https://haproxy.org/download/1.8/doc/proxy-protocol.txt>

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::from_utf8;

use tracing::debug;

use crate::error::Error;
use crate::model::{AddrBuf, AddressFamily, PpInfo, TransportProtocol};

pub(crate) const PROTOCOL_PREFIX: &str = "PROXY";
pub(crate) const MINIMUM_LENGTH: usize = 8;
const PROTOCOL_SUFFIX: &str = "\r\n";
const TCP4: &str = "TCP4";
const TCP6: &str = "TCP6";
const UNKNOWN: &str = "UNKNOWN";

/// A v1 line never exceeds 107 bytes; scan one more so a suffix landing on
/// the boundary is still found.
const MAX_LENGTH: usize = 108;

/// The length of `"PROXY UNKNOWN\r\n"`.
const UNKNOWN_SHORT_FORM_LENGTH: usize = 15;

/// Parses a text header from the start of `buffer`.
/// Returns the populated record and the number of bytes consumed, CRLF
/// included.
pub(crate) fn parse(buffer: &[u8]) -> Result<(PpInfo, usize), Error> {
    let window = &buffer[..buffer.len().min(MAX_LENGTH)];
    let end = window
        .windows(PROTOCOL_SUFFIX.len())
        .position(|suffix| suffix == PROTOCOL_SUFFIX.as_bytes())
        .ok_or(Error::V1CrLf)?;
    let consumed = end + PROTOCOL_SUFFIX.len();
    let line = &window[..end];

    let mut info = PpInfo::default();

    if !line.starts_with(PROTOCOL_PREFIX.as_bytes()) {
        return Err(Error::V1Proxy);
    }
    let rest = skip_space(&line[PROTOCOL_PREFIX.len()..])?;

    let inet6 = match rest.iter().position(|&byte| byte == b' ') {
        None => {
            // Unknown connection (short form); anything else without an
            // address block is malformed.
            if consumed == UNKNOWN_SHORT_FORM_LENGTH || rest.starts_with(UNKNOWN.as_bytes()) {
                return Ok((info, consumed));
            }
            return Err(Error::V1TransportFamily);
        }
        // The receiver must ignore anything between UNKNOWN and the CRLF.
        Some(_) if rest.starts_with(UNKNOWN.as_bytes()) => return Ok((info, consumed)),
        Some(_) if rest.starts_with(TCP4.as_bytes()) => false,
        Some(_) if rest.starts_with(TCP6.as_bytes()) => true,
        Some(_) => return Err(Error::V1TransportFamily),
    };

    info.address_family = if inet6 {
        AddressFamily::IPv6
    } else {
        AddressFamily::IPv4
    };
    info.transport_protocol = TransportProtocol::Stream;

    let rest = skip_space(&rest[TCP4.len()..])?;

    let source_error = if inet6 {
        Error::V1Ipv6SourceAddress
    } else {
        Error::V1Ipv4SourceAddress
    };
    let (token, rest) = split_at_space(rest).ok_or(source_error)?;
    info.src_addr = parse_address(token, inet6, source_error)?;

    let destination_error = if inet6 {
        Error::V1Ipv6DestinationAddress
    } else {
        Error::V1Ipv4DestinationAddress
    };
    let (token, rest) = split_at_space(rest).ok_or(destination_error)?;
    info.dst_addr = parse_address(token, inet6, destination_error)?;

    let (token, rest) = split_at_space(rest).ok_or(Error::V1SourcePort)?;
    info.src_port = parse_port(token, Error::V1SourcePort)?;

    // The destination port runs to the end of the line; a stray carriage
    // return inside the line means the suffix came too early.
    let (token, stray_cr) = match rest.iter().position(|&byte| byte == b'\r') {
        Some(at) => (&rest[..at], true),
        None => (rest, false),
    };
    info.dst_port = parse_port(token, Error::V1DestinationPort)?;
    if stray_cr {
        return Err(Error::V1CrLf);
    }

    debug!(
        consumed,
        family = ?info.address_family,
        "parsed v1 header"
    );

    Ok((info, consumed))
}

/// Serializes `info` as a text header.
/// Only TCP (or unspecified) transport over INET families can be expressed.
pub(crate) fn create(info: &PpInfo) -> Result<Vec<u8>, Error> {
    if info.transport_protocol != TransportProtocol::Unspecified
        && info.transport_protocol != TransportProtocol::Stream
    {
        return Err(Error::V1TransportFamily);
    }

    match info.address_family {
        AddressFamily::Unspecified => Ok(b"PROXY UNKNOWN\r\n".to_vec()),
        AddressFamily::IPv4 => {
            let src = address_text(&info.src_addr, false, Error::V1Ipv4SourceAddress)?;
            let dst = address_text(&info.dst_addr, false, Error::V1Ipv4DestinationAddress)?;
            Ok(format!(
                "PROXY {} {} {} {} {}\r\n",
                TCP4, src, dst, info.src_port, info.dst_port
            )
            .into_bytes())
        }
        AddressFamily::IPv6 => {
            let src = address_text(&info.src_addr, true, Error::V1Ipv6SourceAddress)?;
            let dst = address_text(&info.dst_addr, true, Error::V1Ipv6DestinationAddress)?;
            Ok(format!(
                "PROXY {} {} {} {} {}\r\n",
                TCP6, src, dst, info.src_port, info.dst_port
            )
            .into_bytes())
        }
        AddressFamily::Unix => Err(Error::V1TransportFamily),
    }
}

/// Requires exactly one space and steps over it.
fn skip_space(rest: &[u8]) -> Result<&[u8], Error> {
    if rest.first() != Some(&b' ') {
        return Err(Error::V1Space);
    }
    Ok(&rest[1..])
}

fn split_at_space(rest: &[u8]) -> Option<(&[u8], &[u8])> {
    let at = rest.iter().position(|&byte| byte == b' ')?;
    Some((&rest[..at], &rest[at + 1..]))
}

fn valid_address(text: &str, inet6: bool) -> bool {
    if inet6 {
        text.parse::<Ipv6Addr>().is_ok()
    } else {
        text.parse::<Ipv4Addr>().is_ok()
    }
}

/// Validates an address token and keeps its textual form as given.
fn parse_address(token: &[u8], inet6: bool, error: Error) -> Result<AddrBuf, Error> {
    let text = from_utf8(token).map_err(|_| error)?;
    if !valid_address(text, inet6) {
        return Err(error);
    }
    Ok(AddrBuf::from(text))
}

fn address_text<'a>(address: &'a AddrBuf, inet6: bool, error: Error) -> Result<&'a str, Error> {
    let text = address.as_str().ok_or(error)?;
    if !valid_address(text, inet6) {
        return Err(error);
    }
    Ok(text)
}

/// Ports are decimal in the range (0, 65535]; leading zeroes are tolerated.
fn parse_port(token: &[u8], error: Error) -> Result<u16, Error> {
    let port = from_utf8(token)
        .ok()
        .and_then(|text| text.parse::<u32>().ok())
        .ok_or(error)?;
    if port == 0 || port > u32::from(u16::MAX) {
        return Err(error);
    }
    Ok(port as u16)
}
