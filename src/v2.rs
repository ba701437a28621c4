//! Version 2 of the HAProxy PROXY protocol (binary form).
//!
//! See <https://haproxy.org/download/1.8/doc/proxy-protocol.txt>

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use tracing::{debug, trace};

use crate::crc32c;
use crate::error::Error;
use crate::model::{AddrBuf, AddressFamily, Command, PpInfo, SslInfo, TransportProtocol};
use crate::tlv::{self, Tlv, Type};

pub(crate) const PROTOCOL_PREFIX: &[u8] = b"\r\n\r\n\0\r\nQUIT\n";
pub(crate) const MINIMUM_LENGTH: usize = 16;

const VERSION_COMMAND: usize = 12;
const ADDRESS_FAMILY_PROTOCOL: usize = 13;
const LENGTH: usize = 14;
const LEFT_MASK: u8 = 0xF0;
const RIGHT_MASK: u8 = 0x0F;

const IPV4_ADDRESSES_BYTES: usize = 12;
const IPV6_ADDRESSES_BYTES: usize = 36;
const UNIX_ADDRESSES_BYTES: usize = 216;

/// Unix socket paths occupy a fixed 108 bytes each on the wire.
const UNIX_PATH_BYTES: usize = 108;

const CRC32C_VALUE_BYTES: usize = 4;
const SSL_CLIENT_VERIFY_BYTES: usize = 5;
const UNIQUE_ID_MAX_BYTES: usize = 128;

/// Parses a binary header from the start of `buffer`.
/// The caller has already matched the signature and checked for the
/// 16 byte fixed portion.
pub(crate) fn parse(buffer: &[u8]) -> Result<(PpInfo, usize), Error> {
    let mut info = PpInfo::default();

    if buffer[VERSION_COMMAND] & LEFT_MASK != 0x20 {
        return Err(Error::V2Version);
    }
    let command = match buffer[VERSION_COMMAND] & RIGHT_MASK {
        0x00 => Command::Local,
        0x01 => Command::Proxy,
        _ => return Err(Error::V2Command),
    };
    info.local = command == Command::Local;

    info.address_family = match (buffer[ADDRESS_FAMILY_PROTOCOL] & LEFT_MASK) >> 4 {
        0 => AddressFamily::Unspecified,
        1 => AddressFamily::IPv4,
        2 => AddressFamily::IPv6,
        3 => AddressFamily::Unix,
        _ => return Err(Error::V2AddressFamily),
    };
    info.transport_protocol = match buffer[ADDRESS_FAMILY_PROTOCOL] & RIGHT_MASK {
        0 => TransportProtocol::Unspecified,
        1 => TransportProtocol::Stream,
        2 => TransportProtocol::Datagram,
        _ => return Err(Error::V2TransportProtocol),
    };

    let length = u16::from_be_bytes([buffer[LENGTH], buffer[LENGTH + 1]]) as usize;
    let full_length = MINIMUM_LENGTH + length;
    if buffer.len() < full_length {
        return Err(Error::V2Length);
    }
    let header = &buffer[..full_length];
    let addresses = &header[MINIMUM_LENGTH..];

    debug!(
        family = ?info.address_family,
        protocol = ?info.transport_protocol,
        length,
        "parsing v2 header"
    );

    let tlv_bytes = match info.address_family {
        AddressFamily::Unspecified => addresses,
        AddressFamily::IPv4 => {
            if length < IPV4_ADDRESSES_BYTES {
                return Err(Error::V2Length);
            }
            let src = Ipv4Addr::new(addresses[0], addresses[1], addresses[2], addresses[3]);
            let dst = Ipv4Addr::new(addresses[4], addresses[5], addresses[6], addresses[7]);
            info.src_addr.set_text(&src.to_string());
            info.dst_addr.set_text(&dst.to_string());
            info.src_port = u16::from_be_bytes([addresses[8], addresses[9]]);
            info.dst_port = u16::from_be_bytes([addresses[10], addresses[11]]);
            &addresses[IPV4_ADDRESSES_BYTES..]
        }
        AddressFamily::IPv6 => {
            if length < IPV6_ADDRESSES_BYTES {
                return Err(Error::V2Length);
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&addresses[..16]);
            let src = Ipv6Addr::from(octets);
            octets.copy_from_slice(&addresses[16..32]);
            let dst = Ipv6Addr::from(octets);
            info.src_addr.set_text(&src.to_string());
            info.dst_addr.set_text(&dst.to_string());
            info.src_port = u16::from_be_bytes([addresses[32], addresses[33]]);
            info.dst_port = u16::from_be_bytes([addresses[34], addresses[35]]);
            &addresses[IPV6_ADDRESSES_BYTES..]
        }
        AddressFamily::Unix => {
            if length < UNIX_ADDRESSES_BYTES {
                return Err(Error::V2Length);
            }
            info.src_addr.set_raw(&addresses[..UNIX_PATH_BYTES]);
            info.dst_addr
                .set_raw(&addresses[UNIX_PATH_BYTES..2 * UNIX_PATH_BYTES]);
            // Anything following the address block is not walked.
            &[]
        }
    };

    parse_tlvs(header, tlv_bytes, &mut info)?;

    Ok((info, full_length))
}

fn parse_tlvs(header: &[u8], mut tlv_bytes: &[u8], info: &mut PpInfo) -> Result<(), Error> {
    // Any TLV vector must be at least 3 bytes; shorter trailers are ignored.
    while tlv_bytes.len() > tlv::HEADER_BYTES {
        let value_type = tlv_bytes[0];
        let value_length = u16::from_be_bytes([tlv_bytes[1], tlv_bytes[2]]) as usize;
        let stored = tlv::HEADER_BYTES + value_length;
        if stored > tlv_bytes.len() {
            return Err(Error::V2TlvLength);
        }
        let value = &tlv_bytes[tlv::HEADER_BYTES..stored];

        match Type::from_byte(value_type) {
            Some(Type::ALPN) | Some(Type::Authority) => {
                info.push_tlv(Tlv::new(value_type, value.to_vec())?);
            }
            Some(Type::CRC32C) => {
                if value_length != CRC32C_VALUE_BYTES {
                    return Err(Error::V2Crc32c);
                }
                // The header must hash to the received value with the
                // checksum bytes themselves read as zero.
                let at = header.len() - tlv_bytes.len() + tlv::HEADER_BYTES;
                let calculated = crc32c::checksum_masked(header, at..at + CRC32C_VALUE_BYTES);
                if value != calculated.to_be_bytes().as_slice() {
                    return Err(Error::V2Crc32c);
                }
                info.push_tlv(Tlv::new(value_type, value.to_vec())?);
                info.crc32c = true;
            }
            Some(Type::NoOp) => {}
            Some(Type::UniqueId) => {
                if value_length > UNIQUE_ID_MAX_BYTES {
                    return Err(Error::V2UniqueId);
                }
                info.push_tlv(Tlv::new(value_type, value.to_vec())?);
            }
            Some(Type::SSL) => parse_ssl(value, info)?,
            Some(Type::NetworkNamespace) => {
                info.push_tlv(Tlv::new(value_type, value.to_vec())?);
            }
            Some(Type::Aws) => {
                if value.is_empty() {
                    return Err(Error::V2Aws);
                }
                if value[0] == tlv::AWS_SUBTYPE_VPCE_ID {
                    info.push_tlv(Tlv::new(value_type, value.to_vec())?);
                }
            }
            Some(Type::Azure) => {
                if value.len() < 5 {
                    return Err(Error::V2Azure);
                }
                if value[0] == tlv::AZURE_SUBTYPE_PRIVATE_ENDPOINT_LINKID {
                    info.push_tlv(Tlv::new(value_type, value.to_vec())?);
                }
            }
            // SSL sub-types at the top level are just unrecognized numbers.
            Some(_) | None => trace!(value_type, "skipping unrecognized TLV"),
        }

        tlv_bytes = &tlv_bytes[stored..];
    }

    Ok(())
}

/// Unpacks the SSL composite: a client bit field, an opaque verify word,
/// and a run of sub-TLVs appended to `info` as siblings.
fn parse_ssl(payload: &[u8], info: &mut PpInfo) -> Result<(), Error> {
    if payload.len() < SSL_CLIENT_VERIFY_BYTES {
        return Err(Error::V2Ssl);
    }
    let client = payload[0];
    let verify = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
    info.ssl_info = SslInfo::from_wire(client, verify);

    let sub_tlvs = &payload[SSL_CLIENT_VERIFY_BYTES..];
    let mut offset = 0;
    let mut version_found = false;
    while offset < sub_tlvs.len() {
        if offset + tlv::HEADER_BYTES > sub_tlvs.len() {
            return Err(Error::V2Ssl);
        }
        let value_type = sub_tlvs[offset];
        let value_length =
            u16::from_be_bytes([sub_tlvs[offset + 1], sub_tlvs[offset + 2]]) as usize;
        let end = offset + tlv::HEADER_BYTES + value_length;
        if end > sub_tlvs.len() {
            return Err(Error::V2Ssl);
        }
        let value = &sub_tlvs[offset + tlv::HEADER_BYTES..end];

        match Type::from_byte(value_type) {
            Some(Type::SSLVersion) => {
                version_found = true;
                info.push_tlv(Tlv::new(value_type, value.to_vec())?);
            }
            Some(Type::SSLCommonName)
            | Some(Type::SSLCipher)
            | Some(Type::SSLSignatureAlgorithm)
            | Some(Type::SSLKeyAlgorithm) => {
                info.push_tlv(Tlv::new(value_type, value.to_vec())?);
            }
            _ => return Err(Error::V2Ssl),
        }

        offset = end;
    }

    if info.ssl_info.ssl && !version_found {
        return Err(Error::V2Ssl);
    }

    Ok(())
}

/// Serializes `info` as a binary header.
pub(crate) fn create(info: &PpInfo) -> Result<Vec<u8>, Error> {
    let command = if info.address_family == AddressFamily::Unspecified {
        if !info.local {
            return Err(Error::V2Command);
        }
        Command::Local
    } else {
        Command::Proxy
    };

    let addresses = address_block(info)?;

    let mut payload = addresses.len()
        + info.tlvs().map(Tlv::wire_bytes).sum::<usize>()
        + if info.crc32c {
            tlv::HEADER_BYTES + CRC32C_VALUE_BYTES
        } else {
            0
        };

    let mut padding = None;
    if info.alignment_power > 1 {
        let alignment = 1usize
            .checked_shl(u32::from(info.alignment_power))
            .ok_or(Error::V2Length)?;
        let total = MINIMUM_LENGTH + payload;
        if total % alignment != 0 {
            let mut padded = (total / alignment + 1) * alignment;
            // The padding TLV cannot be smaller than its own header.
            if padded - total < tlv::HEADER_BYTES {
                padded += alignment;
            }
            padding = Some(padded - total - tlv::HEADER_BYTES);
            payload = padded - MINIMUM_LENGTH;
        }
    }

    if payload > u16::MAX as usize {
        return Err(Error::V2Length);
    }

    let mut header = Vec::with_capacity(MINIMUM_LENGTH + payload);
    header.extend_from_slice(PROTOCOL_PREFIX);
    header.push(0x20 | command as u8);
    header.push(((info.address_family as u8) << 4) | info.transport_protocol as u8);
    header.extend((payload as u16).to_be_bytes());
    header.extend_from_slice(&addresses);

    for tlv in info.tlvs() {
        tlv.write_to(&mut header);
    }

    if let Some(padding) = padding {
        trace!(padding, "padding header with a NOOP TLV");
        header.push(Type::NoOp.into());
        header.extend((padding as u16).to_be_bytes());
        header.resize(header.len() + padding, 0);
    }

    if info.crc32c {
        header.push(Type::CRC32C.into());
        header.extend((CRC32C_VALUE_BYTES as u16).to_be_bytes());
        header.extend_from_slice(&[0; CRC32C_VALUE_BYTES]);
        let at = header.len() - CRC32C_VALUE_BYTES;
        let checksum = crc32c::checksum(&header);
        header[at..].copy_from_slice(&checksum.to_be_bytes());
    }

    Ok(header)
}

fn address_block(info: &PpInfo) -> Result<Vec<u8>, Error> {
    let mut block = Vec::new();

    match info.address_family {
        AddressFamily::Unspecified => {}
        AddressFamily::IPv4 => {
            let src: Ipv4Addr = parse_text(&info.src_addr, Error::V2Ipv4SourceAddress)?;
            let dst: Ipv4Addr = parse_text(&info.dst_addr, Error::V2Ipv4DestinationAddress)?;
            block.extend(src.octets());
            block.extend(dst.octets());
            block.extend(info.src_port.to_be_bytes());
            block.extend(info.dst_port.to_be_bytes());
        }
        AddressFamily::IPv6 => {
            let src: Ipv6Addr = parse_text(&info.src_addr, Error::V2Ipv6SourceAddress)?;
            let dst: Ipv6Addr = parse_text(&info.dst_addr, Error::V2Ipv6DestinationAddress)?;
            block.extend(src.octets());
            block.extend(dst.octets());
            block.extend(info.src_port.to_be_bytes());
            block.extend(info.dst_port.to_be_bytes());
        }
        AddressFamily::Unix => {
            push_unix_path(&mut block, &info.src_addr);
            push_unix_path(&mut block, &info.dst_addr);
        }
    }

    Ok(block)
}

fn parse_text<T: FromStr>(address: &AddrBuf, error: Error) -> Result<T, Error> {
    address
        .as_str()
        .and_then(|text| text.parse().ok())
        .ok_or(error)
}

fn push_unix_path(block: &mut Vec<u8>, address: &AddrBuf) {
    let start = block.len();
    block.extend_from_slice(address.as_bytes());
    block.resize(start + UNIX_PATH_BYTES, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_input() -> Vec<u8> {
        let mut input = Vec::from(PROTOCOL_PREFIX);

        input.push(0x21);
        input.push(0x11);
        input.extend([0, 12]);
        input.extend([127, 0, 0, 1]);
        input.extend([127, 0, 0, 2]);
        input.extend([0, 80]);
        input.extend([1, 187]);

        input
    }

    #[test]
    fn parse_ipv4_without_tlvs() {
        let input = ipv4_input();

        let (info, consumed) = parse(&input).unwrap();

        assert_eq!(consumed, 28);
        assert!(!info.local);
        assert_eq!(info.address_family, AddressFamily::IPv4);
        assert_eq!(info.transport_protocol, TransportProtocol::Stream);
        assert_eq!(info.src_addr.as_str(), Some("127.0.0.1"));
        assert_eq!(info.dst_addr.as_str(), Some("127.0.0.2"));
        assert_eq!(info.src_port, 80);
        assert_eq!(info.dst_port, 443);
        assert_eq!(info.tlvs().count(), 0);
    }

    #[test]
    fn parse_local_unspecified() {
        let mut input = Vec::from(PROTOCOL_PREFIX);
        input.extend([0x20, 0x00, 0, 0]);

        let (info, consumed) = parse(&input).unwrap();

        assert_eq!(consumed, 16);
        assert!(info.local);
        assert_eq!(info.address_family, AddressFamily::Unspecified);
        assert_eq!(info.transport_protocol, TransportProtocol::Unspecified);
    }

    #[test]
    fn parse_ipv6() {
        let mut input = Vec::from(PROTOCOL_PREFIX);
        input.extend([0x21, 0x21, 0, 36]);
        input.extend([0; 15]);
        input.push(1);
        input.extend([0; 15]);
        input.push(2);
        input.extend([0, 80]);
        input.extend([1, 187]);

        let (info, consumed) = parse(&input).unwrap();

        assert_eq!(consumed, 52);
        assert_eq!(info.src_addr.as_str(), Some("::1"));
        assert_eq!(info.dst_addr.as_str(), Some("::2"));
        assert_eq!(info.src_port, 80);
        assert_eq!(info.dst_port, 443);
    }

    #[test]
    fn parse_unix() {
        let mut input = Vec::from(PROTOCOL_PREFIX);
        input.extend([0x21, 0x31, 0, 216]);
        let mut src_path = [0u8; 108];
        src_path[..9].copy_from_slice(b"/tmp/sock");
        input.extend(src_path);
        let mut dst_path = [0u8; 108];
        dst_path[..12].copy_from_slice(b"/run/backend");
        input.extend(dst_path);

        let (info, consumed) = parse(&input).unwrap();

        assert_eq!(consumed, 232);
        assert_eq!(info.address_family, AddressFamily::Unix);
        assert_eq!(info.src_addr.as_bytes(), b"/tmp/sock");
        assert_eq!(info.dst_addr.as_bytes(), b"/run/backend");
    }

    #[test]
    fn parse_unix_ignores_trailing_tlvs() {
        let mut input = Vec::from(PROTOCOL_PREFIX);
        input.extend([0x21, 0x31, 0, 220]);
        input.extend([0xFF; 108]);
        input.extend([0xAA; 108]);
        input.extend([0x01, 0, 1, 5]);

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.tlvs().count(), 0);
    }

    #[test]
    fn parse_wrong_version() {
        let mut input = ipv4_input();
        input[12] = 0x11;

        assert_eq!(parse(&input), Err(Error::V2Version));
    }

    #[test]
    fn parse_wrong_command() {
        let mut input = ipv4_input();
        input[12] = 0x23;

        assert_eq!(parse(&input), Err(Error::V2Command));
    }

    #[test]
    fn parse_wrong_address_family() {
        let mut input = ipv4_input();
        input[13] = 0x51;

        assert_eq!(parse(&input), Err(Error::V2AddressFamily));
    }

    #[test]
    fn parse_wrong_transport_protocol() {
        let mut input = ipv4_input();
        input[13] = 0x17;

        assert_eq!(parse(&input), Err(Error::V2TransportProtocol));
    }

    #[test]
    fn parse_length_beyond_buffer() {
        let mut input = ipv4_input();
        input[15] = 64;

        assert_eq!(parse(&input), Err(Error::V2Length));
    }

    #[test]
    fn parse_length_too_small_for_family() {
        let mut input = Vec::from(PROTOCOL_PREFIX);
        input.extend([0x21, 0x11, 0, 8]);
        input.extend([127, 0, 0, 1]);
        input.extend([127, 0, 0, 2]);

        assert_eq!(parse(&input), Err(Error::V2Length));
    }

    #[test]
    fn parse_tlv_overruns_header() {
        let mut input = ipv4_input();
        input[15] = 16;
        input.extend([0x01, 0, 9, 5]);

        assert_eq!(parse(&input), Err(Error::V2TlvLength));
    }

    #[test]
    fn parse_trailing_tlv_scraps_ignored() {
        let mut input = ipv4_input();
        input[15] = 15;
        input.extend([0x01, 0, 7]);

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.tlvs().count(), 0);
    }

    #[test]
    fn parse_alpn_and_authority() {
        let mut input = ipv4_input();
        input[15] = 12 + 5 + 10;
        input.extend([0x01, 0, 2]);
        input.extend_from_slice(b"h2");
        input.extend([0x02, 0, 7]);
        input.extend_from_slice(b"example");

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.alpn(), Some(&b"h2"[..]));
        assert_eq!(info.authority(), Some("example"));
        assert_eq!(info.tlvs().count(), 2);
    }

    #[test]
    fn parse_unknown_tlv_skipped() {
        let mut input = ipv4_input();
        input[15] = 12 + 5;
        input.extend([0x99, 0, 2, 1, 2]);

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.tlvs().count(), 0);
    }

    #[test]
    fn parse_unique_id() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 128;
        input.extend([0x05, 0, 128]);
        input.extend([0xAB; 128]);

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.unique_id(), Some(&[0xAB; 128][..]));
    }

    #[test]
    fn parse_unique_id_too_long() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 129;
        input.extend([0x05, 0, 129]);
        input.extend([0xAB; 129]);

        assert_eq!(parse(&input), Err(Error::V2UniqueId));
    }

    #[test]
    fn parse_crc32c() {
        let mut info = PpInfo::default();
        info.address_family = AddressFamily::IPv4;
        info.transport_protocol = TransportProtocol::Stream;
        info.src_addr.set_text("127.0.0.1");
        info.dst_addr.set_text("127.0.0.2");
        info.src_port = 80;
        info.dst_port = 443;
        info.crc32c = true;

        let header = create(&info).unwrap();
        let (parsed, consumed) = parse(&header).unwrap();

        assert_eq!(consumed, header.len());
        assert!(parsed.crc32c);
        assert!(parsed.crc32c_checksum().is_some());
    }

    #[test]
    fn parse_crc32c_corrupted() {
        let mut info = PpInfo::default();
        info.address_family = AddressFamily::IPv4;
        info.transport_protocol = TransportProtocol::Stream;
        info.src_addr.set_text("127.0.0.1");
        info.dst_addr.set_text("127.0.0.2");
        info.crc32c = true;

        let mut header = create(&info).unwrap();
        header[17] ^= 0x01;

        assert_eq!(parse(&header), Err(Error::V2Crc32c));
    }

    #[test]
    fn parse_crc32c_wrong_length() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 3;
        input.extend([0x03, 0, 3, 0, 0, 0]);

        assert_eq!(parse(&input), Err(Error::V2Crc32c));
    }

    #[test]
    fn parse_ssl() {
        let mut sub_tlvs = Vec::new();
        sub_tlvs.extend([0x21, 0, 7]);
        sub_tlvs.extend_from_slice(b"TLSv1.3");
        sub_tlvs.extend([0x23, 0, 22]);
        sub_tlvs.extend_from_slice(b"TLS_AES_128_GCM_SHA256");

        let mut input = ipv4_input();
        let value_length = 5 + sub_tlvs.len();
        input[15] = (12 + 3 + value_length) as u8;
        input.extend([0x20, 0, value_length as u8]);
        input.push(0x03);
        input.extend([0, 0, 0, 0]);
        input.extend(&sub_tlvs);

        let (info, _) = parse(&input).unwrap();

        assert!(info.ssl_info.ssl);
        assert!(info.ssl_info.cert_in_connection);
        assert!(!info.ssl_info.cert_in_session);
        assert!(info.ssl_info.cert_verified);
        assert_eq!(info.ssl_version(), Some("TLSv1.3"));
        assert_eq!(info.ssl_cipher(), Some("TLS_AES_128_GCM_SHA256"));
    }

    #[test]
    fn parse_ssl_truncated_payload() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 3;
        input.extend([0x20, 0, 3, 0x01, 0, 0]);

        assert_eq!(parse(&input), Err(Error::V2Ssl));
    }

    #[test]
    fn parse_ssl_unknown_sub_type() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 9;
        input.extend([0x20, 0, 9]);
        input.push(0x00);
        input.extend([0, 0, 0, 0]);
        input.extend([0x30, 0, 1, b'x']);

        assert_eq!(parse(&input), Err(Error::V2Ssl));
    }

    #[test]
    fn parse_ssl_sub_tlv_overruns_payload() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 9;
        input.extend([0x20, 0, 9]);
        input.push(0x00);
        input.extend([0, 0, 0, 0]);
        input.extend([0x22, 0, 9, b'x']);

        assert_eq!(parse(&input), Err(Error::V2Ssl));
    }

    #[test]
    fn parse_ssl_bit_without_version() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 5;
        input.extend([0x20, 0, 5]);
        input.push(0x01);
        input.extend([0, 0, 0, 0]);

        assert_eq!(parse(&input), Err(Error::V2Ssl));
    }

    #[test]
    fn parse_netns() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 7;
        input.extend([0x30, 0, 7]);
        input.extend_from_slice(b"ns-blue");

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.netns(), Some("ns-blue"));
    }

    #[test]
    fn parse_aws() {
        let vpce_id = b"vpce-08d2bf15fac5001c9";
        let mut input = ipv4_input();
        input[15] = (12 + 3 + 1 + vpce_id.len()) as u8;
        input.extend([0xEA, 0, (1 + vpce_id.len()) as u8]);
        input.push(0x01);
        input.extend_from_slice(vpce_id);

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.aws_vpce_id(), Some("vpce-08d2bf15fac5001c9"));
    }

    #[test]
    fn parse_aws_empty() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 3;
        input.extend([0xEA, 0, 0]);
        input.extend([0x04, 0, 0]);

        assert_eq!(parse(&input), Err(Error::V2Aws));
    }

    #[test]
    fn parse_aws_unknown_subtype_ignored() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 2;
        input.extend([0xEA, 0, 2, 0x7F, 1]);

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.tlvs().count(), 0);
    }

    #[test]
    fn parse_azure() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 5;
        input.extend([0xEE, 0, 5, 0x01, 0xEF, 0xBE, 0xAD, 0xDE]);

        let (info, _) = parse(&input).unwrap();

        assert_eq!(info.azure_linkid(), Some(0xDEAD_BEEF));
    }

    #[test]
    fn parse_azure_too_short() {
        let mut input = ipv4_input();
        input[15] = 12 + 3 + 4;
        input.extend([0xEE, 0, 4, 0x01, 0xEF, 0xBE, 0xAD]);

        assert_eq!(parse(&input), Err(Error::V2Azure));
    }

    #[test]
    fn create_local_unspecified() {
        let mut info = PpInfo::default();
        info.local = true;

        let mut expected = Vec::from(PROTOCOL_PREFIX);
        expected.extend([0x20, 0x00, 0, 0]);

        assert_eq!(create(&info).unwrap(), expected);
    }

    #[test]
    fn create_unspecified_without_local() {
        let info = PpInfo::default();

        assert_eq!(create(&info), Err(Error::V2Command));
    }

    #[test]
    fn create_ipv4() {
        let mut info = PpInfo::default();
        info.address_family = AddressFamily::IPv4;
        info.transport_protocol = TransportProtocol::Stream;
        info.src_addr.set_text("127.0.0.1");
        info.dst_addr.set_text("127.0.0.2");
        info.src_port = 80;
        info.dst_port = 443;

        assert_eq!(create(&info).unwrap(), ipv4_input());
    }

    #[test]
    fn create_ipv4_invalid_source() {
        let mut info = PpInfo::default();
        info.address_family = AddressFamily::IPv4;
        info.src_addr.set_text("localhost");
        info.dst_addr.set_text("127.0.0.2");

        assert_eq!(create(&info), Err(Error::V2Ipv4SourceAddress));
    }

    #[test]
    fn create_ipv6_invalid_destination() {
        let mut info = PpInfo::default();
        info.address_family = AddressFamily::IPv6;
        info.src_addr.set_text("::1");
        info.dst_addr.set_text("127.0.0.2");

        assert_eq!(create(&info), Err(Error::V2Ipv6DestinationAddress));
    }

    #[test]
    fn create_unix_round_trip() {
        let mut info = PpInfo::default();
        info.address_family = AddressFamily::Unix;
        info.transport_protocol = TransportProtocol::Stream;
        info.src_addr.set_raw(b"/tmp/sock");
        info.dst_addr.set_raw(b"\0abstract");

        let header = create(&info).unwrap();

        assert_eq!(header.len(), 16 + 216);

        let (parsed, _) = parse(&header).unwrap();

        assert_eq!(parsed.src_addr.as_bytes(), b"/tmp/sock");
        assert_eq!(parsed.dst_addr.as_bytes(), b"\0abstract");
    }

    #[test]
    fn create_datagram() {
        let mut info = PpInfo::default();
        info.address_family = AddressFamily::IPv4;
        info.transport_protocol = TransportProtocol::Datagram;
        info.src_addr.set_text("127.0.0.1");
        info.dst_addr.set_text("127.0.0.2");

        let header = create(&info).unwrap();

        assert_eq!(header[13], 0x12);
    }

    #[test]
    fn create_aligned() {
        let mut info = PpInfo::default();
        info.local = true;
        info.add_alpn(b"").unwrap();
        info.alignment_power = 5;

        let header = create(&info).unwrap();

        // 19 bytes of natural length padded up to 32.
        assert_eq!(header.len(), 32);
        assert_eq!(header[19], 0x04);
        assert_eq!(&header[20..22], &[0, 10]);
        assert!(header[22..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn create_aligned_skips_padding_when_exact() {
        let mut info = PpInfo::default();
        info.local = true;
        info.alignment_power = 4;

        let header = create(&info).unwrap();

        assert_eq!(header.len(), 16);
    }

    #[test]
    fn create_alignment_multiple() {
        for power in 2..=12u8 {
            let mut info = PpInfo::default();
            info.local = true;
            info.alignment_power = power;
            info.add_authority(b"proxy.example.com").unwrap();

            let header = create(&info).unwrap();

            assert_eq!(header.len() % (1 << power), 0, "power {}", power);
        }
    }

    #[test]
    fn create_bumps_alignment_when_gap_is_too_small() {
        // 16 + 14 = 30 bytes naturally; a gap of 2 cannot hold a NOOP TLV,
        // so the header grows to the next 32 byte boundary.
        let mut info = PpInfo::default();
        info.local = true;
        info.alignment_power = 5;
        info.add_alpn(&[0xAB; 11]).unwrap();

        let header = create(&info).unwrap();

        assert_eq!(header.len(), 64);
    }

    #[test]
    fn create_crc32c_round_trip_with_flip() {
        let mut info = PpInfo::default();
        info.address_family = AddressFamily::IPv6;
        info.transport_protocol = TransportProtocol::Stream;
        info.src_addr.set_text("::1");
        info.dst_addr.set_text("::2");
        info.src_port = 1;
        info.dst_port = 2;
        info.crc32c = true;
        info.add_alpn(b"h2").unwrap();

        let header = create(&info).unwrap();
        let (parsed, _) = parse(&header).unwrap();

        assert_eq!(parsed.alpn(), Some(&b"h2"[..]));
        assert!(parsed.crc32c);

        // Any flipped bit in the address block must break the checksum.
        let mut corrupted = header.clone();
        corrupted[20] ^= 0x01;

        assert_eq!(parse(&corrupted), Err(Error::V2Crc32c));
    }
}
