//! The neutral in-memory representation of a PROXY protocol header.

use std::fmt;
use std::slice::Iter;
use std::str::from_utf8;

use crate::error::Error;
use crate::tlv::{self, Tlv, Type};

/// The version of the PROXY protocol header.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Version {
    One,
    Two,
}

impl Version {
    /// Create a new instance of a version.
    /// If the version is not supported, returns an error.
    pub fn new(version: u8) -> Result<Version, Error> {
        match version {
            1 => Ok(Version::One),
            2 => Ok(Version::Two),
            _ => Err(Error::Version),
        }
    }
}

/// The type of connection received by the server from the proxy.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Command {
    Local,
    Proxy,
}

/// The address family of the proxied connection.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
pub enum AddressFamily {
    #[default]
    Unspecified,
    IPv4,
    IPv6,
    Unix,
}

/// The network protocol used by the client.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
pub enum TransportProtocol {
    #[default]
    Unspecified,
    Stream,
    Datagram,
}

const CLIENT_SSL: u8 = 0x01;
const CLIENT_CERT_CONN: u8 = 0x02;
const CLIENT_CERT_SESS: u8 = 0x04;

/// TLS attributes reported by the proxy for the client connection,
/// carried in the SSL TLV's `client` bit field and `verify` word.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SslInfo {
    /// The client connected over SSL/TLS.
    pub ssl: bool,
    /// The client presented a certificate over the current connection.
    pub cert_in_connection: bool,
    /// The client presented a certificate at least once over the TLS session.
    pub cert_in_session: bool,
    /// The client certificate was verified by the frontend.
    pub cert_verified: bool,
}

impl SslInfo {
    pub(crate) fn from_wire(client: u8, verify: u32) -> SslInfo {
        SslInfo {
            ssl: client & CLIENT_SSL != 0,
            cert_in_connection: client & CLIENT_CERT_CONN != 0,
            cert_in_session: client & CLIENT_CERT_SESS != 0,
            cert_verified: verify == 0,
        }
    }

    pub(crate) fn client_byte(&self) -> u8 {
        let mut client = 0;
        if self.ssl {
            client |= CLIENT_SSL;
        }
        if self.cert_in_connection {
            client |= CLIENT_CERT_CONN;
        }
        if self.cert_in_session {
            client |= CLIENT_CERT_SESS;
        }
        client
    }

    pub(crate) fn verify_word(&self) -> u32 {
        u32::from(!self.cert_verified)
    }
}

/// Fixed-capacity holder for one endpoint address.
///
/// Stores either the textual form of an IP address or a raw AF_UNIX socket
/// path, whichever the address family calls for. Sized for the larger of
/// the two: a 108 byte path.
#[derive(Copy, Clone)]
pub struct AddrBuf {
    bytes: [u8; AddrBuf::CAPACITY],
    len: usize,
}

impl AddrBuf {
    pub const CAPACITY: usize = 108;

    pub fn new() -> AddrBuf {
        AddrBuf {
            bytes: [0; AddrBuf::CAPACITY],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The textual form, if the stored bytes are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        from_utf8(self.as_bytes()).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores the textual form of an address, truncating at capacity.
    pub fn set_text(&mut self, text: &str) {
        self.set_raw(text.as_bytes());
    }

    /// Stores raw path bytes with trailing NUL padding stripped.
    /// Leading NULs survive so abstract-namespace socket paths round-trip.
    pub(crate) fn set_raw(&mut self, raw: &[u8]) {
        let raw = &raw[..raw.len().min(AddrBuf::CAPACITY)];
        let end = raw.iter().rposition(|&byte| byte != 0).map_or(0, |at| at + 1);

        self.bytes = [0; AddrBuf::CAPACITY];
        self.bytes[..end].copy_from_slice(&raw[..end]);
        self.len = end;
    }
}

impl Default for AddrBuf {
    fn default() -> Self {
        AddrBuf::new()
    }
}

impl From<&str> for AddrBuf {
    fn from(text: &str) -> Self {
        let mut address = AddrBuf::new();
        address.set_text(text);
        address
    }
}

impl PartialEq for AddrBuf {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for AddrBuf {}

impl fmt::Debug for AddrBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AddrBuf")
            .field(&String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

/// A parsed or to-be-serialized PROXY protocol header.
///
/// The parser fills one in and the serializers read one back out; the
/// `add_*` methods compose the TLV extensions a sender may want to attach.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PpInfo {
    pub address_family: AddressFamily,
    pub transport_protocol: TransportProtocol,
    /// v2 LOCAL command: the addresses describe the sender itself.
    pub local: bool,
    pub src_addr: AddrBuf,
    pub dst_addr: AddrBuf,
    pub src_port: u16,
    pub dst_port: u16,
    pub ssl_info: SslInfo,
    /// Whether a CRC32C TLV was present on parse, or should be emitted on
    /// serialize.
    pub crc32c: bool,
    /// Pad the serialized v2 header to a multiple of `1 << alignment_power`.
    /// Values below 2 disable padding.
    pub alignment_power: u8,
    tlvs: Vec<Tlv>,
}

impl PpInfo {
    /// An iterator over the stored TLVs in appearance order.
    pub fn tlvs(&self) -> Iter<'_, Tlv> {
        self.tlvs.iter()
    }

    /// Resets every field and releases the TLV storage.
    pub fn clear(&mut self) {
        *self = PpInfo::default();
    }

    pub(crate) fn push_tlv(&mut self, tlv: Tlv) {
        self.tlvs.push(tlv);
    }

    fn append(&mut self, value_type: Type, value: Vec<u8>) -> Result<(), Error> {
        self.tlvs.push(Tlv::new(value_type.into(), value)?);
        Ok(())
    }

    /// Attaches an ALPN TLV with the negotiated application protocol.
    pub fn add_alpn(&mut self, alpn: &[u8]) -> Result<(), Error> {
        self.append(Type::ALPN, alpn.to_vec())
    }

    /// Attaches an authority TLV with the host name the client targeted.
    pub fn add_authority(&mut self, host_name: &[u8]) -> Result<(), Error> {
        self.append(Type::Authority, host_name.to_vec())
    }

    /// Attaches a unique ID TLV identifying the connection.
    /// The ID may be at most 128 bytes.
    pub fn add_unique_id(&mut self, unique_id: &[u8]) -> Result<(), Error> {
        if unique_id.len() > 128 {
            return Err(Error::V2UniqueId);
        }

        self.append(Type::UniqueId, unique_id.to_vec())
    }

    /// Composes an SSL TLV from `ssl_info` and the given sub-fields.
    /// Absent or empty sub-fields are skipped.
    pub fn add_ssl(
        &mut self,
        version: Option<&str>,
        cipher: Option<&str>,
        sig_alg: Option<&str>,
        key_alg: Option<&str>,
        cn: Option<&[u8]>,
    ) -> Result<(), Error> {
        let sub_fields = [
            (Type::SSLVersion, version.map_or(&[][..], str::as_bytes)),
            (Type::SSLCipher, cipher.map_or(&[][..], str::as_bytes)),
            (Type::SSLSignatureAlgorithm, sig_alg.map_or(&[][..], str::as_bytes)),
            (Type::SSLKeyAlgorithm, key_alg.map_or(&[][..], str::as_bytes)),
            (Type::SSLCommonName, cn.unwrap_or(&[])),
        ];

        let length: usize = 5 + sub_fields
            .iter()
            .filter(|(_, field)| !field.is_empty())
            .map(|(_, field)| tlv::HEADER_BYTES + field.len())
            .sum::<usize>();
        if length > u16::MAX as usize {
            return Err(Error::V2TlvLength);
        }

        let mut value = Vec::with_capacity(length);
        value.push(self.ssl_info.client_byte());
        // Opaque on the wire; receivers only compare it against zero.
        value.extend(self.ssl_info.verify_word().to_le_bytes());
        for (value_type, field) in sub_fields {
            if field.is_empty() {
                continue;
            }
            value.push(value_type.into());
            value.extend((field.len() as u16).to_be_bytes());
            value.extend_from_slice(field);
        }

        self.append(Type::SSL, value)
    }

    /// Attaches a network namespace TLV.
    pub fn add_netns(&mut self, netns: &str) -> Result<(), Error> {
        self.append(Type::NetworkNamespace, netns.as_bytes().to_vec())
    }

    /// Attaches an AWS TLV carrying the VPC endpoint ID the connection
    /// traversed, e.g. `vpce-08d2bf15fac5001c9`.
    pub fn add_aws_vpce_id(&mut self, vpce_id: &str) -> Result<(), Error> {
        let mut value = Vec::with_capacity(1 + vpce_id.len());
        value.push(tlv::AWS_SUBTYPE_VPCE_ID);
        value.extend_from_slice(vpce_id.as_bytes());

        self.append(Type::Aws, value)
    }

    /// Attaches an Azure TLV carrying the Private Endpoint LinkID.
    pub fn add_azure_linkid(&mut self, linkid: u32) -> Result<(), Error> {
        let mut value = Vec::with_capacity(5);
        value.push(tlv::AZURE_SUBTYPE_PRIVATE_ENDPOINT_LINKID);
        value.extend(linkid.to_le_bytes());

        self.append(Type::Azure, value)
    }

    /// The value of the first TLV with the given type.
    pub fn tlv_value(&self, value_type: u8) -> Option<&[u8]> {
        self.tlvs
            .iter()
            .find(|tlv| tlv.value_type() == value_type)
            .map(Tlv::value)
    }

    /// The value of the first TLV with the given type, provided its leading
    /// subtype byte matches.
    fn tlv_subtype_value(&self, value_type: Type, subtype: u8) -> Option<&[u8]> {
        let value = self.tlv_value(value_type.into())?;
        if *value.first()? != subtype {
            return None;
        }
        Some(&value[1..])
    }

    fn tlv_str(&self, value_type: Type) -> Option<&str> {
        from_utf8(self.tlv_value(value_type.into())?).ok()
    }

    pub fn alpn(&self) -> Option<&[u8]> {
        self.tlv_value(Type::ALPN.into())
    }

    pub fn authority(&self) -> Option<&str> {
        self.tlv_str(Type::Authority)
    }

    /// The checksum carried by the CRC32C TLV, big-endian on the wire.
    pub fn crc32c_checksum(&self) -> Option<u32> {
        let value = self.tlv_value(Type::CRC32C.into())?;
        Some(u32::from_be_bytes(value.try_into().ok()?))
    }

    pub fn unique_id(&self) -> Option<&[u8]> {
        self.tlv_value(Type::UniqueId.into())
    }

    pub fn ssl_version(&self) -> Option<&str> {
        self.tlv_str(Type::SSLVersion)
    }

    pub fn ssl_cn(&self) -> Option<&str> {
        self.tlv_str(Type::SSLCommonName)
    }

    pub fn ssl_cipher(&self) -> Option<&str> {
        self.tlv_str(Type::SSLCipher)
    }

    pub fn ssl_sig_alg(&self) -> Option<&str> {
        self.tlv_str(Type::SSLSignatureAlgorithm)
    }

    pub fn ssl_key_alg(&self) -> Option<&str> {
        self.tlv_str(Type::SSLKeyAlgorithm)
    }

    pub fn netns(&self) -> Option<&str> {
        self.tlv_str(Type::NetworkNamespace)
    }

    pub fn aws_vpce_id(&self) -> Option<&str> {
        from_utf8(self.tlv_subtype_value(Type::Aws, tlv::AWS_SUBTYPE_VPCE_ID)?).ok()
    }

    /// The Azure Private Endpoint LinkID, little-endian on the wire.
    pub fn azure_linkid(&self) -> Option<u32> {
        let value =
            self.tlv_subtype_value(Type::Azure, tlv::AZURE_SUBTYPE_PRIVATE_ENDPOINT_LINKID)?;
        Some(u32::from_le_bytes(value.try_into().ok()?))
    }
}
