//! Errors shared by the version 1 and version 2 codecs.

/// An error in parsing or creating a PROXY protocol header.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Copy, Clone)]
pub enum Error {
    #[error("Invalid PROXY protocol version given. Only 1 and 2 are valid.")]
    Version,
    #[error("v2 PROXY protocol header: wrong version.")]
    V2Version,
    #[error("v2 PROXY protocol header: wrong command.")]
    V2Command,
    #[error("v2 PROXY protocol header: wrong address family.")]
    V2AddressFamily,
    #[error("v2 PROXY protocol header: wrong transport protocol.")]
    V2TransportProtocol,
    #[error("v2 PROXY protocol header: invalid length.")]
    V2Length,
    #[error("v2 PROXY protocol header: invalid IPv4 source address.")]
    V2Ipv4SourceAddress,
    #[error("v2 PROXY protocol header: invalid IPv4 destination address.")]
    V2Ipv4DestinationAddress,
    #[error("v2 PROXY protocol header: invalid IPv6 source address.")]
    V2Ipv6SourceAddress,
    #[error("v2 PROXY protocol header: invalid IPv6 destination address.")]
    V2Ipv6DestinationAddress,
    #[error("v2 PROXY protocol header: invalid TLV vector length.")]
    V2TlvLength,
    #[error("v2 PROXY protocol header: invalid CRC32C TLV.")]
    V2Crc32c,
    #[error("v2 PROXY protocol header: invalid SSL TLV.")]
    V2Ssl,
    #[error("v2 PROXY protocol header: invalid unique ID TLV.")]
    V2UniqueId,
    #[error("v2 PROXY protocol header: invalid AWS TLV.")]
    V2Aws,
    #[error("v2 PROXY protocol header: invalid Azure TLV.")]
    V2Azure,
    #[error("v1 PROXY protocol header: \"\\r\\n\" is missing.")]
    V1CrLf,
    #[error("v1 PROXY protocol header: \"PROXY\" is missing.")]
    V1Proxy,
    #[error("v1 PROXY protocol header: space is missing.")]
    V1Space,
    #[error("v1 PROXY protocol header: wrong transport protocol or address family.")]
    V1TransportFamily,
    #[error("v1 PROXY protocol header: invalid IPv4 source address.")]
    V1Ipv4SourceAddress,
    #[error("v1 PROXY protocol header: invalid IPv4 destination address.")]
    V1Ipv4DestinationAddress,
    #[error("v1 PROXY protocol header: invalid IPv6 source address.")]
    V1Ipv6SourceAddress,
    #[error("v1 PROXY protocol header: invalid IPv6 destination address.")]
    V1Ipv6DestinationAddress,
    #[error("v1 PROXY protocol header: invalid source port.")]
    V1SourcePort,
    #[error("v1 PROXY protocol header: invalid destination port.")]
    V1DestinationPort,
}

impl Error {
    /// Whether this error can be caused by a partially buffered header,
    /// so that retrying with more bytes may succeed.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::V2Length | Error::V1CrLf)
    }
}
