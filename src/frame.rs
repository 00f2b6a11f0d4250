//! Ethernet, IPv4 and TCP header decoding.
//!
//! Layout read from each record (all multi-byte fields big-endian):
//!
//! | layer    | offset       | width | field                    |
//! |----------|--------------|-------|--------------------------|
//! | Ethernet | 12           | 2     | EtherType, must be 0x0800|
//! | IPv4     | 14           | 1     | version (4) + IHL        |
//! | IPv4     | 14 + 9       | 1     | protocol, must be 6      |
//! | IPv4     | 14 + 12      | 4     | source address           |
//! | IPv4     | 14 + 16      | 4     | destination address      |
//! | TCP      | 14 + IHL*4   | 2     | source port              |
//! | TCP      | + 2          | 2     | destination port         |
//! | TCP      | + 13         | 1     | flags                    |
//!
//! TCP options are never skipped since nothing past the fixed header is read.

use std::{
    fmt::{Display, Formatter},
    net::Ipv4Addr,
};

use crate::{FrameError, PacketRecord, Readable};

pub const ETHERNET_HEADER_LENGTH: usize = 14;
pub const IPV4_MIN_HEADER_LENGTH: usize = 20;
pub const TCP_HEADER_LENGTH: usize = 20;

const ETHERTYPE_IPV4: u16 = 0x0800;
const PROTOCOL_TCP: u8 = 0x06;

/// One side of a conversation.
///
/// Ordering is by address octets, then port.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<Ipv4Addr>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// The raw TCP flags byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TcpFlags(pub u8);

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;

    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit == bit
    }

    pub fn syn(self) -> bool {
        self.contains(Self::SYN)
    }

    pub fn fin(self) -> bool {
        self.contains(Self::FIN)
    }

    pub fn rst(self) -> bool {
        self.contains(Self::RST)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFrame {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub flags: TcpFlags,
    /// Captured record length, counted as the bytes this frame carried.
    pub length: usize,
    /// Arrival time in seconds.
    pub timestamp: f64,
}

fn read_be<T: Readable>(data: &[u8], position: &mut usize) -> Result<T, FrameError> {
    let needed = *position + T::BYTES;
    T::read_be(data, position).ok_or(FrameError::TooShort {
        needed,
        available: data.len(),
    })
}

fn require(data: &[u8], needed: usize) -> Result<(), FrameError> {
    if data.len() < needed {
        return Err(FrameError::TooShort {
            needed,
            available: data.len(),
        });
    }
    Ok(())
}

pub fn parse(record: &PacketRecord<'_>) -> Result<ParsedFrame, FrameError> {
    let data = record.data;

    // Ethernet
    let mut position = 0;
    position += 6; // Destination MAC
    position += 6; // Source MAC
    let ethertype = read_be::<u16>(data, &mut position)?;
    if ethertype != ETHERTYPE_IPV4 {
        return Err(FrameError::NotIpv4 { ethertype });
    }

    // IPv4
    let ip_start = position;
    require(data, ip_start + IPV4_MIN_HEADER_LENGTH)?;
    let magic = read_be::<u8>(data, &mut position)?;
    let version = (magic & 0xF0) >> 4;
    let ihl = magic & 0x0F;
    if version != 4 {
        return Err(FrameError::IpVersion(version));
    }
    if usize::from(ihl) * 4 < IPV4_MIN_HEADER_LENGTH {
        return Err(FrameError::BadHeaderLength(ihl));
    }
    position += 1; // DSCP + ECN
    position += 2; // Total length
    position += 2; // Identification
    position += 2; // Flags + Fragment offset
    position += 1; // TTL
    let protocol = read_be::<u8>(data, &mut position)?;
    if protocol != PROTOCOL_TCP {
        return Err(FrameError::NotTcp { protocol });
    }
    position += 2; // Header checksum
    let source = Ipv4Addr::from(read_be::<u32>(data, &mut position)?);
    let dest = Ipv4Addr::from(read_be::<u32>(data, &mut position)?);

    // TCP, located past any IP options
    position = ip_start + usize::from(ihl) * 4;
    require(data, position + TCP_HEADER_LENGTH)?;
    let source_port = read_be::<u16>(data, &mut position)?;
    let dest_port = read_be::<u16>(data, &mut position)?;
    position += 4; // Sequence number
    position += 4; // Acknowledgment number
    position += 1; // Data offset
    let flags = read_be::<u8>(data, &mut position)?;

    Ok(ParsedFrame {
        source: Endpoint::new(source, source_port),
        destination: Endpoint::new(dest, dest_port),
        flags: TcpFlags(flags),
        length: data.len(),
        timestamp: record.timestamp(),
    })
}
