use thiserror::Error;

/// Errors that abort a whole capture pass.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture is {available} bytes, too short for the 24 byte global header")]
    TruncatedGlobalHeader { available: usize },

    #[error("unrecognised capture magic 0x{0:08X}")]
    BadMagic(u32),

    #[error("record header at offset {offset} needs 16 bytes, only {available} remain")]
    TruncatedRecordHeader { offset: usize, available: usize },

    #[error("record at offset {offset} declares {declared} bytes, only {available} remain")]
    TruncatedPayload {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("record {index} is not an Ethernet/IPv4/TCP frame: {reason}")]
    UnsupportedFrame { index: usize, reason: FrameError },
}

/// Reasons a single record cannot be decoded as Ethernet + IPv4 + TCP.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame is {available} bytes, needed at least {needed}")]
    TooShort { needed: usize, available: usize },

    #[error("expected an IP(v4) record, found EtherType 0x{ethertype:04X}")]
    NotIpv4 { ethertype: u16 },

    #[error("expected IP version 4, found {0}")]
    IpVersion(u8),

    #[error("IPv4 header length {0} is below the minimum of 5 words")]
    BadHeaderLength(u8),

    #[error("expected TCP, found IP protocol 0x{protocol:02X}")]
    NotTcp { protocol: u8 },
}
