//! Builders for synthetic captures used by the unit tests.

use crate::ByteOrder;

pub const A: [u8; 4] = [10, 0, 0, 1];
pub const B: [u8; 4] = [10, 0, 0, 2];
pub const C: [u8; 4] = [192, 168, 1, 7];

pub struct CaptureBuilder {
    order: ByteOrder,
    bytes: Vec<u8>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self::with_magic(ByteOrder::Little, 0xA1B2_C3D4)
    }

    pub fn big_endian() -> Self {
        Self::with_magic(ByteOrder::Big, 0xA1B2_C3D4)
    }

    pub fn nanos() -> Self {
        Self::with_magic(ByteOrder::Little, 0xA1B2_3C4D)
    }

    fn with_magic(order: ByteOrder, magic: u32) -> Self {
        let mut builder = Self {
            order,
            bytes: Vec::new(),
        };
        builder.u32(magic);
        builder.u16(2);
        builder.u16(4);
        builder.u32(0); // thiszone
        builder.u32(0); // sigfigs
        builder.u32(65535);
        builder.u32(1); // Ethernet
        builder
    }

    pub fn record(self, ts_sec: u32, ts_frac: u32, data: &[u8]) -> Self {
        self.record_with_length(ts_sec, ts_frac, data.len() as u32, data)
    }

    /// Writes a record header declaring `captured` bytes, followed by `data`
    /// whatever its real length.
    pub fn record_with_length(
        mut self,
        ts_sec: u32,
        ts_frac: u32,
        captured: u32,
        data: &[u8],
    ) -> Self {
        self.u32(ts_sec);
        self.u32(ts_frac);
        self.u32(captured);
        self.u32(captured);
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn raw(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    fn u16(&mut self, value: u16) {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn u32(&mut self, value: u32) {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

/// A 54 byte Ethernet + IPv4 + TCP frame with no payload.
pub fn tcp_frame(src: [u8; 4], src_port: u16, dst: [u8; 4], dst_port: u16, flags: u8) -> Vec<u8> {
    let mut frame = Vec::with_capacity(54);
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x02]); // destination MAC
    frame.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]); // source MAC
    frame.extend_from_slice(&0x0800_u16.to_be_bytes());

    frame.push(0x45);
    frame.push(0);
    frame.extend_from_slice(&40_u16.to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0x40, 0]); // id, flags + fragment offset
    frame.push(64);
    frame.push(6);
    frame.extend_from_slice(&[0, 0]); // checksum
    frame.extend_from_slice(&src);
    frame.extend_from_slice(&dst);

    frame.extend_from_slice(&src_port.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&[0; 8]); // seq + ack
    frame.push(0x50);
    frame.push(flags);
    frame.extend_from_slice(&8192_u16.to_be_bytes());
    frame.extend_from_slice(&[0; 4]); // checksum + urgent pointer
    frame
}
