use std::{
    fmt::{Debug, Formatter},
    path::Path,
};

use anyhow::Context;

mod config;
mod error;
pub mod frame;
pub mod report;
pub mod stats;
pub mod tracker;

#[cfg(test)]
mod test_support;

pub use config::{Config, FramePolicy};
pub use error::{CaptureError, FrameError};
pub use frame::{Endpoint, ParsedFrame, TcpFlags};
pub use report::{CaptureSummary, Report};
pub use stats::{AggregateStatistics, Summary};
pub use tracker::{Connection, ConnectionKey, ConnectionTracker, Connections};

/// Field byte order of a capture, as announced by its magic number.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Unit of the fractional part of each record timestamp.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimestampResolution {
    Micros,
    Nanos,
}

impl TimestampResolution {
    fn units_per_second(self) -> f64 {
        match self {
            Self::Micros => 1e6,
            Self::Nanos => 1e9,
        }
    }
}

/// The libpcap global header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalHeader {
    pub magic: u32,
    pub version_major: u16,
    pub version_minor: u16,
    pub thiszone: i32,
    pub sigfigs: u32,
    pub snaplen: u32,
    pub network: u32,
    pub byte_order: ByteOrder,
    pub resolution: TimestampResolution,
}

impl GlobalHeader {
    pub const LINKTYPE_ETHERNET: u32 = 1;

    fn read(data: &[u8]) -> Result<Self, CaptureError> {
        let short = || CaptureError::TruncatedGlobalHeader {
            available: data.len(),
        };
        let mut position = 0;
        let magic = u32::read_le(data, &mut position).ok_or_else(short)?;
        let (order, resolution) = match magic {
            0xA1B2_C3D4 => (ByteOrder::Little, TimestampResolution::Micros),
            0xA1B2_3C4D => (ByteOrder::Little, TimestampResolution::Nanos),
            0xD4C3_B2A1 => (ByteOrder::Big, TimestampResolution::Micros),
            0x4D3C_B2A1 => (ByteOrder::Big, TimestampResolution::Nanos),
            other => return Err(CaptureError::BadMagic(other)),
        };
        let version_major = u16::read(data, &mut position, order).ok_or_else(short)?;
        let version_minor = u16::read(data, &mut position, order).ok_or_else(short)?;
        let thiszone = i32::read(data, &mut position, order).ok_or_else(short)?;
        let sigfigs = u32::read(data, &mut position, order).ok_or_else(short)?;
        let snaplen = u32::read(data, &mut position, order).ok_or_else(short)?;
        let network = u32::read(data, &mut position, order).ok_or_else(short)?;

        debug_assert_eq!(position, Capture::HEADER_LENGTH);
        Ok(Self {
            magic,
            version_major,
            version_minor,
            thiszone,
            sigfigs,
            snaplen,
            network,
            byte_order: order,
            resolution,
        })
    }
}

/// A whole capture file held in memory.
pub struct Capture<'a> {
    data: &'a [u8],
    header: GlobalHeader,
}

impl<'a> Capture<'a> {
    pub const HEADER_LENGTH: usize = 24;

    pub fn new(data: &'a [u8]) -> Result<Self, CaptureError> {
        if data.len() < Self::HEADER_LENGTH {
            return Err(CaptureError::TruncatedGlobalHeader {
                available: data.len(),
            });
        }
        let header = GlobalHeader::read(data)?;
        log::info!(
            "pcap v{}.{}, {:?} endian, snaplen {}, link type {}",
            header.version_major,
            header.version_minor,
            header.byte_order,
            header.snaplen,
            header.network
        );
        if header.network != GlobalHeader::LINKTYPE_ETHERNET {
            log::warn!(
                "link type {} is not Ethernet, frames will fail to decode",
                header.network
            );
        }
        Ok(Self { data, header })
    }

    pub fn header(&self) -> &GlobalHeader {
        &self.header
    }

    pub fn records(&self) -> Records<'_> {
        Records::new(self)
    }
}

/// Forward-only walk over the records following the global header.
///
/// Yields `Err` at most once; after that the iterator is exhausted.
pub struct Records<'a> {
    pcap: &'a Capture<'a>,
    position: usize,
    failed: bool,
}

impl<'a> Records<'a> {
    fn new(pcap: &'a Capture<'a>) -> Self {
        Self {
            pcap,
            position: Capture::HEADER_LENGTH,
            failed: false,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<PacketRecord<'a>, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.pcap.data.len() {
            return None;
        }
        let record = PacketRecord::read(self.pcap.data, &mut self.position, &self.pcap.header);
        self.failed = record.is_err();
        Some(record)
    }
}

impl std::iter::FusedIterator for Records<'_> {}

/// One captured packet, borrowing its bytes from the capture buffer.
#[derive(Clone, Copy)]
pub struct PacketRecord<'a> {
    pub ts_sec: u32,
    /// Microseconds or nanoseconds, see `resolution`.
    pub ts_frac: u32,
    pub captured_len: u32,
    pub original_len: u32,
    pub resolution: TimestampResolution,
    pub data: &'a [u8],
}

impl<'a> PacketRecord<'a> {
    pub const HEADER_LENGTH: usize = 16;

    fn read(
        data: &'a [u8],
        position: &mut usize,
        header: &GlobalHeader,
    ) -> Result<Self, CaptureError> {
        let offset = *position;
        let available = data.len().saturating_sub(offset);
        let truncated = || CaptureError::TruncatedRecordHeader { offset, available };
        if available < Self::HEADER_LENGTH {
            return Err(truncated());
        }

        let order = header.byte_order;
        let ts_sec = u32::read(data, position, order).ok_or_else(truncated)?;
        let ts_frac = u32::read(data, position, order).ok_or_else(truncated)?;
        let captured_len = u32::read(data, position, order).ok_or_else(truncated)?;
        let original_len = u32::read(data, position, order).ok_or_else(truncated)?;

        let declared = captured_len as usize;
        let remaining = data.len() - *position;
        if declared > remaining {
            return Err(CaptureError::TruncatedPayload {
                offset,
                declared,
                available: remaining,
            });
        }
        let enclosed_data = &data[*position..*position + declared];
        *position += declared;

        if captured_len != original_len {
            log::debug!(
                "record at offset {offset} was truncated to {captured_len} of {original_len} bytes"
            );
        }
        Ok(Self {
            ts_sec,
            ts_frac,
            captured_len,
            original_len,
            resolution: header.resolution,
            data: enclosed_data,
        })
    }

    /// Seconds since the epoch, fraction included.
    pub fn timestamp(&self) -> f64 {
        f64::from(self.ts_sec) + f64::from(self.ts_frac) / self.resolution.units_per_second()
    }
}

impl Debug for PacketRecord<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let alt = f.alternate();
        let mut s = f.debug_struct("PacketRecord");
        let s = s
            .field("timestamp", &self.timestamp())
            .field("captured_len", &self.captured_len)
            .field("original_len", &self.original_len);
        if alt {
            s.field("data", &self.data).finish()
        } else {
            s.finish_non_exhaustive()
        }
    }
}

/// Runs the full pass over an in-memory capture.
///
/// Any capture-level error aborts before a report exists, so callers never see
/// statistics over a partial traversal.
pub fn analyze(data: &[u8], config: &Config) -> Result<Report, CaptureError> {
    let capture = Capture::new(data)?;
    let mut tracker = ConnectionTracker::new();
    let mut records = 0_usize;
    let mut skipped_frames = 0_usize;

    for (index, record) in capture.records().enumerate() {
        let record = record?;
        records += 1;
        match frame::parse(&record) {
            Ok(frame) => tracker.observe(&frame),
            Err(reason) => match config.frame_policy {
                FramePolicy::Skip => {
                    log::debug!("skipping record {index}: {reason}");
                    skipped_frames += 1;
                }
                FramePolicy::Abort => {
                    return Err(CaptureError::UnsupportedFrame { index, reason });
                }
            },
        }
    }

    let connections = tracker.finish();
    log::info!(
        "{records} records, {skipped_frames} skipped, {} connections",
        connections.len()
    );
    let summary = CaptureSummary {
        header: capture.header().clone(),
        records,
        skipped_frames,
    };
    Ok(Report::new(summary, connections))
}

pub fn analyze_file(path: impl AsRef<Path>, config: &Config) -> anyhow::Result<Report> {
    let data = fs_err::read(path.as_ref())?;
    analyze(&data, config)
        .with_context(|| format!("failed to analyze {}", path.as_ref().display()))
}

pub(crate) trait Readable: Sized {
    const BYTES: usize;

    fn read_le(data: &[u8], position: &mut usize) -> Option<Self>;
    fn read_be(data: &[u8], position: &mut usize) -> Option<Self>;

    fn read(data: &[u8], position: &mut usize, order: ByteOrder) -> Option<Self> {
        match order {
            ByteOrder::Little => Self::read_le(data, position),
            ByteOrder::Big => Self::read_be(data, position),
        }
    }
}

macro_rules! impl_readable {
    ($($t:ty: $size:literal),+ $(,)?) => {
        $(
        impl Readable for $t {
            const BYTES: usize = $size;

            fn read_le(data: &[u8], position: &mut usize) -> Option<Self> {
                let part = data.get(*position..position.checked_add($size)?)?;
                *position += $size;
                Some(Self::from_le_bytes(part.try_into().ok()?))
            }

            fn read_be(data: &[u8], position: &mut usize) -> Option<Self> {
                let part = data.get(*position..position.checked_add($size)?)?;
                *position += $size;
                Some(Self::from_be_bytes(part.try_into().ok()?))
            }
        }
        )+
    };
}

impl_readable! {
    u8: 1,
    u16: 2,
    u32: 4,
    i32: 4,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tcp_frame, CaptureBuilder, A, B};

    #[test]
    fn header_only_capture_has_no_records() {
        let data = CaptureBuilder::new().build();
        let capture = Capture::new(&data).unwrap();
        assert_eq!(capture.header().version_major, 2);
        assert_eq!(capture.header().version_minor, 4);
        assert_eq!(capture.header().network, 1);
        assert_eq!(capture.records().count(), 0);
    }

    #[test]
    fn short_global_header() {
        let data = CaptureBuilder::new().build();
        let err = Capture::new(&data[..23]).err().unwrap();
        assert!(matches!(
            err,
            CaptureError::TruncatedGlobalHeader { available: 23 }
        ));
    }

    #[test]
    fn unknown_magic() {
        let mut data = CaptureBuilder::new().build();
        data[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let err = Capture::new(&data).err().unwrap();
        assert!(matches!(err, CaptureError::BadMagic(0xEFBE_ADDE)));
    }

    #[test]
    fn big_endian_capture_decodes_the_same() {
        let frame = tcp_frame(A, 1000, B, 80, TcpFlags::SYN);
        let data = CaptureBuilder::big_endian()
            .record(1_700_000_000, 250_000, &frame)
            .build();
        let capture = Capture::new(&data).unwrap();
        assert_eq!(capture.header().byte_order, ByteOrder::Big);
        assert_eq!(capture.header().snaplen, 65535);

        let records = capture.records().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].captured_len as usize, frame.len());
        assert_eq!(records[0].data, &frame[..]);
        assert!((records[0].timestamp() - 1_700_000_000.25).abs() < 1e-6);
    }

    #[test]
    fn nanosecond_magic_scales_fraction() {
        let data = CaptureBuilder::nanos()
            .record(10, 500_000_000, &tcp_frame(A, 1, B, 2, TcpFlags::ACK))
            .build();
        let capture = Capture::new(&data).unwrap();
        assert_eq!(capture.header().resolution, TimestampResolution::Nanos);
        let record = capture.records().next().unwrap().unwrap();
        assert!((record.timestamp() - 10.5).abs() < 1e-9);
    }

    #[test]
    fn truncated_record_header_stops_iteration() {
        let data = CaptureBuilder::new()
            .record(1, 0, &tcp_frame(A, 1, B, 2, TcpFlags::ACK))
            .raw(&[0; 10])
            .build();
        let capture = Capture::new(&data).unwrap();
        let mut records = capture.records();
        assert!(records.next().unwrap().is_ok());
        let err = records.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::TruncatedRecordHeader { available: 10, .. }
        ));
        assert!(records.next().is_none());
    }

    #[test]
    fn truncated_payload_reports_lengths() {
        let data = CaptureBuilder::new()
            .record_with_length(1, 0, 100, &[0; 40])
            .build();
        let capture = Capture::new(&data).unwrap();
        let err = capture.records().next().unwrap().unwrap_err();
        match err {
            CaptureError::TruncatedPayload {
                offset,
                declared,
                available,
            } => {
                assert_eq!(offset, Capture::HEADER_LENGTH);
                assert_eq!(declared, 100);
                assert_eq!(available, 40);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn analyze_skips_unsupported_frames_by_default() {
        let mut arp = tcp_frame(A, 1, B, 2, TcpFlags::SYN);
        arp[12..14].copy_from_slice(&0x0806_u16.to_be_bytes());
        let data = CaptureBuilder::new()
            .record(1, 0, &arp)
            .record(2, 0, &tcp_frame(A, 1, B, 2, TcpFlags::SYN))
            .build();

        let report = analyze(&data, &Config::default()).unwrap();
        assert_eq!(report.summary().records, 2);
        assert_eq!(report.summary().skipped_frames, 1);
        assert_eq!(report.connections().len(), 1);
    }

    #[test]
    fn analyze_aborts_on_unsupported_frame_when_asked() {
        let data = CaptureBuilder::new()
            .record(1, 0, &tcp_frame(A, 1, B, 2, TcpFlags::SYN))
            .record(2, 0, &[0; 10])
            .build();
        let config = Config {
            frame_policy: FramePolicy::Abort,
            ..Config::default()
        };
        let err = analyze(&data, &config).err().unwrap();
        assert!(matches!(
            err,
            CaptureError::UnsupportedFrame {
                index: 1,
                reason: FrameError::TooShort { .. }
            }
        ));
    }

    #[test]
    fn debug_hides_payload_unless_alternate() {
        let frame = tcp_frame(A, 1, B, 2, TcpFlags::SYN);
        let data = CaptureBuilder::new().record(3, 0, &frame).build();
        let capture = Capture::new(&data).unwrap();
        let record = capture.records().next().unwrap().unwrap();
        assert!(!format!("{record:?}").contains("data"));
        assert!(format!("{record:#?}").contains("data"));
    }
}
