use std::fmt::{Display, Formatter};

use crate::{AggregateStatistics, Connection, Connections, GlobalHeader};

const SECTION_RULE: &str = "_________________________________________________________";
const CONNECTION_RULE: &str = "+++++++++++++++++++++++++++++++++";
const BOTH_DIRECTIONS: &str = "including both send/received";

/// Facts about the capture itself, gathered during the pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSummary {
    pub header: GlobalHeader,
    pub records: usize,
    pub skipped_frames: usize,
}

/// The finished result of a pass. Rendering through `Display` is pure, so the
/// same report always prints the same text.
#[derive(Debug, Clone)]
pub struct Report {
    summary: CaptureSummary,
    connections: Connections,
    statistics: Option<AggregateStatistics>,
}

impl Report {
    pub fn new(summary: CaptureSummary, connections: Connections) -> Self {
        let statistics = AggregateStatistics::compute(&connections);
        Self {
            summary,
            connections,
            statistics,
        }
    }

    pub fn summary(&self) -> &CaptureSummary {
        &self.summary
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn statistics(&self) -> Option<&AggregateStatistics> {
        self.statistics.as_ref()
    }

    fn fmt_connection(f: &mut Formatter<'_>, number: usize, conn: &Connection) -> std::fmt::Result {
        writeln!(f, "Connection {number}:")?;
        writeln!(f, "Source Address: {}", conn.source.address)?;
        writeln!(f, "Destination address: {}", conn.destination.address)?;
        writeln!(f, "Source Port: {}", conn.source.port)?;
        writeln!(f, "Destination Port: {}", conn.destination.port)?;
        writeln!(f, "Status: {}", conn.status())?;
        if conn.duration() != 0.0 {
            writeln!(f, "Start time: {:.4}s", conn.start_time)?;
            writeln!(f, "End Time: {:.4}s", conn.end_time)?;
            writeln!(f, "Duration: {:.4}s", conn.duration())?;
            writeln!(
                f,
                "Number of packets sent from Source to Destination: {}",
                conn.packets_sent
            )?;
            writeln!(
                f,
                "Number of packets sent from Destination to Source: {}",
                conn.packets_received
            )?;
            writeln!(f, "Total number of packets: {}", conn.total_packets())?;
            writeln!(
                f,
                "Number of data bytes sent from Source to Destination: {}",
                conn.bytes_sent
            )?;
            writeln!(
                f,
                "Number of data bytes sent from Destination to Source: {}",
                conn.bytes_received
            )?;
            writeln!(f, "Total number of data bytes: {}", conn.total_bytes())?;
        }
        writeln!(f, "END")?;
        writeln!(f, "{CONNECTION_RULE}")
    }

    fn fmt_statistics(f: &mut Formatter<'_>, stats: &AggregateStatistics) -> std::fmt::Result {
        let timings = [
            ("time duration", &stats.duration),
            ("RTT value", &stats.rtt),
        ];
        for (label, s) in timings {
            writeln!(f, "Minimum {label}: {:.4}", s.min)?;
            writeln!(f, "Mean {label}: {:.4}", s.mean)?;
            writeln!(f, "Maximum {label}: {:.4}", s.max)?;
        }
        let counts = [
            ("number of packets", &stats.packets),
            ("receive window size", &stats.receive_window),
        ];
        for (label, s) in counts {
            writeln!(f, "Minimum {label} {BOTH_DIRECTIONS}: {:.0}", s.min)?;
            writeln!(f, "Mean {label} {BOTH_DIRECTIONS}: {:.0}", s.mean)?;
            writeln!(f, "Maximum {label} {BOTH_DIRECTIONS}: {:.0}", s.max)?;
        }
        Ok(())
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let connections = &self.connections;
        writeln!(f, "A) Total number of connections: {}", connections.len())?;
        writeln!(f, "{SECTION_RULE}")?;

        writeln!(f, "B) Connection Details")?;
        for (i, conn) in connections.iter().enumerate() {
            Self::fmt_connection(f, i + 1, conn)?;
        }
        writeln!(f, "{SECTION_RULE}")?;

        writeln!(f, "C) General Information")?;
        writeln!(
            f,
            "Total number of complete TCP connections: {}",
            connections.complete_count()
        )?;
        writeln!(
            f,
            "Number of reset TCP connections: {}",
            connections.reset_count()
        )?;
        writeln!(
            f,
            "Number of TCP connections that were still open when the trace capture ended: {}",
            connections.open_count()
        )?;
        writeln!(
            f,
            "Number of TCP connections established before the capture started: {}",
            connections.established_before_capture_count()
        )?;
        writeln!(f, "{SECTION_RULE}")?;

        writeln!(f, "D) Complete TCP Connections")?;
        match &self.statistics {
            Some(stats) => Self::fmt_statistics(f, stats),
            None => writeln!(f, "No complete TCP connections"),
        }
    }
}
