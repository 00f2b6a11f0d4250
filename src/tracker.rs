use std::{collections::HashMap, ops::Deref};

use crate::{Endpoint, ParsedFrame};

/// Direction-independent identity of a TCP conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    low: Endpoint,
    high: Endpoint,
}

impl ConnectionKey {
    /// Orders the two endpoints so `(a, b)` and `(b, a)` give the same key.
    pub fn normalize(a: Endpoint, b: Endpoint) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn endpoints(&self) -> (Endpoint, Endpoint) {
        (self.low, self.high)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    /// Sender of the first frame seen; defines the forward direction.
    pub source: Endpoint,
    pub destination: Endpoint,
    pub syn_count: u32,
    pub fin_count: u32,
    pub rst_count: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub first_frame_syn: bool,
}

impl Connection {
    fn open(frame: &ParsedFrame) -> Self {
        Self {
            source: frame.source,
            destination: frame.destination,
            syn_count: 0,
            fin_count: 0,
            rst_count: 0,
            start_time: frame.timestamp,
            end_time: frame.timestamp,
            packets_sent: 0,
            packets_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            first_frame_syn: frame.flags.syn(),
        }
    }

    fn record(&mut self, frame: &ParsedFrame) {
        self.end_time = frame.timestamp;

        if frame.flags.syn() {
            self.syn_count += 1;
        }
        if frame.flags.fin() {
            self.fin_count += 1;
        }
        if frame.flags.rst() {
            self.rst_count += 1;
        }

        let bytes = frame.length as u64;
        if frame.source == self.source {
            self.packets_sent += 1;
            self.bytes_sent += bytes;
        } else {
            self.packets_received += 1;
            self.bytes_received += bytes;
        }
    }

    fn rebase(&mut self, origin: f64) {
        self.start_time -= origin;
        self.end_time -= origin;
    }

    /// `S<syn count>F<fin count>`.
    pub fn status(&self) -> String {
        format!("S{}F{}", self.syn_count, self.fin_count)
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn total_packets(&self) -> u64 {
        self.packets_sent + self.packets_received
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_sent + self.bytes_received
    }

    pub fn is_complete(&self) -> bool {
        self.fin_count >= 1
    }

    pub fn is_reset(&self) -> bool {
        self.rst_count >= 1
    }

    pub fn is_open(&self) -> bool {
        self.fin_count == 0
    }

    /// The first frame seen for this conversation carried no SYN.
    pub fn established_before_capture(&self) -> bool {
        !self.first_frame_syn
    }
}

/// Owns every connection for the duration of one pass.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    connections: Vec<Connection>,
    index: HashMap<ConnectionKey, usize>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, frame: &ParsedFrame) {
        let key = ConnectionKey::normalize(frame.source, frame.destination);
        let slot = *self.index.entry(key).or_insert_with(|| {
            log::debug!(
                "new connection {} -> {} (syn: {})",
                frame.source,
                frame.destination,
                frame.flags.syn()
            );
            self.connections.push(Connection::open(frame));
            self.connections.len() - 1
        });
        self.connections[slot].record(frame);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Ends the pass, making times relative to the earliest connection start.
    pub fn finish(self) -> Connections {
        let mut connections = self.connections;
        let origin = connections
            .iter()
            .map(|c| c.start_time)
            .fold(f64::INFINITY, f64::min);
        if origin.is_finite() {
            for connection in &mut connections {
                connection.rebase(origin);
            }
        }
        Connections(connections)
    }
}

/// Read-only result of a pass, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connections(Vec<Connection>);

impl Connections {
    pub fn complete(&self) -> impl Iterator<Item = &Connection> {
        self.0.iter().filter(|c| c.is_complete())
    }

    pub fn complete_count(&self) -> usize {
        self.complete().count()
    }

    pub fn reset_count(&self) -> usize {
        self.0.iter().filter(|c| c.is_reset()).count()
    }

    pub fn open_count(&self) -> usize {
        self.0.iter().filter(|c| c.is_open()).count()
    }

    pub fn established_before_capture_count(&self) -> usize {
        self.0
            .iter()
            .filter(|c| c.established_before_capture())
            .count()
    }
}

impl Deref for Connections {
    type Target = [Connection];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
