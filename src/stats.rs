use crate::Connection;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl Summary {
    /// `None` for an empty input.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0_usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in values {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }
        (count > 0).then(|| Self {
            min,
            mean: sum / count as f64,
            max,
        })
    }

    pub const fn zero() -> Self {
        Self {
            min: 0.0,
            mean: 0.0,
            max: 0.0,
        }
    }
}

/// Statistics over the complete (FIN seen) connections.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AggregateStatistics {
    pub complete: usize,
    pub duration: Summary,
    /// Duration stands in for RTT; no handshake timing is measured.
    pub rtt: Summary,
    pub packets: Summary,
    /// Window sizes are not decoded, so this is always zero.
    pub receive_window: Summary,
}

impl AggregateStatistics {
    /// `None` when no connection is complete.
    pub fn compute(connections: &[Connection]) -> Option<Self> {
        let complete = connections
            .iter()
            .filter(|c| c.is_complete())
            .collect::<Vec<_>>();
        let duration = Summary::of(complete.iter().map(|c| c.duration()))?;
        let packets = Summary::of(complete.iter().map(|c| c.total_packets() as f64))?;
        Some(Self {
            complete: complete.len(),
            duration,
            rtt: duration,
            packets,
            receive_window: Summary::zero(),
        })
    }
}
