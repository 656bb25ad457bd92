use std::time::{Duration, Instant};

use serde::Serialize;

/// Throughput counters for one connection.
///
/// The first `warmup` accepted lines are ignored and the clock starts on the
/// line after them, so connection setup latency does not skew the rate.
#[derive(Clone, Debug)]
pub struct AcquisitionMetrics {
    warmup: u32,
    warmup_seen: u32,
    started_at: Option<Instant>,
    elapsed: Duration,
    samples: u64,
    rejected: u64,
}

impl AcquisitionMetrics {
    pub fn new(warmup: u32) -> Self {
        Self {
            warmup,
            warmup_seen: 0,
            started_at: None,
            elapsed: Duration::ZERO,
            samples: 0,
            rejected: 0,
        }
    }

    pub fn record_accepted(&mut self, now: Instant) {
        match self.started_at {
            Some(start) => {
                self.samples += 1;
                self.elapsed = now.saturating_duration_since(start);
            }
            None if self.warmup_seen >= self.warmup => {
                self.started_at = Some(now);
            }
            None => self.warmup_seen += 1,
        }
    }

    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_clock_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Accepted samples per second since the clock started.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.samples as f64 / secs
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.warmup);
    }

    pub fn snapshot(&self, analog_channels: usize, digital_channels: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            analog_channels,
            digital_channels,
            elapsed_secs: self.elapsed.as_secs_f64(),
            samples: self.samples,
            rejected: self.rejected,
            rate: self.rate(),
        }
    }
}

/// Copy of the counters handed to the UI.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub analog_channels: usize,
    pub digital_channels: usize,
    pub elapsed_secs: f64,
    pub samples: u64,
    pub rejected: u64,
    pub rate: f64,
}

impl MetricsSnapshot {
    /// Text for the channel data pane.
    pub fn summary(&self) -> String {
        format!(
            "Channels:              {} analog, {} digital\n\
             Elapsed Time:          {:.2} seconds\n\
             Data Points Collected: {}\n\
             Rejected Lines:        {}\n\
             DPS:                   {:.2} Sps",
            self.analog_channels,
            self.digital_channels,
            self.elapsed_secs,
            self.samples,
            self.rejected,
            self.rate
        )
    }
}
