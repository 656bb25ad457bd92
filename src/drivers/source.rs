use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::decoder::LineLayout;
use crate::drivers::ScopeError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(String),
    /// Nothing arrived before the read timeout. Callers check cancellation and read again.
    Idle,
    Done,
}

/// Byte/text stream from a device. Reads must return within a bounded time
/// so a pending read can be abandoned on cancel.
pub trait Transport: Send {
    fn read_chunk(&mut self) -> Result<ReadOutcome, ScopeError>;
    fn close(&mut self) -> Result<(), ScopeError>;
    fn describe(&self) -> String;
}

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

pub struct ManualTransport {
    queue: VecDeque<Result<ReadOutcome, ScopeError>>,
    closed: Arc<AtomicBool>,
    fail_close: bool,
}

impl ManualTransport {
    pub fn new(outcomes: impl IntoIterator<Item = Result<ReadOutcome, ScopeError>>) -> Self {
        Self {
            queue: outcomes.into_iter().collect(),
            closed: Arc::new(AtomicBool::new(false)),
            fail_close: false,
        }
    }

    pub fn from_chunks<S: Into<String>>(chunks: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            chunks
                .into_iter()
                .map(|c| Ok(ReadOutcome::Data(c.into())))
                .chain(std::iter::once(Ok(ReadOutcome::Done))),
        )
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Transport for ManualTransport {
    fn read_chunk(&mut self) -> Result<ReadOutcome, ScopeError> {
        self.queue.pop_front().unwrap_or(Ok(ReadOutcome::Idle))
    }

    fn close(&mut self) -> Result<(), ScopeError> {
        self.closed.store(true, Ordering::Release);
        if self.fail_close {
            return Err(ScopeError::Transport(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "close failed",
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "manual".to_string()
    }
}

/// Analog channels carry phase-shifted sines, the digital field counts up
/// once per line. Chunks end at random positions.
pub struct SimulatedTransport {
    layout: LineLayout,
    rng: StdRng,
    line_index: u64,
    pending: String,
    lines_per_chunk: usize,
    corruption: f64,
    rate_hz: u32,
    closed: bool,
}

impl SimulatedTransport {
    pub fn new(layout: LineLayout, seed: u64, rate_hz: u32) -> Self {
        Self {
            layout,
            rng: StdRng::seed_from_u64(seed),
            line_index: 0,
            pending: String::new(),
            lines_per_chunk: 16,
            corruption: 0.0,
            rate_hz,
            closed: false,
        }
    }

    pub fn with_corruption(mut self, probability: f64) -> Self {
        self.corruption = probability.clamp(0.0, 1.0);
        self
    }

    pub fn with_lines_per_chunk(mut self, lines: usize) -> Self {
        self.lines_per_chunk = lines.max(1);
        self
    }

    pub fn lines_generated(&self) -> u64 {
        self.line_index
    }

    pub fn line_at(&self, index: u64) -> String {
        let mut line = String::with_capacity(self.layout.line_width());
        for channel in 0..self.layout.analog_channels() {
            let phase = index as f64 / 200.0 + channel as f64 * TAU / 4.0;
            let code = ((phase.sin() + 1.0) * 127.5).round() as u8;
            line.push_str(&format!("{code:02x}"));
        }
        let digits = (self.layout.digital_width_bits / 4) as usize;
        let mask = if self.layout.digital_width_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << self.layout.digital_width_bits) - 1
        };
        let field = (index as u32) & mask;
        line.push_str(&format!("{:0width$x}", field, width = digits));
        line
    }

    fn generate(&mut self) {
        for _ in 0..self.lines_per_chunk {
            let mut line = self.line_at(self.line_index);
            self.line_index += 1;
            if self.corruption > 0.0 && self.rng.gen_bool(self.corruption) {
                let drop_at = self.rng.gen_range(0..line.len());
                line.remove(drop_at);
            }
            self.pending.push_str(&line);
            self.pending.push('\n');
        }
    }
}

impl Transport for SimulatedTransport {
    fn read_chunk(&mut self) -> Result<ReadOutcome, ScopeError> {
        if self.closed {
            return Ok(ReadOutcome::Done);
        }
        if self.pending.len() < self.layout.line_width() + 1 {
            self.generate();
            if self.rate_hz > 0 {
                let secs = self.lines_per_chunk as f64 / self.rate_hz as f64;
                thread::sleep(Duration::from_secs_f64(secs));
            }
        }
        // Generated text is ASCII, any split point is a char boundary.
        let take = self.rng.gen_range(1..=self.pending.len());
        let rest = self.pending.split_off(take);
        let chunk = std::mem::replace(&mut self.pending, rest);
        Ok(ReadOutcome::Data(chunk))
    }

    fn close(&mut self) -> Result<(), ScopeError> {
        self.closed = true;
        self.pending.clear();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("simulated device ({} Hz)", self.rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::decoder::SampleDecoder;
    use crate::drivers::framer::LineFramer;

    #[test]
    fn manual_transport_plays_script_then_idles() {
        let mut transport = ManualTransport::from_chunks(["ab", "cd\n"]);
        assert_eq!(
            transport.read_chunk().unwrap(),
            ReadOutcome::Data("ab".into())
        );
        assert_eq!(
            transport.read_chunk().unwrap(),
            ReadOutcome::Data("cd\n".into())
        );
        assert_eq!(transport.read_chunk().unwrap(), ReadOutcome::Done);
        assert_eq!(transport.read_chunk().unwrap(), ReadOutcome::Idle);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn simulated_lines_decode_cleanly() {
        let layout = LineLayout::default();
        let decoder = SampleDecoder::new(layout.clone());
        let mut transport = SimulatedTransport::new(layout, 7, 0);
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        while lines.len() < 100 {
            match transport.read_chunk().unwrap() {
                ReadOutcome::Data(chunk) => lines.extend(framer.push(&chunk)),
                other => panic!("unexpected {other:?}"),
            }
        }
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line, &transport.line_at(i as u64));
            assert!(decoder.decode(line).is_ok(), "line {i}: {line}");
        }
    }

    #[test]
    fn corruption_produces_short_lines() {
        let layout = LineLayout::default();
        let width = layout.line_width();
        let mut transport = SimulatedTransport::new(layout, 3, 0).with_corruption(1.0);
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        while lines.len() < 10 {
            if let ReadOutcome::Data(chunk) = transport.read_chunk().unwrap() {
                lines.extend(framer.push(&chunk));
            }
        }
        assert!(lines.iter().all(|l| l.len() == width - 1));
    }

    #[test]
    fn closed_simulation_reports_done() {
        let mut transport = SimulatedTransport::new(LineLayout::default(), 1, 0);
        transport.close().unwrap();
        assert_eq!(transport.read_chunk().unwrap(), ReadOutcome::Done);
    }
}
