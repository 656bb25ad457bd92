use std::path::{Path, PathBuf};
use std::sync::RwLockWriteGuard;
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::AcquisitionConfig;
use crate::drivers::decoder::{LineLayout, Sample, SampleDecoder};
use crate::drivers::framer::LineFramer;
use crate::drivers::metrics::{AcquisitionMetrics, MetricsSnapshot};
use crate::drivers::source::{CancelToken, ReadOutcome, Transport};
use crate::drivers::store::{SampleStore, SharedStore};
use crate::drivers::ScopeError;
use crate::recorder::DataRecorder;

/// Connection lifecycle. `Disconnecting` always ends in `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Streaming,
    Disconnecting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpOutcome {
    Progress { accepted: usize, rejected: usize },
    Idle,
    Ended,
    Cancelled,
}

/// Owns one connection: transport, framer, decoder and metrics. Writes into
/// a store that the redraw side reads concurrently.
pub struct AcquisitionSession {
    config: AcquisitionConfig,
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
    framer: LineFramer,
    decoder: SampleDecoder,
    store: SharedStore,
    metrics: AcquisitionMetrics,
    cancel: CancelToken,
    recorder: DataRecorder,
    last_run: MetricsSnapshot,
}

impl AcquisitionSession {
    pub fn new(config: AcquisitionConfig, store: SharedStore) -> Self {
        let decoder = SampleDecoder::new(LineLayout::from_config(&config));
        let metrics = AcquisitionMetrics::new(config.warmup_lines);
        Self {
            config,
            state: SessionState::Idle,
            transport: None,
            framer: LineFramer::new(),
            decoder,
            store,
            metrics,
            cancel: CancelToken::new(),
            recorder: DataRecorder::new(),
            last_run: MetricsSnapshot::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn store(&self) -> SharedStore {
        SharedStore::clone(&self.store)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot(self.config.analog_channels, self.config.digital_channels)
    }

    pub fn last_run_metrics(&self) -> &MetricsSnapshot {
        &self.last_run
    }

    pub fn transport_name(&self) -> Option<String> {
        self.transport.as_ref().map(|t| t.describe())
    }

    /// The configuration is checked before `open` runs.
    pub fn connect<F>(&mut self, open: F) -> Result<(), ScopeError>
    where
        F: FnOnce(&AcquisitionConfig) -> Result<Box<dyn Transport>, ScopeError>,
    {
        if self.state != SessionState::Idle {
            return Err(ScopeError::InvalidState {
                state: self.state,
                action: "connect",
            });
        }
        self.config.validate()?;

        self.state = SessionState::Connecting;
        match open(&self.config) {
            Ok(transport) => {
                info!("streaming from {}", transport.describe());
                self.transport = Some(transport);
                self.framer.reset();
                self.metrics.reset();
                self.cancel.reset();
                write_store(&self.store).reset();
                self.state = SessionState::Streaming;
                Ok(())
            }
            Err(e) => {
                warn!("connect failed: {e}");
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Each completed line advances the cursor exactly once, accepted or not.
    pub fn pump(&mut self) -> Result<PumpOutcome, ScopeError> {
        if self.state != SessionState::Streaming {
            return Err(ScopeError::InvalidState {
                state: self.state,
                action: "read",
            });
        }
        if self.cancel.is_cancelled() {
            self.disconnect();
            return Ok(PumpOutcome::Cancelled);
        }
        let Some(transport) = self.transport.as_mut() else {
            self.disconnect();
            return Ok(PumpOutcome::Ended);
        };

        let chunk = match transport.read_chunk() {
            Ok(ReadOutcome::Data(chunk)) => chunk,
            Ok(ReadOutcome::Idle) if self.cancel.is_cancelled() => {
                self.disconnect();
                return Ok(PumpOutcome::Cancelled);
            }
            Ok(ReadOutcome::Idle) => return Ok(PumpOutcome::Idle),
            Ok(ReadOutcome::Done) => {
                info!("stream ended by device");
                self.disconnect();
                return Ok(PumpOutcome::Ended);
            }
            Err(e) => {
                warn!("read failed, dropping connection: {e}");
                self.disconnect();
                return Err(e);
            }
        };

        let lines = self.framer.push(&chunk);
        let results: Vec<_> = lines.iter().map(|l| self.decoder.decode(l)).collect();
        {
            let mut store = write_store(&self.store);
            for result in &results {
                store.record(result.as_ref().ok());
            }
        }

        let now = Instant::now();
        let (mut accepted, mut rejected) = (0, 0);
        for (line, result) in lines.iter().zip(results) {
            match result {
                Ok(sample) => {
                    accepted += 1;
                    self.metrics.record_accepted(now);
                    self.record_to_file(&sample);
                }
                Err(reason) => {
                    rejected += 1;
                    self.metrics.record_rejected();
                    debug!("skipped line {line:?}: {reason}");
                }
            }
        }
        Ok(PumpOutcome::Progress { accepted, rejected })
    }

    pub fn run(&mut self) -> Result<(), ScopeError> {
        loop {
            match self.pump()? {
                PumpOutcome::Ended | PumpOutcome::Cancelled => return Ok(()),
                PumpOutcome::Progress { .. } | PumpOutcome::Idle => {}
            }
        }
    }

    // 关闭失败只记日志, 状态总是回到 Idle; store 保留最后一帧
    pub fn disconnect(&mut self) -> MetricsSnapshot {
        let snapshot = self.metrics();
        if self.state == SessionState::Idle {
            return snapshot;
        }
        self.state = SessionState::Disconnecting;
        self.cancel.cancel();
        if let Some(mut transport) = self.transport.take() {
            let name = transport.describe();
            if let Err(e) = transport.close() {
                warn!("error closing {name}: {e}");
            } else {
                info!("disconnected from {name}");
            }
        }
        self.framer.reset();
        self.metrics.reset();
        self.recorder.stop();
        self.last_run = snapshot.clone();
        self.state = SessionState::Idle;
        snapshot
    }

    pub fn start_recording(&mut self, dir: &Path, label: &str) -> Result<PathBuf, ScopeError> {
        let mut labels = self.config.analog_labels();
        labels.extend(self.config.digital_labels());
        self.recorder.start(dir, label, &labels)
    }

    pub fn stop_recording(&mut self) {
        self.recorder.stop();
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    fn record_to_file(&mut self, sample: &Sample) {
        if let Err(e) = self.recorder.write_record(sample) {
            warn!("recording stopped: {e}");
            self.recorder.stop();
        }
    }
}

impl Drop for AcquisitionSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// poisoned lock: at worst one half-written slot
pub(crate) fn write_store(store: &SharedStore) -> RwLockWriteGuard<'_, SampleStore> {
    store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
