// src/engine.rs
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info};

use crate::config::AcquisitionConfig;
use crate::drivers::{
    available_ports, AcquisitionSession, LineLayout, PumpOutcome, ScopeError, SerialTransport,
    SessionState, SharedStore, SimulatedTransport, Transport,
};
use crate::types::*;

const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Opens the transport a connection mode asks for.
pub fn open_transport(
    mode: &ConnectionMode,
    config: &AcquisitionConfig,
) -> Result<Box<dyn Transport>, ScopeError> {
    match mode {
        ConnectionMode::Simulation => Ok(Box::new(SimulatedTransport::new(
            LineLayout::from_config(config),
            rand::random(),
            config.simulation_rate_hz,
        ))),
        ConnectionMode::Serial(name) => {
            let name = if name.is_empty() {
                config.port_name.clone().unwrap_or_default()
            } else {
                name.clone()
            };
            if name.is_empty() {
                return Err(ScopeError::Configuration("no serial port selected".into()));
            }
            let port = SerialTransport::open(&name, config.baud_rate, config.read_timeout())?;
            Ok(Box::new(port))
        }
    }
}

/// Command handling and read loop of the acquisition thread, without the thread.
pub struct AcquisitionEngine {
    session: AcquisitionSession,
    tx: Sender<ScopeMessage>,
    record_dir: PathBuf,
    metrics_interval: Duration,
    last_metrics: Instant,
    last_state: SessionState,
}

impl AcquisitionEngine {
    pub fn new(config: AcquisitionConfig, store: SharedStore, tx: Sender<ScopeMessage>) -> Self {
        let metrics_interval = config.metrics_interval();
        Self {
            session: AcquisitionSession::new(config, store),
            tx,
            record_dir: PathBuf::from("."),
            metrics_interval,
            last_metrics: Instant::now(),
            last_state: SessionState::Idle,
        }
    }

    /// Directory new recordings are written to.
    pub fn with_record_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.record_dir = dir.into();
        self
    }

    pub fn session(&self) -> &AcquisitionSession {
        &self.session
    }

    pub fn is_streaming(&self) -> bool {
        self.session.state() == SessionState::Streaming
    }

    fn send(&self, msg: ScopeMessage) {
        // GUI 已关闭时忽略
        self.tx.send(msg).ok();
    }

    fn log(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{text}");
        self.send(ScopeMessage::Log(text));
    }

    fn publish_state(&mut self) {
        let state = self.session.state();
        if state != self.last_state {
            self.last_state = state;
            self.send(ScopeMessage::State(state));
        }
    }

    fn publish_final_metrics(&self) {
        self.send(ScopeMessage::Metrics(self.session.last_run_metrics().clone()));
    }

    /// Applies one command. Returns `false` once the engine should stop.
    pub fn handle_command(&mut self, cmd: ScopeCommand) -> bool {
        match cmd {
            ScopeCommand::Connect(mode) => {
                if self.session.state() != SessionState::Idle {
                    self.log("⚠️ Already connected");
                    return true;
                }
                let result = self.session.connect(|config| open_transport(&mode, config));
                match result {
                    Ok(()) => {
                        let name = self.session.transport_name().unwrap_or_default();
                        self.log(format!("✅ Connected: {name}"));
                        self.last_metrics = Instant::now();
                    }
                    Err(e) => {
                        error!("connect failed: {e}");
                        self.send(ScopeMessage::Log(format!("❌ Connect failed: {e}")));
                    }
                }
            }
            ScopeCommand::Disconnect => {
                if self.session.state() != SessionState::Idle {
                    self.session.disconnect();
                    self.publish_final_metrics();
                    self.send(ScopeMessage::RecordingStatus(false));
                    self.log("🔌 Disconnected");
                }
            }
            ScopeCommand::RefreshPorts => match available_ports() {
                Ok(ports) => self.send(ScopeMessage::Ports(ports)),
                Err(e) => self.log(format!("❌ Port scan failed: {e}")),
            },
            ScopeCommand::StartRecording(label) => {
                match self.session.start_recording(&self.record_dir, &label) {
                    Ok(path) => {
                        self.send(ScopeMessage::RecordingStatus(true));
                        self.log(format!("💾 Recording to {}", path.display()));
                    }
                    Err(e) => self.log(format!("❌ {e}")),
                }
            }
            ScopeCommand::StopRecording => {
                self.session.stop_recording();
                self.send(ScopeMessage::RecordingStatus(false));
            }
            ScopeCommand::Shutdown => {
                self.session.disconnect();
                self.publish_state();
                return false;
            }
        }
        self.publish_state();
        true
    }

    /// One pass of the read loop plus periodic metrics.
    pub fn step(&mut self) {
        if !self.is_streaming() {
            return;
        }
        match self.session.pump() {
            Ok(PumpOutcome::Ended) => {
                self.publish_final_metrics();
                self.send(ScopeMessage::RecordingStatus(false));
                self.log("🛑 Stream ended");
            }
            Ok(PumpOutcome::Cancelled) => {
                self.publish_final_metrics();
                self.send(ScopeMessage::RecordingStatus(false));
            }
            Ok(_) => {
                if self.last_metrics.elapsed() >= self.metrics_interval {
                    self.last_metrics = Instant::now();
                    self.send(ScopeMessage::Metrics(self.session.metrics()));
                }
            }
            Err(e) => {
                error!("session dropped: {e}");
                self.publish_final_metrics();
                self.send(ScopeMessage::RecordingStatus(false));
                self.send(ScopeMessage::Log(format!("❌ Connection lost: {e}")));
            }
        }
        self.publish_state();
    }
}

/// Runs the engine on its own thread until `Shutdown` arrives or the command
/// channel closes.
pub fn spawn_thread(
    config: AcquisitionConfig,
    store: SharedStore,
    tx: Sender<ScopeMessage>,
    rx_cmd: Receiver<ScopeCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut engine = AcquisitionEngine::new(config, store, tx);
        engine.log("⚙️ Acquisition engine ready.");

        loop {
            // 1. 处理 GUI 命令
            for _ in 0..10 {
                match rx_cmd.try_recv() {
                    Ok(cmd) => {
                        if !engine.handle_command(cmd) {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        engine.handle_command(ScopeCommand::Shutdown);
                        return;
                    }
                }
            }

            // 2. 数据流
            if engine.is_streaming() {
                engine.step();
            } else {
                thread::sleep(IDLE_SLEEP);
            }
        }
    })
}
