// src/types.rs
use crate::drivers::{MetricsSnapshot, SessionState};

// 数据来源
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum ConnectionMode {
    Simulation,
    /// Serial device by OS port name. Empty falls back to `port_name` from the config.
    Serial(String),
}

// GUI 发给后台的命令
#[derive(Clone, Debug, PartialEq)]
pub enum ScopeCommand {
    Connect(ConnectionMode),
    Disconnect,
    RefreshPorts,
    StartRecording(String),
    StopRecording,
    Shutdown,
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug, PartialEq)]
pub enum ScopeMessage {
    Log(String),
    State(SessionState),
    Metrics(MetricsSnapshot),
    Ports(Vec<String>),
    RecordingStatus(bool),
}
