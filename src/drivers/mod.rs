// src/drivers/mod.rs
// 采集链路: 串口/模拟源 -> 分行 -> 解码 -> 环形缓存 -> 重绘
pub mod decoder;
pub mod error;
pub mod framer;
pub mod metrics;
pub mod plot;
pub mod redraw;
pub mod serial;
pub mod session;
pub mod source;
pub mod store;
// 公开导出常用类型，方便外部调用
pub use decoder::{LineLayout, Rejection, Sample, SampleDecoder};
pub use error::ScopeError;
pub use framer::LineFramer;
pub use metrics::{AcquisitionMetrics, MetricsSnapshot};
pub use plot::{render_group_png, PlotStyle, SnapshotRenderer};
pub use redraw::{GroupFrame, RedrawScheduler, Renderer, DIGITAL_LANE_HEIGHT};
pub use serial::{available_ports, SerialTransport};
pub use session::{AcquisitionSession, PumpOutcome, SessionState};
pub use source::{CancelToken, ManualTransport, ReadOutcome, SimulatedTransport, Transport};
pub use store::{shared_store, ChannelSeries, PlotGroup, SampleStore, SeriesGroup, SharedStore};
