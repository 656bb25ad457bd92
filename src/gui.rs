// src/gui.rs
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use eframe::egui;
use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotPoints, VLine};

use hexscope::config::AcquisitionConfig;
use hexscope::drivers::{
    shared_store, GroupFrame, MetricsSnapshot, PlotGroup, PlotStyle, RedrawScheduler,
    SessionState, SharedStore, SnapshotRenderer, DIGITAL_LANE_HEIGHT,
};
use hexscope::engine;
use hexscope::types::*;

const MAX_LOG_LINES: usize = 8;
const ANALOG_COLORS: [Color32; 4] = [
    Color32::from_rgb(0, 255, 255),
    Color32::YELLOW,
    Color32::from_rgb(255, 0, 255),
    Color32::GREEN,
];
const DIGITAL_COLOR: Color32 = Color32::from_rgb(120, 200, 255);

pub struct ScopeApp {
    // 系统状态
    session_state: SessionState,
    is_recording: bool,
    use_serial: bool,
    selected_port: String,
    ports: Vec<String>,

    // 绘图
    store: SharedStore,
    scheduler: RedrawScheduler,
    view: SnapshotRenderer,
    analog_window: usize,
    digital_window: usize,

    // 通道数据面板
    metrics: MetricsSnapshot,
    record_label: String,
    log_messages: Vec<String>,

    // 通讯管道
    rx: Receiver<ScopeMessage>,
    tx_cmd: Sender<ScopeCommand>,
}

impl ScopeApp {
    pub fn new(config: AcquisitionConfig) -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let store = shared_store(&config);

        // 启动后台采集线程; 关闭窗口时 tx_cmd 被丢弃, 线程随之退出
        engine::spawn_thread(config.clone(), SharedStore::clone(&store), tx, rx_cmd);
        tx_cmd.send(ScopeCommand::RefreshPorts).ok();

        Self {
            session_state: SessionState::Idle,
            is_recording: false,
            use_serial: config.port_name.is_some(),
            selected_port: config.port_name.clone().unwrap_or_default(),
            ports: Vec::new(),
            store,
            scheduler: RedrawScheduler::new(&config),
            view: SnapshotRenderer::new(PlotStyle::default()),
            analog_window: config.analog_capacity,
            digital_window: config.digital_capacity,
            metrics: MetricsSnapshot {
                analog_channels: config.analog_channels,
                digital_channels: config.digital_channels,
                ..Default::default()
            },
            record_label: "capture".to_owned(),
            log_messages: vec!["hexscope ready.".to_owned()],
            rx,
            tx_cmd,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {msg}"));
        if self.log_messages.len() > MAX_LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn send(&mut self, cmd: ScopeCommand) {
        if self.tx_cmd.send(cmd).is_err() {
            self.log("engine thread is gone");
        }
    }

    /// 模拟通道量程, 由布局推送决定
    fn analog_y_max(&self) -> f64 {
        self.view.y_range(PlotGroup::Analog).map_or(5.0, |(_, hi)| hi)
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                ScopeMessage::Log(s) => self.log(&s),
                ScopeMessage::State(state) => self.session_state = state,
                ScopeMessage::Metrics(m) => self.metrics = m,
                ScopeMessage::Ports(ports) => {
                    if self.selected_port.is_empty() {
                        if let Some(first) = ports.first() {
                            self.selected_port = first.clone();
                        }
                    }
                    self.ports = ports;
                }
                ScopeMessage::RecordingStatus(b) => self.is_recording = b,
            }
        }
    }

    fn export_png(&mut self, group: PlotGroup) {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let name = match group {
            PlotGroup::Analog => "analog",
            PlotGroup::Digital => "digital",
        };
        let path = PathBuf::from(format!("{}_{name}_{ts}.png", self.record_label));
        let result = self
            .view
            .render_png(group)
            .and_then(|png| std::fs::write(&path, png).map_err(Into::into));
        match result {
            Ok(()) => self.log(&format!("📷 Saved {}", path.display())),
            Err(e) => self.log(&format!("❌ Export failed: {e}")),
        }
    }

    fn control_panel(&mut self, ui: &mut egui::Ui) {
        ui.add_space(10.0);
        ui.heading("hexscope");
        ui.label("Serial Logic Analyzer");
        ui.separator();

        let idle = self.session_state == SessionState::Idle;
        ui.add_enabled_ui(idle, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.use_serial, false, "SIM");
                ui.selectable_value(&mut self.use_serial, true, "SERIAL");
            });
            if self.use_serial {
                ui.horizontal(|ui| {
                    egui::ComboBox::from_id_source("port")
                        .selected_text(if self.selected_port.is_empty() {
                            "(no port)"
                        } else {
                            self.selected_port.as_str()
                        })
                        .show_ui(ui, |ui| {
                            for port in &self.ports {
                                ui.selectable_value(&mut self.selected_port, port.clone(), port);
                            }
                        });
                    if ui.button("🔄").clicked() {
                        self.tx_cmd.send(ScopeCommand::RefreshPorts).ok();
                    }
                });
            }
        });

        let btn_txt = if idle { "CONNECT" } else { "DISCONNECT" };
        if ui.button(btn_txt).clicked() {
            if idle {
                let mode = if self.use_serial {
                    ConnectionMode::Serial(self.selected_port.clone())
                } else {
                    ConnectionMode::Simulation
                };
                self.send(ScopeCommand::Connect(mode));
            } else {
                self.send(ScopeCommand::Disconnect);
            }
        }
        ui.label(format!("State: {:?}", self.session_state));

        ui.add_space(10.0);
        ui.separator();
        ui.label("DISPLAY");
        ui.horizontal(|ui| {
            for (group, name) in [(PlotGroup::Analog, "Analog"), (PlotGroup::Digital, "Digital")] {
                let text = if self.scheduler.is_frozen(group) {
                    format!("▶ {name}")
                } else {
                    format!("⏸ {name}")
                };
                if ui.button(text).clicked() {
                    self.scheduler.toggle_freeze(group, &self.store, &mut self.view);
                }
            }
        });
        ui.horizontal(|ui| {
            if ui.button("⏸ Freeze all").clicked() {
                self.scheduler.freeze_both(true, &self.store, &mut self.view);
            }
            if ui.button("▶ Resume all").clicked() {
                self.scheduler.freeze_both(false, &self.store, &mut self.view);
            }
        });
        let analog = ui.add(egui::Slider::new(&mut self.analog_window, 100..=50_000).text("Analog window"));
        if analog.drag_released() || (analog.changed() && !analog.dragged()) {
            self.scheduler
                .resize_window(PlotGroup::Analog, self.analog_window, &self.store);
        }
        let digital =
            ui.add(egui::Slider::new(&mut self.digital_window, 100..=50_000).text("Digital window"));
        if digital.drag_released() || (digital.changed() && !digital.dragged()) {
            self.scheduler
                .resize_window(PlotGroup::Digital, self.digital_window, &self.store);
        }

        ui.add_space(10.0);
        ui.separator();
        ui.label("CAPTURE");
        ui.text_edit_singleline(&mut self.record_label);
        ui.horizontal(|ui| {
            let rec_btn_text = if self.is_recording { "⏹ STOP" } else { "🔴 RECORD" };
            let rec_btn_col = if self.is_recording { Color32::RED } else { Color32::DARK_GRAY };
            if ui
                .add(egui::Button::new(egui::RichText::new(rec_btn_text).color(Color32::WHITE)).fill(rec_btn_col))
                .clicked()
            {
                let cmd = if self.is_recording {
                    ScopeCommand::StopRecording
                } else {
                    ScopeCommand::StartRecording(self.record_label.clone())
                };
                self.send(cmd);
            }
            if ui.button("📷 PNG").clicked() {
                self.export_png(PlotGroup::Analog);
                self.export_png(PlotGroup::Digital);
            }
        });
        if self.is_recording {
            ui.label(egui::RichText::new("Recording...").color(Color32::RED).small());
        }

        ui.add_space(10.0);
        ui.separator();
        ui.label("CHANNEL DATA");
        ui.monospace(self.metrics.summary());

        ui.add_space(10.0);
        egui::ScrollArea::vertical().max_height(120.0).show(ui, |ui| {
            for m in &self.log_messages {
                ui.monospace(m);
            }
        });
    }
}

fn frame_lines(frame: &GroupFrame, offset: impl Fn(usize) -> f64) -> Vec<(usize, Vec<[f64; 2]>)> {
    frame
        .segments
        .iter()
        .enumerate()
        .flat_map(|(ch, runs)| {
            let dy = offset(ch);
            runs.iter()
                .map(move |run| (ch, run.iter().map(|[x, y]| [*x, y + dy]).collect()))
        })
        .collect()
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 消息处理
        self.drain_messages();

        // 2. 定时重绘 (analog 每 tick, digital 按抽取倍数)
        self.scheduler.poll(Instant::now(), &self.store, &mut self.view);
        ctx.request_repaint_after(self.scheduler.interval());

        // 3. UI 绘制
        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::SidePanel::left("L").min_width(300.0).show(ctx, |ui| {
            self.control_panel(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let half = ui.available_height() / 2.0 - 10.0;

            if let Some(frame) = self.view.frame(PlotGroup::Analog) {
                let capacity = frame.capacity as f64;
                let y_max = self.analog_y_max();
                let lines = frame_lines(frame, |_| 0.0);
                Plot::new("analog_plot")
                    .height(half)
                    .legend(Legend::default())
                    .allow_drag(false)
                    .allow_zoom(false)
                    .include_x(0.0)
                    .include_x(capacity)
                    .include_y(0.0)
                    .include_y(y_max)
                    .show(ui, |plot_ui| {
                        for (ch, points) in lines {
                            let col = ANALOG_COLORS[ch % ANALOG_COLORS.len()];
                            let name = frame.labels.get(ch).cloned().unwrap_or_default();
                            plot_ui.line(Line::new(PlotPoints::new(points)).name(name).color(col));
                        }
                        plot_ui.vline(VLine::new(frame.cursor as f64).color(Color32::from_gray(90)));
                    });
            } else {
                ui.label("Connect first.");
            }

            if let Some(frame) = self.view.frame(PlotGroup::Digital) {
                let lanes = frame.segments.len();
                let capacity = frame.capacity as f64;
                let lines = frame_lines(frame, |ch| (lanes - 1 - ch) as f64 * DIGITAL_LANE_HEIGHT);
                Plot::new("digital_plot")
                    .height(half)
                    .legend(Legend::default())
                    .allow_drag(false)
                    .allow_zoom(false)
                    .include_x(0.0)
                    .include_x(capacity)
                    .include_y(0.0)
                    .include_y(lanes as f64 * DIGITAL_LANE_HEIGHT)
                    .show(ui, |plot_ui| {
                        for (ch, points) in lines {
                            let name = frame.labels.get(ch).cloned().unwrap_or_default();
                            plot_ui.line(Line::new(PlotPoints::new(points)).name(name).color(DIGITAL_COLOR));
                        }
                        plot_ui.vline(VLine::new(frame.cursor as f64).color(Color32::from_gray(90)));
                    });
            }
        });
    }
}

