// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod gui;

use anyhow::Context;
use eframe::egui;
use hexscope::AcquisitionConfig;

// 配置: 可选的 JSON 文件路径作为第一个参数, 缺省使用内置默认值
fn load_config() -> anyhow::Result<AcquisitionConfig> {
    match std::env::args().nth(1) {
        Some(path) => AcquisitionConfig::from_json_file(&path)
            .with_context(|| format!("loading configuration from {path}")),
        None => {
            let config = AcquisitionConfig::default();
            config.validate().context("built-in configuration")?;
            Ok(config)
        }
    }
}

// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = load_config()?;
    log::info!(
        "{} analog / {} digital channels, window {} samples",
        config.analog_channels,
        config.digital_channels,
        config.analog_capacity
    );

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title("hexscope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "hexscope",
        options,
        Box::new(move |_cc| Box::new(gui::ScopeApp::new(config))),
    )
    .map_err(|e| anyhow::anyhow!("ui failed: {e}"))
}
