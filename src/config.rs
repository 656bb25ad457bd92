// src/config.rs
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::ScopeError;

/// Arduino pin names for the 16-bit field, most significant bit first:
/// pins A5..A2 then 13..2.
const PIN_LABELS: [&str; 16] = [
    "A5", "A4", "A3", "A2", "13", "12", "11", "10", "9", "8", "7", "6", "5", "4", "3", "2",
];

/// Which end of the digital bit-field maps to channel 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub analog_channels: usize,
    pub digital_channels: usize,
    pub digital_width_bits: u32,
    pub bit_order: BitOrder,
    /// Full-scale value per analog channel. Empty means 5.0 for every channel.
    pub voltage_scale: Vec<f64>,
    pub analog_capacity: usize,
    pub digital_capacity: usize,
    pub redraw_interval_ms: u64,
    pub digital_decimation: u32,
    pub metrics_interval_ms: u64,
    pub warmup_lines: u32,
    pub baud_rate: u32,
    pub port_name: Option<String>,
    pub read_timeout_ms: u64,
    pub simulation_rate_hz: u32,
    pub analog_labels: Vec<String>,
    pub digital_labels: Vec<String>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            analog_channels: 2,
            digital_channels: 16,
            digital_width_bits: 16,
            bit_order: BitOrder::MsbFirst,
            voltage_scale: Vec::new(),
            analog_capacity: 10_001,
            digital_capacity: 10_001,
            redraw_interval_ms: 40,
            digital_decimation: 25,
            metrics_interval_ms: 100,
            warmup_lines: 5,
            baud_rate: 2_000_000,
            port_name: None,
            read_timeout_ms: 50,
            simulation_rate_hz: 1000,
            analog_labels: Vec::new(),
            digital_labels: Vec::new(),
        }
    }
}

impl AcquisitionConfig {
    pub const DEFAULT_SCALE: f64 = 5.0;

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScopeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScopeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| ScopeError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScopeError> {
        let fail = |msg: String| Err(ScopeError::Configuration(msg));
        if self.analog_channels + self.digital_channels == 0 {
            return fail("at least one analog or digital channel is required".into());
        }
        if self.digital_width_bits % 4 != 0 || !(4..=32).contains(&self.digital_width_bits) {
            return fail(format!(
                "digital width must be a multiple of 4 between 4 and 32 bits, got {}",
                self.digital_width_bits
            ));
        }
        if self.digital_channels > self.digital_width_bits as usize {
            return fail(format!(
                "{} digital channels do not fit in a {}-bit field",
                self.digital_channels, self.digital_width_bits
            ));
        }
        if !self.voltage_scale.is_empty() && self.voltage_scale.len() != self.analog_channels {
            return fail(format!(
                "voltage_scale has {} entries for {} analog channels",
                self.voltage_scale.len(),
                self.analog_channels
            ));
        }
        if let Some(bad) = self
            .voltage_scale
            .iter()
            .find(|s| !s.is_finite() || **s <= 0.0)
        {
            return fail(format!("voltage scale must be positive, got {bad}"));
        }
        if self.analog_capacity == 0 || self.digital_capacity == 0 {
            return fail("window capacity must be at least one sample".into());
        }
        if self.redraw_interval_ms == 0 {
            return fail("redraw interval must be greater than zero".into());
        }
        if self.digital_decimation == 0 {
            return fail("digital decimation must be at least 1".into());
        }
        if self.baud_rate == 0 {
            return fail("baud rate must be greater than zero".into());
        }
        if !self.analog_labels.is_empty() && self.analog_labels.len() != self.analog_channels {
            return fail("analog_labels must name every analog channel".into());
        }
        if !self.digital_labels.is_empty() && self.digital_labels.len() != self.digital_channels {
            return fail("digital_labels must name every digital channel".into());
        }
        Ok(())
    }

    pub fn scale_for(&self, channel: usize) -> f64 {
        self.voltage_scale
            .get(channel)
            .copied()
            .unwrap_or(Self::DEFAULT_SCALE)
    }

    /// Upper bound of the analog y-axis.
    pub fn analog_full_scale(&self) -> f64 {
        (0..self.analog_channels)
            .map(|c| self.scale_for(c))
            .fold(0.0, f64::max)
            .max(f64::EPSILON)
    }

    pub fn analog_labels(&self) -> Vec<String> {
        if !self.analog_labels.is_empty() {
            return self.analog_labels.clone();
        }
        (0..self.analog_channels).map(|i| format!("A{i}")).collect()
    }

    pub fn digital_labels(&self) -> Vec<String> {
        if !self.digital_labels.is_empty() {
            return self.digital_labels.clone();
        }
        if self.digital_channels == PIN_LABELS.len() {
            let pins = PIN_LABELS.iter().map(|s| s.to_string());
            return match self.bit_order {
                BitOrder::MsbFirst => pins.collect(),
                BitOrder::LsbFirst => pins.rev().collect(),
            };
        }
        (0..self.digital_channels).map(|i| format!("D{i}")).collect()
    }

    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
