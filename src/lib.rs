// src/lib.rs
//! Serial logic-analyzer core: hex line framing, sample decoding, circular
//! sample windows and the acquisition session that ties them together.
pub mod config;
pub mod drivers;
pub mod engine;
pub mod recorder;
pub mod types;

pub use config::{AcquisitionConfig, BitOrder};
