use std::path::PathBuf;
use thiserror::Error;

use crate::drivers::session::SessionState;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("cannot {action} while session is {state:?}")]
    InvalidState {
        state: SessionState,
        action: &'static str,
    },
    #[error("recorder error: {0}")]
    Recorder(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl ScopeError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ScopeError::Transport(_) | ScopeError::Serial(_))
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Plot(value.to_string())
    }
}
