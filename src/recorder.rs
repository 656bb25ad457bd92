// src/recorder.rs
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::drivers::{Sample, ScopeError};

/// Appends accepted samples to a CSV file, one row per line.
pub struct DataRecorder {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    start_time: Instant,
    rows: u64,
}

impl Default for DataRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataRecorder {
    pub fn new() -> Self {
        Self {
            writer: None,
            path: None,
            start_time: Instant::now(),
            rows: 0,
        }
    }

    /// Opens `<dir>/<label>_<unix-ts>.csv` and writes the header row.
    /// Any recording already in progress is closed first.
    pub fn start(
        &mut self,
        dir: &Path,
        label: &str,
        channel_labels: &[String],
    ) -> Result<PathBuf, ScopeError> {
        self.stop();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let label = sanitize(label);
        let path = dir.join(format!("{label}_{timestamp}.csv"));

        let file = File::create(&path)
            .map_err(|e| ScopeError::Recorder(format!("{}: {e}", path.display())))?;
        let mut w = BufWriter::new(file);
        // 表头: elapsed_s, 各通道名
        writeln!(w, "elapsed_s,{}", channel_labels.join(","))
            .map_err(|e| ScopeError::Recorder(e.to_string()))?;

        self.writer = Some(w);
        self.path = Some(path.clone());
        self.start_time = Instant::now();
        self.rows = 0;
        info!("recording started: {}", path.display());
        Ok(path)
    }

    pub fn stop(&mut self) {
        if let Some(mut w) = self.writer.take() {
            if let Err(e) = w.flush() {
                warn!("failed to flush recording: {e}");
            }
            if let Some(path) = self.path.take() {
                info!("recording saved: {} ({} rows)", path.display(), self.rows);
            }
        }
    }

    pub fn write_record(&mut self, sample: &Sample) -> Result<(), ScopeError> {
        let Some(w) = &mut self.writer else {
            return Ok(());
        };
        let t = self.start_time.elapsed().as_secs_f64();
        let mut row = format!("{t:.4}");
        for v in &sample.analog {
            row.push_str(&format!(",{v:.3}"));
        }
        for b in &sample.digital {
            row.push_str(&format!(",{b}"));
        }
        writeln!(w, "{row}").map_err(|e| ScopeError::Recorder(e.to_string()))?;
        self.rows += 1;
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl Drop for DataRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["A0".into(), "A1".into(), "D0".into()]
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = DataRecorder::new();
        let path = rec.start(dir.path(), "bench run", &labels()).unwrap();
        assert!(rec.is_recording());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("bench_run_"));

        let sample = Sample {
            analog: vec![5.0, 0.0],
            digital: vec![1],
        };
        rec.write_record(&sample).unwrap();
        rec.write_record(&sample).unwrap();
        assert_eq!(rec.rows(), 2);
        rec.stop();
        assert!(!rec.is_recording());

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("elapsed_s,A0,A1,D0"));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(&row[1..], &["5.000", "0.000", "1"]);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn idle_recorder_ignores_samples() {
        let mut rec = DataRecorder::new();
        let sample = Sample {
            analog: vec![1.0],
            digital: vec![],
        };
        rec.write_record(&sample).unwrap();
        assert_eq!(rec.rows(), 0);
        assert!(rec.path().is_none());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = DataRecorder::new();
        let err = rec
            .start(&dir.path().join("nope"), "x", &labels())
            .unwrap_err();
        assert!(matches!(err, ScopeError::Recorder(_)));
        assert!(!rec.is_recording());
    }

    #[test]
    fn empty_label_gets_default_name() {
        assert_eq!(sanitize("  "), "capture");
        assert_eq!(sanitize("a/b"), "a_b");
    }
}
