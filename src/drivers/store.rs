use std::sync::{Arc, RwLock};

use crate::config::AcquisitionConfig;
use crate::drivers::decoder::Sample;

const LOOKAHEAD_PERCENT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlotGroup {
    Analog,
    Digital,
}

/// Fixed-capacity ring of `(x, y)` slots for one channel. `None` is a gap.
#[derive(Clone, Debug)]
pub struct ChannelSeries {
    pub label: String,
    x: Vec<Option<usize>>,
    y: Vec<Option<f64>>,
}

impl ChannelSeries {
    fn new(label: String, capacity: usize) -> Self {
        Self {
            label,
            x: vec![None; capacity],
            y: vec![None; capacity],
        }
    }

    pub fn x(&self) -> &[Option<usize>] {
        &self.x
    }

    pub fn y(&self) -> &[Option<f64>] {
        &self.y
    }

    pub fn point(&self, slot: usize) -> Option<[f64; 2]> {
        match (self.x.get(slot)?, self.y.get(slot)?) {
            (Some(x), Some(y)) => Some([*x as f64, *y]),
            _ => None,
        }
    }

    pub fn segments(&self) -> Vec<Vec<[f64; 2]>> {
        let mut segments = Vec::new();
        let mut current: Vec<[f64; 2]> = Vec::new();
        for slot in 0..self.x.len() {
            match self.point(slot) {
                Some(p) => current.push(p),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }
}

pub fn next_cursor(cursor: usize, capacity: usize) -> usize {
    (cursor + 1) % capacity
}

/// Number of slots blanked ahead of the cursor: `max(1, ceil(capacity * 2%))`.
pub fn lookahead_len(capacity: usize) -> usize {
    (capacity * LOOKAHEAD_PERCENT).div_ceil(100).max(1)
}

#[derive(Clone, Debug)]
pub struct SeriesGroup {
    series: Vec<ChannelSeries>,
    capacity: usize,
    cursor: usize,
}

impl SeriesGroup {
    pub fn new(labels: Vec<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            series: labels
                .into_iter()
                .map(|label| ChannelSeries::new(label, capacity))
                .collect(),
            capacity,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn series(&self) -> &[ChannelSeries] {
        &self.series
    }

    pub fn labels(&self) -> Vec<String> {
        self.series.iter().map(|s| s.label.clone()).collect()
    }

    // None 记为空隙, 不是 0
    pub fn write(&mut self, cursor: usize, values: Option<&[f64]>) {
        let slot = cursor % self.capacity;
        for (channel, series) in self.series.iter_mut().enumerate() {
            series.x[slot] = Some(slot);
            series.y[slot] = values.and_then(|v| v.get(channel).copied());
        }
    }

    pub fn advance(&mut self) -> usize {
        self.cursor = next_cursor(self.cursor, self.capacity);
        self.cursor
    }

    pub fn record(&mut self, values: Option<&[f64]>) {
        self.write(self.cursor, values);
        self.advance();
    }

    pub fn clear_lookahead(&mut self) {
        let count = lookahead_len(self.capacity);
        for series in &mut self.series {
            for j in 1..=count {
                series.x[(self.cursor + j) % self.capacity] = None;
            }
        }
    }

    pub fn resize(&mut self, capacity: usize) {
        *self = Self::new(self.labels(), capacity);
    }

    pub fn reset(&mut self) {
        self.resize(self.capacity);
    }
}

#[derive(Clone, Debug)]
pub struct SampleStore {
    analog: SeriesGroup,
    digital: SeriesGroup,
}

impl SampleStore {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            analog: SeriesGroup::new(config.analog_labels(), config.analog_capacity),
            digital: SeriesGroup::new(config.digital_labels(), config.digital_capacity),
        }
    }

    pub fn group(&self, group: PlotGroup) -> &SeriesGroup {
        match group {
            PlotGroup::Analog => &self.analog,
            PlotGroup::Digital => &self.digital,
        }
    }

    pub fn group_mut(&mut self, group: PlotGroup) -> &mut SeriesGroup {
        match group {
            PlotGroup::Analog => &mut self.analog,
            PlotGroup::Digital => &mut self.digital,
        }
    }

    /// Records one line attempt. A rejected line (`None`) still occupies a
    /// slot in every channel and advances both cursors.
    pub fn record(&mut self, sample: Option<&Sample>) {
        self.analog.record(sample.map(|s| s.analog.as_slice()));
        let digital = sample.map(Sample::digital_as_f64);
        self.digital.record(digital.as_deref());
    }

    pub fn resize(&mut self, group: PlotGroup, capacity: usize) {
        self.group_mut(group).resize(capacity);
    }

    pub fn reset(&mut self) {
        self.analog.reset();
        self.digital.reset();
    }
}

pub type SharedStore = Arc<RwLock<SampleStore>>;

pub fn shared_store(config: &AcquisitionConfig) -> SharedStore {
    Arc::new(RwLock::new(SampleStore::new(config)))
}
